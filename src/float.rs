use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

use crate::scalar::Scalar;

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric and utility traits needed throughout quokka. The
/// `Scalar<Float = Self>` bound lets the AD-generic sweeps run directly on
/// plain floats. Only primitive float types implement this — the AD wrapper
/// type does not.
pub trait Float:
    NumFloat
    + FloatConst
    + FromPrimitive
    + Scalar<Float = Self>
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + 'static
{
}

impl Float for f32 {}
impl Float for f64 {}
