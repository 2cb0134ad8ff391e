//! Forward-mode dual numbers for the directional (Hessian-enabling) pass.
//!
//! The Hessian probing sweep re-runs forward + reverse with a two-component
//! `(value, directional derivative)` number in place of plain scalars. This
//! is an explicit type with defined arithmetic — never a reinterpretation of
//! a raw float buffer.

use std::fmt::{self, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::float::Float;

/// Forward-mode dual number: a value paired with its tangent (derivative).
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Dual<F: Float> {
    /// Primal (real) value.
    pub re: F,
    /// Tangent (derivative) value.
    pub eps: F,
}

impl<F: Float> Display for Dual<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}ε", self.re, self.eps)
    }
}

impl<F: Float> Dual<F> {
    /// Create a new dual number.
    #[inline]
    pub fn new(re: F, eps: F) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero derivative).
    #[inline]
    pub fn constant(re: F) -> Self {
        Dual { re, eps: <F as num_traits::Zero>::zero() }
    }

    /// Create a variable (unit derivative) for differentiation.
    #[inline]
    pub fn variable(re: F) -> Self {
        Dual { re, eps: <F as num_traits::One>::one() }
    }

    /// Apply the chain rule: given `f(self.re)` and `f'(self.re)`, produce the dual result.
    #[inline]
    fn chain(self, f_val: F, f_deriv: F) -> Self {
        Dual {
            re: f_val,
            eps: self.eps * f_deriv,
        }
    }

    #[inline]
    pub fn recip(self) -> Self {
        let inv = <F as num_traits::One>::one() / self.re;
        self.chain(inv, -inv * inv)
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        let s = num_traits::Float::sqrt(self.re);
        let two = <F as num_traits::One>::one() + <F as num_traits::One>::one();
        self.chain(s, <F as num_traits::One>::one() / (two * s))
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        let val = num_traits::Float::powi(self.re, n);
        let deriv = F::from_i32(n).unwrap_or_else(<F as num_traits::Zero>::zero) * num_traits::Float::powi(self.re, n - 1);
        self.chain(val, deriv)
    }

    /// General power with a dual exponent.
    ///
    /// `d(a^b) = b·a^(b-1)·da + a^b·ln(a)·db`. The `ln(a)` term is dropped
    /// when the exponent carries no tangent, so constant exponents stay
    /// finite for non-positive bases.
    #[inline]
    pub fn powf(self, e: Self) -> Self {
        let val = num_traits::Float::powf(self.re, e.re);
        let d_base = e.re * num_traits::Float::powf(self.re, e.re - <F as num_traits::One>::one()) * self.eps;
        let d_exp = if e.eps == <F as num_traits::Zero>::zero() {
            <F as num_traits::Zero>::zero()
        } else {
            val * num_traits::Float::ln(self.re) * e.eps
        };
        Dual {
            re: val,
            eps: d_base + d_exp,
        }
    }

    #[inline]
    pub fn exp(self) -> Self {
        let e = num_traits::Float::exp(self.re);
        self.chain(e, e)
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.chain(num_traits::Float::ln(self.re), <F as num_traits::One>::one() / self.re)
    }

    #[inline]
    pub fn log10(self) -> Self {
        let ln10 = F::LN_10();
        self.chain(num_traits::Float::log10(self.re), <F as num_traits::One>::one() / (self.re * ln10))
    }

    #[inline]
    pub fn sin(self) -> Self {
        self.chain(num_traits::Float::sin(self.re), num_traits::Float::cos(self.re))
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.chain(num_traits::Float::cos(self.re), -num_traits::Float::sin(self.re))
    }

    #[inline]
    pub fn tan(self) -> Self {
        let c = num_traits::Float::cos(self.re);
        self.chain(num_traits::Float::tan(self.re), <F as num_traits::One>::one() / (c * c))
    }

    #[inline]
    pub fn asin(self) -> Self {
        let d = <F as num_traits::One>::one() / num_traits::Float::sqrt(<F as num_traits::One>::one() - self.re * self.re);
        self.chain(num_traits::Float::asin(self.re), d)
    }

    #[inline]
    pub fn acos(self) -> Self {
        let d = -<F as num_traits::One>::one() / num_traits::Float::sqrt(<F as num_traits::One>::one() - self.re * self.re);
        self.chain(num_traits::Float::acos(self.re), d)
    }

    #[inline]
    pub fn atan(self) -> Self {
        self.chain(num_traits::Float::atan(self.re), <F as num_traits::One>::one() / (<F as num_traits::One>::one() + self.re * self.re))
    }

    #[inline]
    pub fn sinh(self) -> Self {
        self.chain(num_traits::Float::sinh(self.re), num_traits::Float::cosh(self.re))
    }

    #[inline]
    pub fn cosh(self) -> Self {
        self.chain(num_traits::Float::cosh(self.re), num_traits::Float::sinh(self.re))
    }

    #[inline]
    pub fn tanh(self) -> Self {
        let c = num_traits::Float::cosh(self.re);
        self.chain(num_traits::Float::tanh(self.re), <F as num_traits::One>::one() / (c * c))
    }

    #[inline]
    pub fn abs(self) -> Self {
        self.chain(num_traits::Float::abs(self.re), num_traits::Float::signum(self.re))
    }

    /// Piecewise constant — zero derivative away from the kink.
    #[inline]
    pub fn signum(self) -> Self {
        Dual::constant(num_traits::Float::signum(self.re))
    }
}

impl<F: Float> Add for Dual<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<F: Float> Sub for Dual<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<F: Float> Mul for Dual<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Dual {
            re: self.re * rhs.re,
            eps: self.re * rhs.eps + self.eps * rhs.re,
        }
    }
}

impl<F: Float> Div for Dual<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        let inv = <F as num_traits::One>::one() / rhs.re;
        Dual {
            re: self.re * inv,
            eps: (self.eps - self.re * inv * rhs.eps) * inv,
        }
    }
}

impl<F: Float> Neg for Dual<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}
