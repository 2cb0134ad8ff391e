//! Operator codes for expression-graph nodes.
//!
//! Each opcode is one elementary scalar operation. The [`eval_unary`] /
//! [`eval_binary`] and [`unary_partial`] / [`binary_partials`] functions
//! evaluate and differentiate a single opcode; n-ary `Add`/`Mul` are folded
//! directly by the sweeps. Keeping the set a closed enum means every new
//! operator must be wired into the forward, reverse, curvature, and sparsity
//! walks at once or the `match` stops being exhaustive.

use crate::scalar::Scalar;

/// Elementary operation codes for expression-graph operator nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── N-ary ──
    Add,
    Mul,

    // ── Binary ──
    Sub,
    Div,
    /// `a^b`. With a constant exponent node this is the usual power.
    Pow,
    Min,
    Max,

    // ── Unary ──
    Neg,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Abs,
}

/// Operand-count shape of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Binary,
    /// Two or more operands.
    Nary,
}

/// Second-order structural class of an opcode, used by the Hessian sparsity
/// walk to decide which operand-variable pairs can interact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OpClass {
    /// Constant first derivative: no second-order interactions of its own.
    Linear,
    /// Nonlinear in its single operand: all pairs within the operand's
    /// dependency set interact.
    UnaryNonlinear,
    /// Bilinear-style interaction between operand dependency sets.
    CrossNonlinear,
    /// Nonlinear in every direction: all pairs within the union interact.
    FullNonlinear,
    /// Piecewise with zero second derivative (abs, min, max).
    ZeroSecond,
}

impl OpCode {
    pub fn arity(self) -> Arity {
        match self {
            OpCode::Add | OpCode::Mul => Arity::Nary,
            OpCode::Sub | OpCode::Div | OpCode::Pow | OpCode::Min | OpCode::Max => Arity::Binary,
            _ => Arity::Unary,
        }
    }

    pub(crate) fn class(self) -> OpClass {
        match self {
            OpCode::Add | OpCode::Sub | OpCode::Neg => OpClass::Linear,
            OpCode::Mul => OpClass::CrossNonlinear,
            OpCode::Div | OpCode::Pow => OpClass::FullNonlinear,
            OpCode::Min | OpCode::Max | OpCode::Abs => OpClass::ZeroSecond,
            OpCode::Sqrt
            | OpCode::Exp
            | OpCode::Ln
            | OpCode::Log10
            | OpCode::Sin
            | OpCode::Cos
            | OpCode::Tan
            | OpCode::Asin
            | OpCode::Acos
            | OpCode::Atan
            | OpCode::Sinh
            | OpCode::Cosh
            | OpCode::Tanh => OpClass::UnaryNonlinear,
        }
    }
}

/// Evaluate a unary opcode.
#[inline]
pub fn eval_unary<T: Scalar>(op: OpCode, a: T) -> T {
    match op {
        OpCode::Neg => -a,
        OpCode::Sqrt => a.sqrt(),
        OpCode::Exp => a.exp(),
        OpCode::Ln => a.ln(),
        OpCode::Log10 => a.log10(),
        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Tan => a.tan(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),
        OpCode::Sinh => a.sinh(),
        OpCode::Cosh => a.cosh(),
        OpCode::Tanh => a.tanh(),
        OpCode::Abs => a.abs(),
        _ => unreachable!("{op:?} is not unary"),
    }
}

/// Evaluate a binary opcode.
///
/// `Min`/`Max` branch on the primal values so the plain and dual sweeps take
/// the same branch.
#[inline]
pub fn eval_binary<T: Scalar>(op: OpCode, a: T, b: T) -> T {
    match op {
        OpCode::Sub => a - b,
        OpCode::Div => a / b,
        OpCode::Pow => a.powf(b),
        OpCode::Min => {
            if a.value() <= b.value() {
                a
            } else {
                b
            }
        }
        OpCode::Max => {
            if a.value() >= b.value() {
                a
            } else {
                b
            }
        }
        _ => unreachable!("{op:?} is not binary"),
    }
}

/// Reverse-mode partial derivative for a unary opcode.
///
/// `a` is the operand value, `r` the result value (both from the forward
/// sweep — several rules reuse `r` instead of recomputing).
#[inline]
pub fn unary_partial<T: Scalar>(op: OpCode, a: T, r: T) -> T {
    let one = T::one();
    match op {
        OpCode::Neg => -one,
        OpCode::Sqrt => {
            let two = one + one;
            one / (two * r)
        }
        OpCode::Exp => r,
        OpCode::Ln => one / a,
        OpCode::Log10 => {
            let ln10 = T::from_f(<T::Float as num_traits::FloatConst>::LN_10());
            one / (a * ln10)
        }
        OpCode::Sin => a.cos(),
        OpCode::Cos => -a.sin(),
        OpCode::Tan => {
            let c = a.cos();
            one / (c * c)
        }
        OpCode::Asin => one / (one - a * a).sqrt(),
        OpCode::Acos => -one / (one - a * a).sqrt(),
        OpCode::Atan => one / (one + a * a),
        OpCode::Sinh => a.cosh(),
        OpCode::Cosh => a.sinh(),
        OpCode::Tanh => {
            let c = a.cosh();
            one / (c * c)
        }
        OpCode::Abs => a.signum(),
        _ => unreachable!("{op:?} is not unary"),
    }
}

/// Reverse-mode partial derivatives for a binary opcode.
///
/// Returns `(∂r/∂a, ∂r/∂b)` given operand values `a`, `b` and result `r`.
#[inline]
pub fn binary_partials<T: Scalar>(op: OpCode, a: T, b: T, r: T) -> (T, T) {
    let zero = T::zero();
    let one = T::one();
    match op {
        OpCode::Sub => (one, -one),
        OpCode::Div => {
            let inv = one / b;
            (inv, -a * inv * inv)
        }
        OpCode::Pow => {
            // d/da a^b = b * a^(b-1); d/db a^b = a^b * ln(a).
            let da = b * a.powf(b - one);
            let db = r * a.ln();
            (da, db)
        }
        OpCode::Min => {
            if a.value() <= b.value() {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        OpCode::Max => {
            if a.value() >= b.value() {
                (one, zero)
            } else {
                (zero, one)
            }
        }
        _ => unreachable!("{op:?} is not binary"),
    }
}
