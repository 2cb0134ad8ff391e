//! Evaluator error types.
//!
//! Every failure is surfaced synchronously; there are no retries at this
//! layer and no silently degraded results — an unsupported request errors
//! instead of returning an incorrect number.

use thiserror::Error;

use crate::evaluator::Feature;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A capability was requested that this evaluator does not provide.
    #[error("unsupported feature: {0:?}")]
    UnsupportedFeature(Feature),

    /// A capability that exists in the interface but has no implementation.
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    /// A Hessian method was called without `Hess` among the features passed
    /// to `initialize`.
    #[error("hessian support was not requested at initialization")]
    HessianNotRequested,

    /// An evaluation method was called before `initialize`.
    #[error("evaluator has not been initialized")]
    NotInitialized,

    /// A node sequence violates the graph invariants (operand ordering,
    /// arity, constant-pool bounds).
    #[error("malformed expression graph: {0}")]
    MalformedGraph(String),

    /// The subexpression reference structure is not a DAG.
    #[error("subexpression dependencies contain a cycle")]
    CyclicSubexpressions,

    /// Hessian storage was requested for a shared subexpression; second-order
    /// plans exist only for top-level functions.
    #[error("hessian of a shared subexpression is unsupported")]
    SubexpressionHessian,

    /// A caller-provided buffer or point has the wrong length.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Solution data was requested before any solve produced one.
    #[error("no solution available: the problem has not been solved")]
    NotSolved,

    /// A solve finished but the solver reported no dual values.
    #[error("solver did not report dual values")]
    DualsUnavailable,
}
