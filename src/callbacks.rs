//! The solver callback contract.
//!
//! Solvers drive an evaluator exclusively through [`NlpCallbacks`]; the
//! method set is the usual NLP protocol (initialize, structure queries,
//! first- and second-order evaluations, linearity queries). [`Evaluator`]
//! implements it by delegating to its inherent methods, so the trait carries
//! no logic of its own and other backends can stand in during testing.

use crate::error::EvalError;
use crate::evaluator::{Evaluator, Feature};
use crate::float::Float;

/// Callback interface an NLP solver evaluates a problem through.
///
/// Structure queries return parallel `(rows, cols)` index slices; the matching
/// `eval_*` method fills a value buffer of the same length in the same entry
/// order. All methods other than `initialize` and `available_features` fail
/// with [`EvalError::NotInitialized`] before a successful `initialize`.
pub trait NlpCallbacks<F: Float> {
    /// Compile for the requested capability set.
    fn initialize(&mut self, features: &[Feature]) -> Result<(), EvalError>;

    fn available_features(&self) -> Vec<Feature>;

    fn num_variables(&self) -> usize;

    fn num_constraints(&self) -> usize;

    fn eval_objective(&mut self, x: &[F]) -> Result<F, EvalError>;

    /// Dense gradient, `grad.len() == num_variables()`.
    fn eval_objective_gradient(&mut self, x: &[F], grad: &mut [F]) -> Result<(), EvalError>;

    /// All constraint values in row order, `out.len() == num_constraints()`.
    fn eval_constraints(&mut self, x: &[F], out: &mut [F]) -> Result<(), EvalError>;

    fn jacobian_structure(&self) -> Result<(&[u32], &[u32]), EvalError>;

    fn eval_constraint_jacobian(&mut self, x: &[F], vals: &mut [F]) -> Result<(), EvalError>;

    fn hessian_structure(&self) -> Result<(&[u32], &[u32]), EvalError>;

    /// Hessian of `obj_weight * f + Σ con_weights[i] * g_i`, lower triangle.
    fn eval_lagrangian_hessian(
        &mut self,
        x: &[F],
        obj_weight: F,
        con_weights: &[F],
        out: &mut [F],
    ) -> Result<(), EvalError>;

    fn is_objective_linear(&self) -> Result<bool, EvalError>;

    fn is_objective_quadratic(&self) -> Result<bool, EvalError>;

    fn is_constraint_linear(&self, i: usize) -> Result<bool, EvalError>;
}

impl<F: Float> NlpCallbacks<F> for Evaluator<F> {
    fn initialize(&mut self, features: &[Feature]) -> Result<(), EvalError> {
        Evaluator::initialize(self, features)
    }

    fn available_features(&self) -> Vec<Feature> {
        Evaluator::available_features(self)
    }

    fn num_variables(&self) -> usize {
        Evaluator::num_variables(self)
    }

    fn num_constraints(&self) -> usize {
        Evaluator::num_constraints(self)
    }

    fn eval_objective(&mut self, x: &[F]) -> Result<F, EvalError> {
        Evaluator::eval_objective(self, x)
    }

    fn eval_objective_gradient(&mut self, x: &[F], grad: &mut [F]) -> Result<(), EvalError> {
        Evaluator::eval_objective_gradient(self, x, grad)
    }

    fn eval_constraints(&mut self, x: &[F], out: &mut [F]) -> Result<(), EvalError> {
        Evaluator::eval_constraints(self, x, out)
    }

    fn jacobian_structure(&self) -> Result<(&[u32], &[u32]), EvalError> {
        Evaluator::jacobian_structure(self)
    }

    fn eval_constraint_jacobian(&mut self, x: &[F], vals: &mut [F]) -> Result<(), EvalError> {
        Evaluator::eval_constraint_jacobian(self, x, vals)
    }

    fn hessian_structure(&self) -> Result<(&[u32], &[u32]), EvalError> {
        Evaluator::hessian_structure(self)
    }

    fn eval_lagrangian_hessian(
        &mut self,
        x: &[F],
        obj_weight: F,
        con_weights: &[F],
        out: &mut [F],
    ) -> Result<(), EvalError> {
        Evaluator::eval_lagrangian_hessian(self, x, obj_weight, con_weights, out)
    }

    fn is_objective_linear(&self) -> Result<bool, EvalError> {
        Evaluator::is_objective_linear(self)
    }

    fn is_objective_quadratic(&self) -> Result<bool, EvalError> {
        Evaluator::is_objective_quadratic(self)
    }

    fn is_constraint_linear(&self, i: usize) -> Result<bool, EvalError> {
        Evaluator::is_constraint_linear(self, i)
    }
}
