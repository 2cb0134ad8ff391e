//! Solve outcome record.
//!
//! The evaluator itself is stateless across solves; a solver adapter stores
//! what the solver reported here. Accessors distinguish "nothing solved yet"
//! from "solved, but the solver reported no duals" — the two must never be
//! conflated into one error.

use tracing::warn;

use crate::error::EvalError;
use crate::float::Float;

/// Termination status reported by the external solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    /// No solve has been attempted.
    NotSolved,
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    /// The solver failed outright.
    Error,
}

/// Primal/dual results of the most recent solve.
#[derive(Clone, Debug)]
pub struct SolveRecord<F: Float> {
    status: SolveStatus,
    primal: Option<Vec<F>>,
    objective: Option<F>,
    duals: Option<Vec<F>>,
}

impl<F: Float> Default for SolveRecord<F> {
    fn default() -> Self {
        SolveRecord {
            status: SolveStatus::NotSolved,
            primal: None,
            objective: None,
            duals: None,
        }
    }
}

impl<F: Float> SolveRecord<F> {
    /// Record a finished solve. Non-optimal termination is a warning, not an
    /// error: the last known primal solution stays in place.
    pub fn record(
        &mut self,
        status: SolveStatus,
        primal: Vec<F>,
        objective: F,
        duals: Option<Vec<F>>,
    ) {
        if status != SolveStatus::Optimal {
            warn!(?status, "solver terminated with a non-optimal status");
        }
        if duals.is_none() {
            warn!("solver did not report dual values");
        }
        self.status = status;
        self.primal = Some(primal);
        self.objective = Some(objective);
        self.duals = duals;
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Primal solution of the last solve.
    pub fn primal(&self) -> Result<&[F], EvalError> {
        self.primal.as_deref().ok_or(EvalError::NotSolved)
    }

    /// Objective value of the last solve.
    pub fn objective_value(&self) -> Result<F, EvalError> {
        self.objective.ok_or(EvalError::NotSolved)
    }

    /// Constraint duals of the last solve.
    ///
    /// Errors with [`EvalError::NotSolved`] before any solve and with
    /// [`EvalError::DualsUnavailable`] when the solver produced a primal
    /// solution but no duals.
    pub fn duals(&self) -> Result<&[F], EvalError> {
        if self.primal.is_none() {
            return Err(EvalError::NotSolved);
        }
        self.duals.as_deref().ok_or(EvalError::DualsUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsolved_record_distinguishes_errors() {
        let record = SolveRecord::<f64>::default();
        assert_eq!(record.status(), SolveStatus::NotSolved);
        assert_eq!(record.primal().unwrap_err(), EvalError::NotSolved);
        assert_eq!(record.duals().unwrap_err(), EvalError::NotSolved);
    }

    #[test]
    fn missing_duals_after_solve() {
        let mut record = SolveRecord::default();
        record.record(SolveStatus::Optimal, vec![1.0, 2.0], 3.0, None);
        assert_eq!(record.primal().unwrap(), &[1.0, 2.0]);
        assert_eq!(record.duals().unwrap_err(), EvalError::DualsUnavailable);
    }
}
