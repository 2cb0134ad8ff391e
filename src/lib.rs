//! quokka — the nonlinear expression evaluator behind an algebraic modeler.
//!
//! Objectives and constraints arrive as flat expression DAGs sharing common
//! subexpressions. This crate compiles them once (structural analysis,
//! subexpression scheduling, Hessian coloring) and then answers solver
//! callbacks at arbitrary points: values, gradients, sparse Jacobians, and
//! compressed sparse Hessians of the Lagrangian.
//!
//! ```
//! use quokka::{Evaluator, ExprGraph, Feature, Node, ObjectiveData, OpCode, Problem};
//!
//! // minimize (x0 - 2)^2, stored root-first
//! let graph = ExprGraph::new(
//!     vec![
//!         Node::Op(OpCode::Pow, vec![1, 4]),
//!         Node::Op(OpCode::Sub, vec![2, 3]),
//!         Node::Variable(0),
//!         Node::Constant(0),
//!         Node::Constant(1),
//!     ],
//!     vec![2.0_f64, 2.0],
//! )
//! .unwrap();
//!
//! let mut ev = Evaluator::new(Problem {
//!     num_variables: 1,
//!     objective: ObjectiveData {
//!         nonlinear: Some(graph),
//!         ..Default::default()
//!     },
//!     ..Default::default()
//! });
//! ev.initialize(&[Feature::Grad]).unwrap();
//!
//! assert_eq!(ev.eval_objective(&[3.0]).unwrap(), 1.0);
//! let mut grad = [0.0];
//! ev.eval_objective_gradient(&[3.0], &mut grad).unwrap();
//! assert_eq!(grad[0], 2.0);
//! ```

pub mod analysis;
pub mod callbacks;
pub mod coloring;
pub mod dual;
pub mod error;
pub mod evaluator;
pub mod float;
pub mod graph;
pub mod opcode;
pub mod scalar;
pub mod schedule;
pub mod solution;
pub mod storage;

pub use analysis::Curvature;
pub use callbacks::NlpCallbacks;
pub use coloring::{greedy_coloring, RecoveryPlan, SparsityPattern};
pub use dual::Dual;
pub use error::EvalError;
pub use evaluator::{
    EvalCounters, Evaluator, Feature, LinearMatrix, ObjectiveData, Problem, QuadraticExpr, Timers,
};
pub use float::Float;
pub use graph::{Adjacency, ExprGraph, Node};
pub use opcode::OpCode;
pub use scalar::Scalar;
pub use schedule::Schedule;
pub use solution::{SolveRecord, SolveStatus};
pub use storage::{FunctionStorage, SubexpressionStorage};
