//! End-to-end facade behavior: the callback protocol, feature negotiation,
//! and the error taxonomy.

mod common;

use approx::assert_relative_eq;

use common::GraphBuilder;
use quokka::{
    EvalError, Evaluator, Feature, LinearMatrix, NlpCallbacks, ObjectiveData, OpCode, Problem,
    QuadraticExpr,
};

/// minimize (x0 - 2)^2 + x0 * x1  subject to  x0^2 + x1 <= 10.
fn sample_problem() -> Evaluator<f64> {
    let mut fb = GraphBuilder::new();
    let x0 = fb.var(0);
    let two = fb.constant(2.0);
    let diff = fb.binary(OpCode::Sub, x0, two);
    let exp2 = fb.constant(2.0);
    let sq = fb.binary(OpCode::Pow, diff, exp2);
    let x0b = fb.var(0);
    let x1 = fb.var(1);
    let prod = fb.op(OpCode::Mul, vec![x0b, x1]);
    let froot = fb.op(OpCode::Add, vec![sq, prod]);

    let mut gb = GraphBuilder::new();
    let gx0 = gb.var(0);
    let gtwo = gb.constant(2.0);
    let gsq = gb.binary(OpCode::Pow, gx0, gtwo);
    let gx1 = gb.var(1);
    let groot = gb.op(OpCode::Add, vec![gsq, gx1]);

    Evaluator::new(Problem {
        num_variables: 2,
        objective: ObjectiveData {
            nonlinear: Some(fb.finish(froot)),
            ..Default::default()
        },
        nonlinear_constraints: vec![gb.finish(groot)],
        ..Default::default()
    })
}

#[test]
fn end_to_end_first_order_protocol() {
    let mut ev = sample_problem();
    ev.initialize(&[Feature::Grad, Feature::Jac]).unwrap();

    let x = [1.0, 1.0];
    assert_relative_eq!(ev.eval_objective(&x).unwrap(), 2.0);

    let mut grad = [0.0, 0.0];
    ev.eval_objective_gradient(&x, &mut grad).unwrap();
    assert_relative_eq!(grad[0], -1.0);
    assert_relative_eq!(grad[1], 1.0);

    let mut cons = [0.0];
    ev.eval_constraints(&x, &mut cons).unwrap();
    assert_relative_eq!(cons[0], 2.0);

    let (rows, cols) = {
        let (r, c) = ev.jacobian_structure().unwrap();
        (r.to_vec(), c.to_vec())
    };
    assert_eq!(rows, vec![0, 0]);
    assert_eq!(cols, vec![0, 1]);
    let mut jac = [0.0, 0.0];
    ev.eval_constraint_jacobian(&x, &mut jac).unwrap();
    assert_relative_eq!(jac[0], 2.0);
    assert_relative_eq!(jac[1], 1.0);
}

#[test]
fn mixed_row_kinds_evaluate_in_fixed_order() {
    // Rows: linear (x0 + 2*x1), quadratic (x1^2 - x0), nonlinear (cos(x0)).
    let mut linear = LinearMatrix::new();
    linear.push_row(&[(0, 1.0), (1, 2.0)]);

    let mut gb = GraphBuilder::new();
    let x0 = gb.var(0);
    let groot = gb.unary(OpCode::Cos, x0);

    let mut ev = Evaluator::new(Problem {
        num_variables: 2,
        linear_constraints: linear,
        quadratic_constraints: vec![QuadraticExpr {
            linear: vec![(0, -1.0)],
            quad: vec![(1, 1, 1.0)],
        }],
        nonlinear_constraints: vec![gb.finish(groot)],
        ..Default::default()
    });
    ev.initialize(&[Feature::Grad, Feature::Jac]).unwrap();
    assert_eq!(ev.num_constraints(), 3);

    let x = [0.5, -1.5];
    let mut cons = [0.0; 3];
    ev.eval_constraints(&x, &mut cons).unwrap();
    assert_relative_eq!(cons[0], 0.5 - 3.0);
    assert_relative_eq!(cons[1], 2.25 - 0.5);
    assert_relative_eq!(cons[2], 0.5_f64.cos());

    let (rows, cols) = {
        let (r, c) = ev.jacobian_structure().unwrap();
        (r.to_vec(), c.to_vec())
    };
    assert_eq!(rows, vec![0, 0, 1, 1, 2]);
    assert_eq!(cols, vec![0, 1, 0, 1, 0]);

    let mut jac = [0.0; 5];
    ev.eval_constraint_jacobian(&x, &mut jac).unwrap();
    assert_relative_eq!(jac[0], 1.0);
    assert_relative_eq!(jac[1], 2.0);
    assert_relative_eq!(jac[2], -1.0);
    assert_relative_eq!(jac[3], 2.0 * x[1]);
    assert_relative_eq!(jac[4], -(0.5_f64.sin()));
}

#[test]
fn evaluation_before_initialize_is_an_error() {
    let mut ev = sample_problem();
    assert_eq!(
        ev.eval_objective(&[1.0, 1.0]).unwrap_err(),
        EvalError::NotInitialized
    );
    assert_eq!(ev.jacobian_structure().unwrap_err(), EvalError::NotInitialized);
    assert_eq!(ev.is_objective_linear().unwrap_err(), EvalError::NotInitialized);
}

#[test]
fn hessian_without_the_feature_is_an_error() {
    let mut ev = sample_problem();
    ev.initialize(&[Feature::Grad, Feature::Jac]).unwrap();

    assert_eq!(
        ev.hessian_structure().unwrap_err(),
        EvalError::HessianNotRequested
    );
    let mut out = [0.0];
    assert_eq!(
        ev.eval_lagrangian_hessian(&[1.0, 1.0], 1.0, &[0.0], &mut out)
            .unwrap_err(),
        EvalError::HessianNotRequested
    );
}

#[test]
fn unimplemented_features_are_rejected() {
    let mut ev = sample_problem();
    assert!(matches!(
        ev.initialize(&[Feature::Grad, Feature::HessVec]),
        Err(EvalError::Unimplemented(_))
    ));
    assert!(matches!(
        ev.initialize(&[Feature::ExprGraph]),
        Err(EvalError::Unimplemented(_))
    ));
    // A failed negotiation leaves the evaluator usable.
    ev.initialize(&[Feature::Grad]).unwrap();
    assert!(ev.eval_objective(&[1.0, 1.0]).is_ok());
}

#[test]
fn initialize_is_idempotent() {
    let mut ev = sample_problem();
    ev.initialize(&[Feature::Grad, Feature::Jac, Feature::Hess])
        .unwrap();
    ev.initialize(&[Feature::Grad]).unwrap();

    // Features from the first call stay in force.
    assert!(ev.available_features().contains(&Feature::Hess));
    assert!(ev.hessian_structure().is_ok());
}

#[test]
fn available_features_narrow_after_initialize() {
    let mut ev = sample_problem();
    assert!(ev.available_features().contains(&Feature::Hess));
    ev.initialize(&[Feature::Grad, Feature::Jac]).unwrap();
    assert!(!ev.available_features().contains(&Feature::Hess));
    assert!(ev.available_features().contains(&Feature::Grad));
}

#[test]
fn dimension_mismatches_are_reported() {
    let mut ev = sample_problem();
    ev.initialize(&[Feature::Grad, Feature::Jac]).unwrap();

    assert!(matches!(
        ev.eval_objective(&[1.0]),
        Err(EvalError::DimensionMismatch {
            expected: 2,
            actual: 1
        })
    ));
    let mut grad = [0.0; 3];
    assert!(matches!(
        ev.eval_objective_gradient(&[1.0, 1.0], &mut grad),
        Err(EvalError::DimensionMismatch { .. })
    ));
    let mut cons = [0.0; 2];
    assert!(matches!(
        ev.eval_constraints(&[1.0, 1.0], &mut cons),
        Err(EvalError::DimensionMismatch { .. })
    ));
}

#[test]
fn try_clone_is_unimplemented() {
    let ev = sample_problem();
    assert!(matches!(
        ev.try_clone(),
        Err(EvalError::Unimplemented(_))
    ));
}

#[test]
fn subexpression_hessian_plan_is_refused() {
    let mut sb = GraphBuilder::new();
    let x0 = sb.var(0);
    let e = sb.unary(OpCode::Exp, x0);
    let sub = sb.finish(e);

    let mut fb = GraphBuilder::new();
    let s = fb.subexpr(0);
    let root = fb.unary(OpCode::Neg, s);

    let mut ev = Evaluator::new(Problem {
        num_variables: 1,
        objective: ObjectiveData {
            nonlinear: Some(fb.finish(root)),
            ..Default::default()
        },
        subexpressions: vec![sub],
        ..Default::default()
    });
    ev.initialize(&[Feature::Grad, Feature::Hess]).unwrap();

    let storage = ev.subexpression(0).unwrap();
    assert_eq!(storage.sparsity(), &[0]);
    assert_eq!(
        storage.hessian_plan().unwrap_err(),
        EvalError::SubexpressionHessian
    );
}

#[test]
fn quadratic_objective_classification() {
    let mut ev = Evaluator::new(Problem {
        num_variables: 2,
        objective: ObjectiveData {
            linear: vec![(0, 1.0)],
            quad: vec![(0, 1, 1.0)],
            nonlinear: None,
        },
        ..Default::default()
    });
    ev.initialize(&[Feature::Grad, Feature::Hess]).unwrap();

    assert!(!ev.is_objective_linear().unwrap());
    assert!(ev.is_objective_quadratic().unwrap());

    // Closed-form quadratic Hessian, no probing.
    let (rows, cols) = {
        let (r, c) = ev.hessian_structure().unwrap();
        (r.to_vec(), c.to_vec())
    };
    assert_eq!(rows, vec![1]);
    assert_eq!(cols, vec![0]);
    let mut out = [0.0];
    ev.eval_lagrangian_hessian(&[0.3, 0.9], 2.0, &[], &mut out)
        .unwrap();
    assert_relative_eq!(out[0], 2.0);
    assert_eq!(ev.counters().hessian_probes, 0);
}

#[test]
fn works_through_the_callback_trait() {
    fn drive<E: NlpCallbacks<f64>>(ev: &mut E) -> f64 {
        ev.initialize(&[Feature::Grad, Feature::Jac]).unwrap();
        assert_eq!(ev.num_variables(), 2);
        assert_eq!(ev.num_constraints(), 1);
        ev.eval_objective(&[1.0, 1.0]).unwrap()
    }
    let mut ev = sample_problem();
    assert_relative_eq!(drive(&mut ev), 2.0);
}
