//! Reverse-mode gradients against closed forms and central finite
//! differences.

mod common;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::{fd_gradient, GraphBuilder};
use quokka::{Evaluator, ExprGraph, Feature, ObjectiveData, OpCode, Problem};

fn evaluator_for(
    num_variables: usize,
    nonlinear: ExprGraph<f64>,
    subexpressions: Vec<ExprGraph<f64>>,
) -> Evaluator<f64> {
    let mut ev = Evaluator::new(Problem {
        num_variables,
        objective: ObjectiveData {
            nonlinear: Some(nonlinear),
            ..Default::default()
        },
        subexpressions,
        ..Default::default()
    });
    ev.initialize(&[Feature::Grad]).unwrap();
    ev
}

fn check_against_fd(ev: &mut Evaluator<f64>, x: &[f64]) {
    let mut grad = vec![0.0; x.len()];
    ev.eval_objective_gradient(x, &mut grad).unwrap();
    let fd = fd_gradient(ev, x);
    for (g, f) in grad.iter().zip(fd.iter()) {
        assert_relative_eq!(g, f, max_relative = 1e-6, epsilon = 1e-7);
    }
}

#[test]
fn quadratic_objective_exact_gradient() {
    // (x0 - 2)^2 + x0 * x1
    let mut b = GraphBuilder::new();
    let x0 = b.var(0);
    let two = b.constant(2.0);
    let diff = b.binary(OpCode::Sub, x0, two);
    let exp2 = b.constant(2.0);
    let sq = b.binary(OpCode::Pow, diff, exp2);
    let x0b = b.var(0);
    let x1 = b.var(1);
    let prod = b.op(OpCode::Mul, vec![x0b, x1]);
    let root = b.op(OpCode::Add, vec![sq, prod]);
    let mut ev = evaluator_for(2, b.finish(root), vec![]);

    let x = [3.0, -1.5];
    assert_relative_eq!(ev.eval_objective(&x).unwrap(), 1.0 - 4.5);
    let mut grad = [0.0, 0.0];
    ev.eval_objective_gradient(&x, &mut grad).unwrap();
    // [2(x0 - 2) + x1, x0]
    assert_relative_eq!(grad[0], 0.5);
    assert_relative_eq!(grad[1], 3.0);
}

#[test]
fn transcendental_gradient_matches_finite_differences() {
    // sin(x0) * cos(x1) + tanh(x2)
    let mut b = GraphBuilder::new();
    let x0 = b.var(0);
    let s = b.unary(OpCode::Sin, x0);
    let x1 = b.var(1);
    let c = b.unary(OpCode::Cos, x1);
    let prod = b.op(OpCode::Mul, vec![s, c]);
    let x2 = b.var(2);
    let t = b.unary(OpCode::Tanh, x2);
    let root = b.op(OpCode::Add, vec![prod, t]);
    let mut ev = evaluator_for(3, b.finish(root), vec![]);

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let x: Vec<f64> = (0..3).map(|_| rng.gen_range(-2.0..2.0)).collect();
        check_against_fd(&mut ev, &x);
    }
}

#[test]
fn log_domain_gradient_matches_finite_differences() {
    // x0 * ln(x1) + sqrt(x1) / x0
    let mut b = GraphBuilder::new();
    let x0 = b.var(0);
    let x1 = b.var(1);
    let l = b.unary(OpCode::Ln, x1);
    let prod = b.op(OpCode::Mul, vec![x0, l]);
    let x1b = b.var(1);
    let r = b.unary(OpCode::Sqrt, x1b);
    let x0b = b.var(0);
    let q = b.binary(OpCode::Div, r, x0b);
    let root = b.op(OpCode::Add, vec![prod, q]);
    let mut ev = evaluator_for(2, b.finish(root), vec![]);

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let x = [rng.gen_range(0.5..3.0), rng.gen_range(0.5..3.0)];
        check_against_fd(&mut ev, &x);
    }
}

#[test]
fn shared_subexpression_gradient_matches_finite_differences() {
    // s = x0 * x1; f = exp(s) + s * s
    let mut sb = GraphBuilder::new();
    let x0 = sb.var(0);
    let x1 = sb.var(1);
    let prod = sb.op(OpCode::Mul, vec![x0, x1]);
    let sub = sb.finish(prod);

    let mut b = GraphBuilder::new();
    let s1 = b.subexpr(0);
    let e = b.unary(OpCode::Exp, s1);
    let s2 = b.subexpr(0);
    let s3 = b.subexpr(0);
    let sq = b.op(OpCode::Mul, vec![s2, s3]);
    let root = b.op(OpCode::Add, vec![e, sq]);
    let mut ev = evaluator_for(2, b.finish(root), vec![sub]);

    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..20 {
        let x = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)];
        check_against_fd(&mut ev, &x);
    }
}

#[test]
fn nested_subexpression_gradient_matches_finite_differences() {
    // s0 = x0 + x1, s1 = s0 * s0; f = sin(s1) + s0
    let mut sb0 = GraphBuilder::new();
    let x0 = sb0.var(0);
    let x1 = sb0.var(1);
    let sum = sb0.op(OpCode::Add, vec![x0, x1]);
    let sub0 = sb0.finish(sum);

    let mut sb1 = GraphBuilder::new();
    let a = sb1.subexpr(0);
    let b1 = sb1.subexpr(0);
    let sq = sb1.op(OpCode::Mul, vec![a, b1]);
    let sub1 = sb1.finish(sq);

    let mut b = GraphBuilder::new();
    let s1 = b.subexpr(1);
    let sn = b.unary(OpCode::Sin, s1);
    let s0 = b.subexpr(0);
    let root = b.op(OpCode::Add, vec![sn, s0]);
    let mut ev = evaluator_for(2, b.finish(root), vec![sub0, sub1]);

    let mut rng = StdRng::seed_from_u64(17);
    for _ in 0..20 {
        let x = [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)];
        check_against_fd(&mut ev, &x);
    }
}

#[test]
fn nonsmooth_ops_differentiate_away_from_kinks() {
    // abs(x0) + max(x0, x1) + min(x0 * x1, x1)
    let mut b = GraphBuilder::new();
    let x0 = b.var(0);
    let a = b.unary(OpCode::Abs, x0);
    let x0b = b.var(0);
    let x1 = b.var(1);
    let mx = b.binary(OpCode::Max, x0b, x1);
    let first = b.op(OpCode::Add, vec![a, mx]);
    let x0c = b.var(0);
    let x1b = b.var(1);
    let prod = b.op(OpCode::Mul, vec![x0c, x1b]);
    let x1c = b.var(1);
    let mn = b.binary(OpCode::Min, prod, x1c);
    let root = b.op(OpCode::Add, vec![first, mn]);
    let mut ev = evaluator_for(2, b.finish(root), vec![]);

    // Points chosen away from every branch boundary.
    for x in [[2.0, 0.5], [-1.5, 3.0], [0.25, -2.0]] {
        check_against_fd(&mut ev, &x);
    }
}

#[test]
fn composed_objective_gradient() {
    // linear + quadratic terms + nonlinear graph, summed
    let mut b = GraphBuilder::new();
    let x2 = b.var(2);
    let root = b.unary(OpCode::Exp, x2);
    let graph = b.finish(root);

    let mut ev = Evaluator::new(Problem {
        num_variables: 3,
        objective: ObjectiveData {
            linear: vec![(0, 3.0), (2, -1.0)],
            quad: vec![(0, 1, 2.0), (1, 1, 0.5)],
            nonlinear: Some(graph),
        },
        ..Default::default()
    });
    ev.initialize(&[Feature::Grad]).unwrap();

    let x = [1.0, 2.0, 0.5];
    let expected = 3.0 - 0.5 + 2.0 * 2.0 + 0.5 * 4.0 + 0.5_f64.exp();
    assert_relative_eq!(ev.eval_objective(&x).unwrap(), expected);

    let mut grad = [0.0; 3];
    ev.eval_objective_gradient(&x, &mut grad).unwrap();
    assert_relative_eq!(grad[0], 3.0 + 2.0 * 2.0);
    assert_relative_eq!(grad[1], 2.0 * 1.0 + 0.5 * 2.0 * 2.0);
    assert_relative_eq!(grad[2], -1.0 + 0.5_f64.exp());
}
