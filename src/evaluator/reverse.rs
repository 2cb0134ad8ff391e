//! Reverse adjoint propagation over one expression, and the chained
//! propagation through a function's subexpression dependency list.

use crate::graph::{ExprGraph, Node};
use crate::opcode::{self, Arity, OpCode};
use crate::scalar::Scalar;
use crate::storage::SubexpressionStorage;

/// One reverse sweep: walk nodes in adjoint order (increasing index),
/// accumulating `∂root/∂node` for every node from the forward `values`.
///
/// Leaf adjoints scatter additively: `Variable` into `var_out`,
/// `Subexpression` into `subexpr_out`. Both targets must be pre-zeroed by
/// the caller for the slots this sweep can touch; accumulation here is pure
/// addition.
pub(crate) fn reverse_sweep<T: Scalar>(
    graph: &ExprGraph<T::Float>,
    values: &[T],
    seed: T,
    adjoints: &mut Vec<T>,
    var_out: &mut [T],
    subexpr_out: &mut [T],
) {
    let n = graph.len();
    adjoints.clear();
    adjoints.resize(n, T::zero());
    adjoints[0] = seed;

    let nodes = graph.nodes();
    let adjacency = graph.adjacency();

    for i in 0..n {
        let adj = adjoints[i];
        if adj.is_all_zero() {
            continue;
        }

        match &nodes[i] {
            Node::Variable(v) => {
                let v = *v as usize;
                var_out[v] = var_out[v] + adj;
            }
            Node::Constant(_) => {}
            Node::Subexpression(s) => {
                let s = *s as usize;
                subexpr_out[s] = subexpr_out[s] + adj;
            }
            Node::Op(op, _) => {
                let children = adjacency.children(i);
                match op.arity() {
                    Arity::Nary => match op {
                        OpCode::Add => {
                            for &c in children {
                                let c = c as usize;
                                adjoints[c] = adjoints[c] + adj;
                            }
                        }
                        OpCode::Mul => {
                            // Partial w.r.t. one factor is the product of the
                            // others; recomputed per factor so zero factors
                            // stay exact.
                            for (k, &c) in children.iter().enumerate() {
                                let mut partial = T::one();
                                for (l, &other) in children.iter().enumerate() {
                                    if l != k {
                                        partial = partial * values[other as usize];
                                    }
                                }
                                let c = c as usize;
                                adjoints[c] = adjoints[c] + partial * adj;
                            }
                        }
                        _ => unreachable!("{op:?} is not n-ary"),
                    },
                    Arity::Binary => {
                        let a = children[0] as usize;
                        let b = children[1] as usize;
                        let (da, db) =
                            opcode::binary_partials(*op, values[a], values[b], values[i]);
                        adjoints[a] = adjoints[a] + da * adj;
                        adjoints[b] = adjoints[b] + db * adj;
                    }
                    Arity::Unary => {
                        let a = children[0] as usize;
                        let da = opcode::unary_partial(*op, values[a], values[i]);
                        adjoints[a] = adjoints[a] + da * adj;
                    }
                }
            }
        }
    }
}

/// Full adjoint propagation for one function: its own reverse sweep, then
/// its dependency list in exact reverse, each subexpression seeded by the
/// adjoint accumulated for it. This is how gradient contributions distribute
/// through shared subexpressions without re-evaluating them per consumer.
#[allow(clippy::too_many_arguments)]
pub(crate) fn propagate_adjoints<T: Scalar>(
    func_graph: &ExprGraph<T::Float>,
    deps: &[u32],
    subs: &[Option<SubexpressionStorage<T::Float>>],
    func_nodes: &[T],
    sub_nodes: &[Vec<T>],
    seed: T,
    adjoint_scratch: &mut Vec<T>,
    subexpr_adjoints: &mut [T],
    var_out: &mut [T],
) {
    for &d in deps {
        subexpr_adjoints[d as usize] = T::zero();
    }

    reverse_sweep(
        func_graph,
        func_nodes,
        seed,
        adjoint_scratch,
        var_out,
        subexpr_adjoints,
    );

    for &d in deps.iter().rev() {
        let d = d as usize;
        let sub_seed = subexpr_adjoints[d];
        if sub_seed.is_all_zero() {
            continue;
        }
        let sub = subs[d].as_ref().expect("scheduled subexpression compiled");
        reverse_sweep(
            &sub.graph,
            &sub_nodes[d],
            sub_seed,
            adjoint_scratch,
            var_out,
            subexpr_adjoints,
        );
    }
}
