//! Forward value propagation over one expression.

use crate::graph::{ExprGraph, Node};
use crate::opcode::{self, Arity, OpCode};
use crate::scalar::Scalar;

/// One forward sweep: walk nodes in evaluation order (decreasing index),
/// computing each node's value into `buf`. `subexpr_values` must already
/// hold the root values of every subexpression the graph references.
///
/// Generic over [`Scalar`] so the same sweep serves plain values and the
/// directional dual pass. Does not mutate the graph.
pub(crate) fn forward_sweep<T: Scalar>(
    graph: &ExprGraph<T::Float>,
    x: &[T],
    subexpr_values: &[T],
    buf: &mut Vec<T>,
) {
    let n = graph.len();
    buf.clear();
    buf.resize(n, T::zero());

    let nodes = graph.nodes();
    let constants = graph.constants();
    let adjacency = graph.adjacency();

    for i in (0..n).rev() {
        buf[i] = match &nodes[i] {
            Node::Variable(v) => x[*v as usize],
            Node::Constant(c) => T::from_f(constants[*c as usize]),
            Node::Subexpression(s) => subexpr_values[*s as usize],
            Node::Op(op, _) => {
                let children = adjacency.children(i);
                match op.arity() {
                    Arity::Nary => {
                        let operands = children.iter().map(|&c| buf[c as usize]);
                        match op {
                            OpCode::Add => operands.fold(T::zero(), |acc, v| acc + v),
                            OpCode::Mul => operands.fold(T::one(), |acc, v| acc * v),
                            _ => unreachable!("{op:?} is not n-ary"),
                        }
                    }
                    Arity::Binary => {
                        opcode::eval_binary(*op, buf[children[0] as usize], buf[children[1] as usize])
                    }
                    Arity::Unary => opcode::eval_unary(*op, buf[children[0] as usize]),
                }
            }
        };
    }
}
