//! Static structural analyses over a single expression: gradient sparsity,
//! linearity classification, and Hessian interaction edges.
//!
//! All three run once at compile time by propagating per-node state in
//! evaluation order (decreasing node index). Dependency sets are input
//! bitsets, as in sparsity detection for tape-based AD; interaction pairs are
//! marked at nodes whose opcode class can produce a mixed second partial and
//! whose own curvature is actually nonlinear.

use std::collections::HashSet;

use crate::float::Float;
use crate::graph::{ExprGraph, Node};
use crate::opcode::{OpClass, OpCode};

/// Linearity classification of an expression, ordered by generality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Curvature {
    Constant,
    Linear,
    Nonlinear,
}

/// Result of analyzing one expression.
#[derive(Clone, Debug)]
pub(crate) struct Analysis {
    /// Sorted, deduplicated global variable indices this expression can
    /// structurally depend on (subexpression sparsity already unioned in).
    pub sparsity: Vec<u32>,
    pub curvature: Curvature,
    /// Hessian interaction pairs `(row, col)` with `row >= col`, sorted.
    /// Does not include pairs internal to referenced subexpressions; the
    /// storage layer unions those from the dependency list.
    pub edges: Vec<(u32, u32)>,
}

impl Default for Analysis {
    fn default() -> Self {
        Analysis {
            sparsity: Vec::new(),
            curvature: Curvature::Constant,
            edges: Vec::new(),
        }
    }
}

/// Analyze `graph`. `subs` must hold the analyses of every subexpression the
/// graph references (ids index into it), which the scheduler's topological
/// order guarantees.
pub(crate) fn analyze<F: Float>(
    graph: &ExprGraph<F>,
    subs: &[Analysis],
    num_vars: usize,
    want_edges: bool,
) -> Analysis {
    let n = graph.len();
    let num_words = num_vars.div_ceil(64);
    let nodes = graph.nodes();
    let constants = graph.constants();
    let adj = graph.adjacency();

    let mut deps: Vec<Vec<u64>> = vec![vec![0u64; num_words]; n];
    let mut curv: Vec<Curvature> = vec![Curvature::Constant; n];
    let mut interactions: HashSet<(u32, u32)> = HashSet::new();

    for i in (0..n).rev() {
        match &nodes[i] {
            Node::Variable(v) => {
                set_bit(&mut deps[i], *v as usize);
                curv[i] = Curvature::Linear;
            }
            Node::Constant(_) => {}
            Node::Subexpression(s) => {
                let sub = &subs[*s as usize];
                for &v in &sub.sparsity {
                    set_bit(&mut deps[i], v as usize);
                }
                curv[i] = sub.curvature;
            }
            Node::Op(op, _) => {
                let children = adj.children(i);
                for &c in children {
                    union_into(&mut deps, i, c as usize);
                }
                curv[i] = node_curvature(*op, children, &curv, nodes, constants);

                if want_edges && curv[i] == Curvature::Nonlinear {
                    mark_interactions(*op, i, children, &deps, nodes, constants, &mut interactions);
                }
            }
        }
    }

    let mut edges: Vec<(u32, u32)> = interactions.into_iter().collect();
    edges.sort_unstable();

    Analysis {
        sparsity: extract_bits(&deps[0], num_vars),
        curvature: curv[0],
        edges,
    }
}

/// Constant exponent value of a `Pow` node, if its exponent operand is a
/// plain constant.
fn const_exponent<F: Float>(children: &[u32], nodes: &[Node], constants: &[F]) -> Option<F> {
    match nodes[children[1] as usize] {
        Node::Constant(c) => Some(constants[c as usize]),
        _ => None,
    }
}

fn node_curvature<F: Float>(
    op: OpCode,
    children: &[u32],
    curv: &[Curvature],
    nodes: &[Node],
    constants: &[F],
) -> Curvature {
    let child_curv = |k: usize| curv[children[k] as usize];
    let max_child = children
        .iter()
        .map(|&c| curv[c as usize])
        .max()
        .unwrap_or(Curvature::Constant);

    match op {
        OpCode::Add | OpCode::Sub | OpCode::Neg => max_child,
        OpCode::Mul => {
            let non_const = children
                .iter()
                .filter(|&&c| curv[c as usize] > Curvature::Constant)
                .count();
            if non_const <= 1 {
                max_child
            } else {
                Curvature::Nonlinear
            }
        }
        OpCode::Div => {
            if child_curv(1) == Curvature::Constant {
                child_curv(0)
            } else {
                Curvature::Nonlinear
            }
        }
        OpCode::Pow => match const_exponent(children, nodes, constants) {
            Some(e) if e == <F as num_traits::Zero>::zero() => Curvature::Constant,
            Some(e) if e == <F as num_traits::One>::one() => child_curv(0),
            _ => {
                if max_child == Curvature::Constant {
                    Curvature::Constant
                } else {
                    Curvature::Nonlinear
                }
            }
        },
        // Everything else is nonlinear in any non-constant operand.
        _ => {
            if max_child == Curvature::Constant {
                Curvature::Constant
            } else {
                Curvature::Nonlinear
            }
        }
    }
}

fn mark_interactions<F: Float>(
    op: OpCode,
    node: usize,
    children: &[u32],
    deps: &[Vec<u64>],
    nodes: &[Node],
    constants: &[F],
    interactions: &mut HashSet<(u32, u32)>,
) {
    let num_vars = deps[node].len() * 64;
    match op.class() {
        OpClass::Linear | OpClass::ZeroSecond => {}
        OpClass::UnaryNonlinear => {
            let bits = extract_bits(&deps[children[0] as usize], num_vars);
            mark_all_pairs(&bits, interactions);
        }
        OpClass::CrossNonlinear => {
            // Product: mixed partials only across distinct factors.
            for (si, &s) in children.iter().enumerate() {
                for &t in &children[si + 1..] {
                    let bits_s = extract_bits(&deps[s as usize], num_vars);
                    let bits_t = extract_bits(&deps[t as usize], num_vars);
                    mark_cross_pairs(&bits_s, &bits_t, interactions);
                }
            }
        }
        OpClass::FullNonlinear => match op {
            OpCode::Div => {
                // a/b is linear in a: pairs within the numerator are clean.
                let bits_a = extract_bits(&deps[children[0] as usize], num_vars);
                let bits_b = extract_bits(&deps[children[1] as usize], num_vars);
                mark_cross_pairs(&bits_a, &bits_b, interactions);
                mark_all_pairs(&bits_b, interactions);
            }
            OpCode::Pow => {
                match const_exponent(children, nodes, constants) {
                    Some(e) if e == <F as num_traits::Zero>::zero() || e == <F as num_traits::One>::one() => {}
                    _ => {
                        let bits = extract_bits(&deps[node], num_vars);
                        mark_all_pairs(&bits, interactions);
                    }
                };
            }
            _ => {
                let bits = extract_bits(&deps[node], num_vars);
                mark_all_pairs(&bits, interactions);
            }
        },
    }
}

#[inline]
fn set_bit(bitset: &mut [u64], pos: usize) {
    bitset[pos / 64] |= 1u64 << (pos % 64);
}

/// Union `deps[src]` into `deps[dst]`.
fn union_into(deps: &mut [Vec<u64>], dst: usize, src: usize) {
    if dst == src {
        return;
    }
    // Split to borrow both rows; src > dst by the root-first invariant.
    let (head, tail) = deps.split_at_mut(src);
    let src_row = &tail[0];
    let dst_row = &mut head[dst];
    for (d, s) in dst_row.iter_mut().zip(src_row.iter()) {
        *d |= *s;
    }
}

/// Mark all unordered pairs within one dependency set.
fn mark_all_pairs(bits: &[u32], interactions: &mut HashSet<(u32, u32)>) {
    for (i, &a) in bits.iter().enumerate() {
        for &b in &bits[..=i] {
            interactions.insert(ordered(a, b));
        }
    }
}

/// Mark all pairs across two dependency sets.
fn mark_cross_pairs(bits_a: &[u32], bits_b: &[u32], interactions: &mut HashSet<(u32, u32)>) {
    for &a in bits_a {
        for &b in bits_b {
            interactions.insert(ordered(a, b));
        }
    }
}

#[inline]
fn ordered(a: u32, b: u32) -> (u32, u32) {
    if a >= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Extract set bit positions from a bitset.
fn extract_bits(bitset: &[u64], max_bits: usize) -> Vec<u32> {
    let mut result = Vec::new();
    for (word_idx, &word) in bitset.iter().enumerate() {
        let mut w = word;
        while w != 0 {
            let bit = w.trailing_zeros();
            let pos = word_idx * 64 + bit as usize;
            if pos < max_bits {
                result.push(pos as u32);
            }
            w &= w - 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;

    fn analyze_plain(nodes: Vec<Node>, constants: Vec<f64>, num_vars: usize) -> Analysis {
        let g = ExprGraph::new(nodes, constants).unwrap();
        analyze(&g, &[], num_vars, true)
    }

    #[test]
    fn linear_sum_has_no_edges() {
        // x0 + 2*x1
        let a = analyze_plain(
            vec![
                Node::Op(OpCode::Add, vec![1, 2]),
                Node::Variable(0),
                Node::Op(OpCode::Mul, vec![3, 4]),
                Node::Constant(0),
                Node::Variable(1),
            ],
            vec![2.0],
            2,
        );
        assert_eq!(a.curvature, Curvature::Linear);
        assert!(a.edges.is_empty());
        assert_eq!(a.sparsity, vec![0, 1]);
    }

    #[test]
    fn product_marks_cross_pair_only() {
        // x0 * x1
        let a = analyze_plain(
            vec![
                Node::Op(OpCode::Mul, vec![1, 2]),
                Node::Variable(0),
                Node::Variable(1),
            ],
            vec![],
            2,
        );
        assert_eq!(a.curvature, Curvature::Nonlinear);
        assert_eq!(a.edges, vec![(1, 0)]);
    }

    #[test]
    fn unit_power_is_linear() {
        // x0 ^ 1
        let a = analyze_plain(
            vec![
                Node::Op(OpCode::Pow, vec![1, 2]),
                Node::Variable(0),
                Node::Constant(0),
            ],
            vec![1.0],
            1,
        );
        assert_eq!(a.curvature, Curvature::Linear);
        assert!(a.edges.is_empty());
    }

    #[test]
    fn square_marks_diagonal() {
        // x0 ^ 2
        let a = analyze_plain(
            vec![
                Node::Op(OpCode::Pow, vec![1, 2]),
                Node::Variable(0),
                Node::Constant(0),
            ],
            vec![2.0],
            1,
        );
        assert_eq!(a.curvature, Curvature::Nonlinear);
        assert_eq!(a.edges, vec![(0, 0)]);
    }

    #[test]
    fn constant_expression_has_empty_sparsity() {
        let a = analyze_plain(
            vec![
                Node::Op(OpCode::Exp, vec![1]),
                Node::Constant(0),
            ],
            vec![1.5],
            3,
        );
        assert_eq!(a.curvature, Curvature::Constant);
        assert!(a.sparsity.is_empty());
        assert!(a.edges.is_empty());
    }

    #[test]
    fn division_spares_numerator_pairs() {
        // (x0 + x1) / x2
        let a = analyze_plain(
            vec![
                Node::Op(OpCode::Div, vec![1, 4]),
                Node::Op(OpCode::Add, vec![2, 3]),
                Node::Variable(0),
                Node::Variable(1),
                Node::Variable(2),
            ],
            vec![],
            3,
        );
        assert!(a.edges.contains(&(2, 0)));
        assert!(a.edges.contains(&(2, 1)));
        assert!(a.edges.contains(&(2, 2)));
        assert!(!a.edges.contains(&(1, 0)));
    }
}
