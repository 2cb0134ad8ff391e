//! Expression-graph representation: flat node sequences plus a derived
//! adjacency structure.
//!
//! Node sequences arrive from the modeling front-end already built: node 0 is
//! the root and every operand index is strictly greater than its parent's, so
//! walking indices in decreasing order is a valid evaluation order and
//! increasing order a valid adjoint order. Nothing here mutates a graph after
//! construction.

use crate::error::EvalError;
use crate::float::Float;
use crate::opcode::{Arity, OpCode};

/// One operation or leaf in an expression DAG.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    /// Decision variable, by global variable index.
    Variable(u32),
    /// Constant, by index into the expression's constant pool.
    Constant(u32),
    /// Reference to a shared subexpression, by subexpression id.
    Subexpression(u32),
    /// Operator applied to child node indices.
    Op(OpCode, Vec<u32>),
}

/// Sparse parent→child incidence over a node sequence, CSR layout.
///
/// Derived once per expression by [`ExprGraph::new`] and reused for every
/// evaluation; the flat `children` array is what the sweeps iterate, not the
/// per-node `Vec`s in [`Node::Op`].
#[derive(Clone, Debug)]
pub struct Adjacency {
    offsets: Vec<u32>,
    children: Vec<u32>,
}

impl Adjacency {
    /// Child node indices of node `i` (empty for leaves).
    #[inline]
    pub fn children(&self, i: usize) -> &[u32] {
        let lo = self.offsets[i] as usize;
        let hi = self.offsets[i + 1] as usize;
        &self.children[lo..hi]
    }
}

/// A compiled expression: node sequence, constant pool, and adjacency.
#[derive(Clone, Debug)]
pub struct ExprGraph<F: Float> {
    nodes: Vec<Node>,
    constants: Vec<F>,
    adj: Adjacency,
}

impl<F: Float> ExprGraph<F> {
    /// Build the adjacency structure in one pass (`adjmat`) and validate the
    /// node ordering invariants.
    ///
    /// Fails if the sequence is empty, an operand index is out of range or
    /// does not come after its parent, an operator's operand count does not
    /// match its arity, or a constant index misses the pool. Graphs are never
    /// re-validated after this point.
    pub fn new(nodes: Vec<Node>, constants: Vec<F>) -> Result<Self, EvalError> {
        if nodes.is_empty() {
            return Err(EvalError::MalformedGraph("empty node sequence".into()));
        }

        let n = nodes.len();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut children = Vec::new();
        offsets.push(0u32);

        for (i, node) in nodes.iter().enumerate() {
            match node {
                Node::Variable(_) | Node::Subexpression(_) => {}
                Node::Constant(c) => {
                    if *c as usize >= constants.len() {
                        return Err(EvalError::MalformedGraph(format!(
                            "node {i}: constant index {c} outside pool of {}",
                            constants.len()
                        )));
                    }
                }
                Node::Op(op, args) => {
                    let arity_ok = match op.arity() {
                        Arity::Unary => args.len() == 1,
                        Arity::Binary => args.len() == 2,
                        Arity::Nary => args.len() >= 2,
                    };
                    if !arity_ok {
                        return Err(EvalError::MalformedGraph(format!(
                            "node {i}: {op:?} applied to {} operand(s)",
                            args.len()
                        )));
                    }
                    for &a in args {
                        if a as usize >= n || a as usize <= i {
                            return Err(EvalError::MalformedGraph(format!(
                                "node {i}: operand index {a} violates root-first ordering"
                            )));
                        }
                        children.push(a);
                    }
                }
            }
            offsets.push(children.len() as u32);
        }

        Ok(ExprGraph {
            nodes,
            constants,
            adj: Adjacency { offsets, children },
        })
    }

    #[inline]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    #[inline]
    pub fn constants(&self) -> &[F] {
        &self.constants
    }

    #[inline]
    pub fn adjacency(&self) -> &Adjacency {
        &self.adj
    }

    /// Number of nodes (scratch buffers are sized to this).
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Subexpression ids referenced directly by this expression.
    pub fn direct_subexpressions(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .nodes
            .iter()
            .filter_map(|n| match n {
                Node::Subexpression(s) => Some(*s),
                _ => None,
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_forward_operand_reference() {
        // Op at index 1 pointing back at the root.
        let nodes = vec![
            Node::Op(OpCode::Neg, vec![1]),
            Node::Op(OpCode::Neg, vec![0]),
        ];
        assert!(matches!(
            ExprGraph::<f64>::new(nodes, vec![]),
            Err(EvalError::MalformedGraph(_))
        ));
    }

    #[test]
    fn rejects_arity_mismatch() {
        let nodes = vec![Node::Op(OpCode::Div, vec![1]), Node::Variable(0)];
        assert!(matches!(
            ExprGraph::<f64>::new(nodes, vec![]),
            Err(EvalError::MalformedGraph(_))
        ));
    }

    #[test]
    fn adjacency_matches_operands() {
        let nodes = vec![
            Node::Op(OpCode::Add, vec![1, 2]),
            Node::Variable(0),
            Node::Constant(0),
        ];
        let g = ExprGraph::new(nodes, vec![3.0_f64]).unwrap();
        assert_eq!(g.adjacency().children(0), &[1, 2]);
        assert!(g.adjacency().children(1).is_empty());
    }
}
