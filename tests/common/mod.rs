//! Shared test helpers: a child-first graph builder and a central
//! finite-difference gradient.

// Each integration test binary compiles its own copy and uses a subset.
#![allow(dead_code)]

use quokka::{Evaluator, ExprGraph, Node, OpCode};

/// Builds expression graphs child-first (the natural writing order) and
/// reverses into the root-first storage order on `finish`.
pub struct GraphBuilder {
    nodes: Vec<Node>,
    constants: Vec<f64>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder {
            nodes: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn var(&mut self, v: u32) -> u32 {
        self.push(Node::Variable(v))
    }

    pub fn constant(&mut self, value: f64) -> u32 {
        self.constants.push(value);
        let idx = (self.constants.len() - 1) as u32;
        self.push(Node::Constant(idx))
    }

    pub fn subexpr(&mut self, s: u32) -> u32 {
        self.push(Node::Subexpression(s))
    }

    pub fn op(&mut self, op: OpCode, args: Vec<u32>) -> u32 {
        self.push(Node::Op(op, args))
    }

    pub fn unary(&mut self, op: OpCode, a: u32) -> u32 {
        self.op(op, vec![a])
    }

    pub fn binary(&mut self, op: OpCode, a: u32, b: u32) -> u32 {
        self.op(op, vec![a, b])
    }

    fn push(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    /// Finish with `root` (which must be the last node built) and produce the
    /// root-first graph.
    pub fn finish(self, root: u32) -> ExprGraph<f64> {
        let n = self.nodes.len() as u32;
        assert_eq!(root, n - 1, "root must be the last node built");
        let remap = |i: u32| n - 1 - i;
        let nodes: Vec<Node> = self
            .nodes
            .into_iter()
            .rev()
            .map(|node| match node {
                Node::Op(op, args) => {
                    Node::Op(op, args.into_iter().map(remap).collect())
                }
                leaf => leaf,
            })
            .collect();
        ExprGraph::new(nodes, self.constants).expect("builder produced a valid graph")
    }
}

/// Central finite-difference gradient of the objective.
pub fn fd_gradient(ev: &mut Evaluator<f64>, x: &[f64]) -> Vec<f64> {
    let mut grad = vec![0.0; x.len()];
    let mut xp = x.to_vec();
    for i in 0..x.len() {
        let h = 1e-5 * x[i].abs().max(1.0);
        xp[i] = x[i] + h;
        let fp = ev.eval_objective(&xp).unwrap();
        xp[i] = x[i] - h;
        let fm = ev.eval_objective(&xp).unwrap();
        xp[i] = x[i];
        grad[i] = (fp - fm) / (2.0 * h);
    }
    grad
}
