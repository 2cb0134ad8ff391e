//! Compiled per-function and per-subexpression records.
//!
//! Compilation happens exactly once, at `initialize` time; everything in
//! these records is immutable afterwards. Mutable evaluation state lives in
//! the session, never here, so storages can be shared read-only.

use std::collections::HashSet;

use crate::analysis::{self, Analysis, Curvature};
use crate::coloring::{RecoveryPlan, SparsityPattern};
use crate::error::EvalError;
use crate::float::Float;
use crate::graph::ExprGraph;
use crate::schedule::Schedule;

/// One compiled shared subexpression.
///
/// Owns its graph and static analysis but never a Hessian plan: second-order
/// storage for a subexpression in isolation is not supported, and asking for
/// one fails loudly instead of silently dropping Hessian terms.
#[derive(Debug)]
pub struct SubexpressionStorage<F: Float> {
    pub(crate) graph: ExprGraph<F>,
    pub(crate) analysis: Analysis,
}

impl<F: Float> SubexpressionStorage<F> {
    /// Variables this subexpression structurally depends on.
    pub fn sparsity(&self) -> &[u32] {
        &self.analysis.sparsity
    }

    pub fn curvature(&self) -> Curvature {
        self.analysis.curvature
    }

    /// Always an error: see the type-level docs.
    pub fn hessian_plan(&self) -> Result<&RecoveryPlan, EvalError> {
        Err(EvalError::SubexpressionHessian)
    }
}

/// One compiled top-level nonlinear function (objective or constraint).
#[derive(Debug)]
pub struct FunctionStorage<F: Float> {
    pub(crate) graph: ExprGraph<F>,
    /// Sorted global variable indices this function depends on.
    pub(crate) sparsity: Vec<u32>,
    pub(crate) curvature: Curvature,
    /// Transitive subexpression dependencies, in global-order positions.
    pub(crate) deps: Vec<u32>,
    /// Coloring plan; present iff compiled with Hessian support and the
    /// function is actually nonlinear.
    pub(crate) plan: Option<RecoveryPlan>,
    /// Maps this function's pattern entries into the facade's union pattern.
    /// Filled by the facade after the union pattern is assembled.
    pub(crate) union_map: Vec<u32>,
}

impl<F: Float> FunctionStorage<F> {
    pub fn sparsity(&self) -> &[u32] {
        &self.sparsity
    }

    pub fn curvature(&self) -> Curvature {
        self.curvature
    }

    pub fn hessian_pattern(&self) -> Option<&SparsityPattern> {
        self.plan.as_ref().map(|p| &p.pattern)
    }
}

/// Compile every scheduled subexpression, in the schedule's global order so
/// each analysis sees its dependencies' results. Unscheduled subexpressions
/// are never compiled.
pub(crate) fn compile_subexpressions<F: Float>(
    graphs: Vec<ExprGraph<F>>,
    schedule: &Schedule,
    num_vars: usize,
    want_edges: bool,
) -> (Vec<Option<SubexpressionStorage<F>>>, Vec<Analysis>) {
    let mut analyses: Vec<Analysis> = vec![Analysis::default(); graphs.len()];
    for &s in &schedule.global_order {
        let s = s as usize;
        analyses[s] = analysis::analyze(&graphs[s], &analyses, num_vars, want_edges);
    }

    let storages = graphs
        .into_iter()
        .enumerate()
        .map(|(s, graph)| {
            schedule.is_scheduled(s as u32).then(|| SubexpressionStorage {
                graph,
                analysis: analyses[s].clone(),
            })
        })
        .collect();

    (storages, analyses)
}

/// Compile one top-level function against already-compiled subexpressions.
pub(crate) fn compile_function<F: Float>(
    graph: ExprGraph<F>,
    sub_analyses: &[Analysis],
    schedule: &Schedule,
    num_vars: usize,
    want_hess: bool,
) -> Result<FunctionStorage<F>, EvalError> {
    let analysis = analysis::analyze(&graph, sub_analyses, num_vars, want_hess);
    let deps = schedule.dependency_order(&graph.direct_subexpressions());

    let plan = if want_hess && analysis.curvature == Curvature::Nonlinear {
        // Union the function's own interactions with those internal to every
        // subexpression it transitively uses.
        let mut edges: HashSet<(u32, u32)> = analysis.edges.iter().copied().collect();
        for &d in &deps {
            edges.extend(sub_analyses[d as usize].edges.iter().copied());
        }
        let edges: Vec<(u32, u32)> = edges.into_iter().collect();
        Some(RecoveryPlan::new(SparsityPattern::from_edges(
            num_vars, &edges,
        )))
    } else {
        None
    };

    Ok(FunctionStorage {
        graph,
        sparsity: analysis.sparsity,
        curvature: analysis.curvature,
        deps,
        plan,
        union_map: Vec::new(),
    })
}
