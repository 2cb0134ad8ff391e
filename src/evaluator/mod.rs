//! The evaluator facade: compiled problem storage, the mutable evaluation
//! session, and the public first/second-order evaluation methods.
//!
//! An [`Evaluator`] is built from a [`Problem`] and compiled once by
//! [`initialize`](Evaluator::initialize). Compiled storage (graphs, analyses,
//! schedules, coloring plans) is immutable afterwards; every per-point buffer
//! lives in the internal session, so the mutability story is explicit: `&mut
//! self` on evaluation methods means "may touch caches and scratch", never
//! "may recompile".

mod forward;
mod hessian;
mod reverse;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::analysis::Curvature;
use crate::coloring::SparsityPattern;
use crate::dual::Dual;
use crate::error::EvalError;
use crate::float::Float;
use crate::graph::ExprGraph;
use crate::schedule::Schedule;
use crate::storage::{self, FunctionStorage, SubexpressionStorage};

pub(crate) use forward::forward_sweep;
pub(crate) use reverse::propagate_adjoints;

/// Solver-negotiable evaluator capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Feature {
    /// Objective gradient.
    Grad,
    /// Constraint Jacobian.
    Jac,
    /// Hessian of the Lagrangian.
    Hess,
    /// Hessian-vector products without an assembled matrix.
    HessVec,
    /// Export of the expression graphs themselves.
    ExprGraph,
}

/// Sparse row-major linear constraint coefficients, CSR layout.
#[derive(Clone, Debug)]
pub struct LinearMatrix<F: Float> {
    row_offsets: Vec<u32>,
    cols: Vec<u32>,
    vals: Vec<F>,
}

impl<F: Float> Default for LinearMatrix<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Float> LinearMatrix<F> {
    pub fn new() -> Self {
        LinearMatrix {
            row_offsets: vec![0],
            cols: Vec::new(),
            vals: Vec::new(),
        }
    }

    /// Append one row. Entries are sorted by column; duplicate columns are
    /// the caller's bug and are kept as-is (they sum during evaluation).
    pub fn push_row(&mut self, entries: &[(u32, F)]) {
        let mut entries = entries.to_vec();
        entries.sort_unstable_by_key(|&(c, _)| c);
        for (c, v) in entries {
            self.cols.push(c);
            self.vals.push(v);
        }
        self.row_offsets.push(self.cols.len() as u32);
    }

    pub fn num_rows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// Column indices and coefficients of row `i`.
    pub fn row(&self, i: usize) -> (&[u32], &[F]) {
        let lo = self.row_offsets[i] as usize;
        let hi = self.row_offsets[i + 1] as usize;
        (&self.cols[lo..hi], &self.vals[lo..hi])
    }
}

/// One quadratic constraint: a sparse linear part plus explicit quadratic
/// terms `(i, j, coef)` meaning `coef * x_i * x_j` (with `i == j` allowed).
#[derive(Clone, Debug, Default)]
pub struct QuadraticExpr<F: Float> {
    pub linear: Vec<(u32, F)>,
    pub quad: Vec<(u32, u32, F)>,
}

/// The objective: sparse linear part, explicit quadratic terms, and an
/// optional nonlinear graph, summed.
#[derive(Clone, Debug, Default)]
pub struct ObjectiveData<F: Float> {
    pub linear: Vec<(u32, F)>,
    pub quad: Vec<(u32, u32, F)>,
    pub nonlinear: Option<ExprGraph<F>>,
}

/// Everything the front-end hands over for one optimization problem.
///
/// Constraint row order is fixed: all linear rows, then all quadratic rows,
/// then all nonlinear rows. Every structure and evaluation method uses this
/// order.
#[derive(Clone, Debug, Default)]
pub struct Problem<F: Float> {
    pub num_variables: usize,
    pub objective: ObjectiveData<F>,
    pub linear_constraints: LinearMatrix<F>,
    pub quadratic_constraints: Vec<QuadraticExpr<F>>,
    pub nonlinear_constraints: Vec<ExprGraph<F>>,
    /// Shared subexpression graphs, indexed by subexpression id.
    pub subexpressions: Vec<ExprGraph<F>>,
}

/// Wall-clock time accumulated per public operation kind.
#[derive(Clone, Debug, Default)]
pub struct Timers {
    pub initialize: Duration,
    pub eval_objective: Duration,
    pub eval_objective_gradient: Duration,
    pub eval_constraints: Duration,
    pub eval_constraint_jacobian: Duration,
    pub eval_lagrangian_hessian: Duration,
}

/// Observable evaluation counters, for instrumentation and for the caching
/// and sharing tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvalCounters {
    /// Full forward passes over the problem (one per fresh point).
    pub full_forward_evals: u64,
    /// Calls answered entirely from the cached point.
    pub cache_hits: u64,
    /// Individual subexpression forward sweeps.
    pub subexpr_forward_evals: u64,
    /// Reverse (adjoint) propagations, plain and dual.
    pub reverse_sweeps: u64,
    /// Dual directional probes (one per color per nonlinear function).
    pub hessian_probes: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RowClass {
    Linear,
    Quadratic,
    Nonlinear,
}

/// Per-point mutable state: the cached point, forward value buffers, and all
/// reverse/dual scratch. Sized once at initialization, reused per call.
#[derive(Debug, Default)]
struct Session<F: Float> {
    have_point: bool,
    last_x: Vec<F>,
    /// Root value of every scheduled subexpression at the cached point.
    subexpr_values: Vec<F>,
    /// Full node buffers, one per subexpression (empty if unscheduled).
    sub_nodes: Vec<Vec<F>>,
    obj_nodes: Vec<F>,
    con_nodes: Vec<Vec<F>>,
    adjoint_scratch: Vec<F>,
    subexpr_adjoints: Vec<F>,
    dense_grad: Vec<F>,
    // Dual-pass buffers, allocated only when Hessians are compiled.
    dual_x: Vec<Dual<F>>,
    dual_subexpr_values: Vec<Dual<F>>,
    dual_sub_nodes: Vec<Vec<Dual<F>>>,
    dual_nodes: Vec<Dual<F>>,
    dual_adjoint_scratch: Vec<Dual<F>>,
    dual_subexpr_adjoints: Vec<Dual<F>>,
    dual_var_adjoints: Vec<Dual<F>>,
    counters: EvalCounters,
}

/// The nonlinear evaluator behind the solver callback interface.
pub struct Evaluator<F: Float> {
    /// The uncompiled problem; consumed by the first `initialize`.
    pending: Option<Problem<F>>,
    initialized: bool,
    want_hess: bool,
    num_vars: usize,

    schedule: Schedule,
    subs: Vec<Option<SubexpressionStorage<F>>>,
    /// Compiled nonlinear objective part, if the objective has one.
    objective: Option<FunctionStorage<F>>,
    obj_linear: Vec<(u32, F)>,
    obj_quad: Vec<(u32, u32, F)>,
    linear_cons: LinearMatrix<F>,
    quad_cons: Vec<QuadraticExpr<F>>,
    nonlinear_cons: Vec<FunctionStorage<F>>,
    row_classes: Vec<RowClass>,

    jac_rows: Vec<u32>,
    jac_cols: Vec<u32>,
    /// Offsets into `jac_cols` per constraint row.
    jac_row_offsets: Vec<u32>,

    /// Union Hessian pattern over objective and all constraints.
    hess_pattern: SparsityPattern,
    /// Union-pattern slot per objective quadratic term.
    obj_quad_slots: Vec<u32>,
    /// Union-pattern slot per quadratic-constraint term.
    quad_con_slots: Vec<Vec<u32>>,

    session: Session<F>,
    timers: Timers,
}

impl<F: Float> Evaluator<F> {
    pub fn new(problem: Problem<F>) -> Self {
        Evaluator {
            pending: Some(problem),
            initialized: false,
            want_hess: false,
            num_vars: 0,
            schedule: Schedule::default(),
            subs: Vec::new(),
            objective: None,
            obj_linear: Vec::new(),
            obj_quad: Vec::new(),
            linear_cons: LinearMatrix::new(),
            quad_cons: Vec::new(),
            nonlinear_cons: Vec::new(),
            row_classes: Vec::new(),
            jac_rows: Vec::new(),
            jac_cols: Vec::new(),
            jac_row_offsets: Vec::new(),
            hess_pattern: SparsityPattern::default(),
            obj_quad_slots: Vec::new(),
            quad_con_slots: Vec::new(),
            session: Session::default(),
            timers: Timers::default(),
        }
    }

    /// Capabilities this evaluator can be initialized with (before
    /// `initialize`) or was initialized with (after).
    pub fn available_features(&self) -> Vec<Feature> {
        if !self.initialized {
            return vec![Feature::Grad, Feature::Jac, Feature::Hess];
        }
        let mut features = vec![Feature::Grad, Feature::Jac];
        if self.want_hess {
            features.push(Feature::Hess);
        }
        features
    }

    /// Compile the problem for the requested features. Idempotent: calling
    /// again after a successful initialization is a no-op (features from the
    /// first call stay in force).
    pub fn initialize(&mut self, features: &[Feature]) -> Result<(), EvalError> {
        for &f in features {
            match f {
                Feature::Grad | Feature::Jac | Feature::Hess => {}
                Feature::HessVec => {
                    return Err(EvalError::Unimplemented("hessian-vector products"))
                }
                Feature::ExprGraph => {
                    return Err(EvalError::Unimplemented("expression graph export"))
                }
            }
        }
        if self.initialized {
            return Ok(());
        }
        let start = Instant::now();
        let problem = match self.pending.take() {
            Some(p) => p,
            None => return Err(EvalError::NotInitialized),
        };
        self.want_hess = features.contains(&Feature::Hess);
        self.compile(problem)?;
        self.initialized = true;
        self.timers.initialize += start.elapsed();
        Ok(())
    }

    fn compile(&mut self, problem: Problem<F>) -> Result<(), EvalError> {
        let Problem {
            num_variables,
            objective,
            linear_constraints,
            quadratic_constraints,
            nonlinear_constraints,
            subexpressions,
        } = problem;
        self.num_vars = num_variables;

        // Schedule subexpressions over everything that references them.
        let mut root_refs: Vec<Vec<u32>> = Vec::new();
        if let Some(g) = &objective.nonlinear {
            root_refs.push(g.direct_subexpressions());
        }
        for g in &nonlinear_constraints {
            root_refs.push(g.direct_subexpressions());
        }
        self.schedule = Schedule::build(&subexpressions, &root_refs)?;

        let (subs, sub_analyses) = storage::compile_subexpressions(
            subexpressions,
            &self.schedule,
            num_variables,
            self.want_hess,
        );
        self.subs = subs;

        self.objective = match objective.nonlinear {
            Some(g) => Some(storage::compile_function(
                g,
                &sub_analyses,
                &self.schedule,
                num_variables,
                self.want_hess,
            )?),
            None => None,
        };
        self.obj_linear = objective.linear;
        self.obj_quad = objective.quad;

        self.nonlinear_cons = nonlinear_constraints
            .into_iter()
            .map(|g| {
                storage::compile_function(
                    g,
                    &sub_analyses,
                    &self.schedule,
                    num_variables,
                    self.want_hess,
                )
            })
            .collect::<Result<_, _>>()?;
        self.linear_cons = linear_constraints;
        self.quad_cons = quadratic_constraints;

        self.row_classes = Vec::with_capacity(self.num_constraints());
        self.row_classes
            .extend(std::iter::repeat(RowClass::Linear).take(self.linear_cons.num_rows()));
        self.row_classes
            .extend(std::iter::repeat(RowClass::Quadratic).take(self.quad_cons.len()));
        self.row_classes
            .extend(std::iter::repeat(RowClass::Nonlinear).take(self.nonlinear_cons.len()));

        self.build_jacobian_structure();
        if self.want_hess {
            self.build_hessian_structure();
        }
        self.size_session();

        debug!(
            num_variables,
            num_constraints = self.num_constraints(),
            num_subexpressions = self.schedule.global_order.len(),
            hessian_nnz = self.hess_pattern.nnz(),
            "evaluator compiled"
        );
        Ok(())
    }

    /// Jacobian structure in the fixed row order, one sorted column list per
    /// row, flattened to COO.
    fn build_jacobian_structure(&mut self) {
        self.jac_rows.clear();
        self.jac_cols.clear();
        self.jac_row_offsets = vec![0];

        fn push_row(row: usize, cols: &[u32], jac_rows: &mut Vec<u32>, jac_cols: &mut Vec<u32>) {
            jac_rows.extend(std::iter::repeat(row as u32).take(cols.len()));
            jac_cols.extend_from_slice(cols);
        }

        let mut row = 0usize;
        for i in 0..self.linear_cons.num_rows() {
            let (cols, _) = self.linear_cons.row(i);
            push_row(row, cols, &mut self.jac_rows, &mut self.jac_cols);
            self.jac_row_offsets.push(self.jac_cols.len() as u32);
            row += 1;
        }
        for q in &self.quad_cons {
            let cols = quadratic_sparsity(q);
            push_row(row, &cols, &mut self.jac_rows, &mut self.jac_cols);
            self.jac_row_offsets.push(self.jac_cols.len() as u32);
            row += 1;
        }
        for f in &self.nonlinear_cons {
            push_row(row, f.sparsity(), &mut self.jac_rows, &mut self.jac_cols);
            self.jac_row_offsets.push(self.jac_cols.len() as u32);
            row += 1;
        }
    }

    /// Union Hessian pattern over the quadratic terms and every nonlinear
    /// function's colored pattern, plus the slot maps into it.
    fn build_hessian_structure(&mut self) {
        let mut edges: HashSet<(u32, u32)> = HashSet::new();
        for &(i, j, _) in &self.obj_quad {
            edges.insert(lower(i, j));
        }
        for q in &self.quad_cons {
            for &(i, j, _) in &q.quad {
                edges.insert(lower(i, j));
            }
        }
        for f in self
            .nonlinear_cons
            .iter()
            .chain(self.objective.iter())
        {
            if let Some(pattern) = f.hessian_pattern() {
                for (&r, &c) in pattern.rows.iter().zip(pattern.cols.iter()) {
                    edges.insert((r, c));
                }
            }
        }
        let edges: Vec<(u32, u32)> = edges.into_iter().collect();
        self.hess_pattern = SparsityPattern::from_edges(self.num_vars, &edges);

        let slot = |pattern: &SparsityPattern, r: u32, c: u32| -> u32 {
            let entry = (r, c);
            pattern
                .rows
                .iter()
                .zip(pattern.cols.iter())
                .position(|(&pr, &pc)| (pr, pc) == entry)
                .unwrap_or_else(|| unreachable!("entry missing from union pattern")) as u32
        };

        self.obj_quad_slots = self
            .obj_quad
            .iter()
            .map(|&(i, j, _)| {
                let (r, c) = lower(i, j);
                slot(&self.hess_pattern, r, c)
            })
            .collect();
        self.quad_con_slots = self
            .quad_cons
            .iter()
            .map(|q| {
                q.quad
                    .iter()
                    .map(|&(i, j, _)| {
                        let (r, c) = lower(i, j);
                        slot(&self.hess_pattern, r, c)
                    })
                    .collect()
            })
            .collect();

        let union = self.hess_pattern.clone();
        for f in self
            .nonlinear_cons
            .iter_mut()
            .chain(self.objective.iter_mut())
        {
            if let Some(plan) = &f.plan {
                f.union_map = plan
                    .pattern
                    .rows
                    .iter()
                    .zip(plan.pattern.cols.iter())
                    .map(|(&r, &c)| slot(&union, r, c))
                    .collect();
            }
        }
    }

    fn size_session(&mut self) {
        let s = &mut self.session;
        s.have_point = false;
        s.last_x = vec![<F as num_traits::Zero>::zero(); self.num_vars];
        s.subexpr_values = vec![<F as num_traits::Zero>::zero(); self.subs.len()];
        s.sub_nodes = self
            .subs
            .iter()
            .map(|sub| vec![<F as num_traits::Zero>::zero(); sub.as_ref().map_or(0, |s| s.graph.len())])
            .collect();
        s.obj_nodes = vec![<F as num_traits::Zero>::zero(); self.objective.as_ref().map_or(0, |f| f.graph.len())];
        s.con_nodes = self
            .nonlinear_cons
            .iter()
            .map(|f| vec![<F as num_traits::Zero>::zero(); f.graph.len()])
            .collect();
        s.adjoint_scratch = Vec::new();
        s.subexpr_adjoints = vec![<F as num_traits::Zero>::zero(); self.subs.len()];
        s.dense_grad = vec![<F as num_traits::Zero>::zero(); self.num_vars];
        if self.want_hess {
            s.dual_x = vec![Dual::constant(<F as num_traits::Zero>::zero()); self.num_vars];
            s.dual_subexpr_values = vec![Dual::constant(<F as num_traits::Zero>::zero()); self.subs.len()];
            s.dual_sub_nodes = s
                .sub_nodes
                .iter()
                .map(|b| vec![Dual::constant(<F as num_traits::Zero>::zero()); b.len()])
                .collect();
            s.dual_nodes = Vec::new();
            s.dual_adjoint_scratch = Vec::new();
            s.dual_subexpr_adjoints = vec![Dual::constant(<F as num_traits::Zero>::zero()); self.subs.len()];
            s.dual_var_adjoints = vec![Dual::constant(<F as num_traits::Zero>::zero()); self.num_vars];
        }
    }

    pub fn num_variables(&self) -> usize {
        self.num_vars
    }

    /// Compiled storage of subexpression `id`, if it was scheduled (an
    /// unreachable subexpression is never compiled).
    pub fn subexpression(&self, id: usize) -> Option<&SubexpressionStorage<F>> {
        self.subs.get(id).and_then(|s| s.as_ref())
    }

    pub fn num_constraints(&self) -> usize {
        self.linear_cons.num_rows() + self.quad_cons.len() + self.nonlinear_cons.len()
    }

    pub fn counters(&self) -> EvalCounters {
        self.session.counters
    }

    pub fn reset_counters(&mut self) {
        self.session.counters = EvalCounters::default();
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// A compiled evaluator cannot be duplicated; the compiled storages hold
    /// interior structure a field-wise copy would alias incorrectly.
    pub fn try_clone(&self) -> Result<Self, EvalError> {
        Err(EvalError::Unimplemented("deep copy of a compiled evaluator"))
    }

    fn check_ready(&self, x: &[F]) -> Result<(), EvalError> {
        if !self.initialized {
            return Err(EvalError::NotInitialized);
        }
        if x.len() != self.num_vars {
            return Err(EvalError::DimensionMismatch {
                expected: self.num_vars,
                actual: x.len(),
            });
        }
        Ok(())
    }

    /// The single caching gate: all graph forward work for a call happens
    /// here, and only when the point actually changed. NaN components never
    /// compare equal, so NaN points always recompute.
    fn refresh_point(&mut self, x: &[F]) {
        let s = &mut self.session;
        if s.have_point && s.last_x.as_slice() == x {
            s.counters.cache_hits += 1;
            return;
        }
        s.last_x.copy_from_slice(x);
        s.have_point = true;

        for &id in &self.schedule.global_order {
            let id = id as usize;
            let sub = self.subs[id].as_ref().unwrap_or_else(|| {
                unreachable!("scheduled subexpression compiled")
            });
            forward_sweep(&sub.graph, x, &s.subexpr_values, &mut s.sub_nodes[id]);
            s.subexpr_values[id] = s.sub_nodes[id][0];
            s.counters.subexpr_forward_evals += 1;
        }
        if let Some(f) = &self.objective {
            forward_sweep(&f.graph, x, &s.subexpr_values, &mut s.obj_nodes);
        }
        for (k, f) in self.nonlinear_cons.iter().enumerate() {
            forward_sweep(&f.graph, x, &s.subexpr_values, &mut s.con_nodes[k]);
        }
        s.counters.full_forward_evals += 1;
    }

    /// Objective value at `x`.
    pub fn eval_objective(&mut self, x: &[F]) -> Result<F, EvalError> {
        self.check_ready(x)?;
        let start = Instant::now();
        self.refresh_point(x);

        let mut value = <F as num_traits::Zero>::zero();
        for &(v, c) in &self.obj_linear {
            value = value + c * x[v as usize];
        }
        for &(i, j, c) in &self.obj_quad {
            value = value + c * x[i as usize] * x[j as usize];
        }
        if self.objective.is_some() {
            value = value + self.session.obj_nodes[0];
        }
        self.timers.eval_objective += start.elapsed();
        Ok(value)
    }

    /// Dense objective gradient at `x` into `grad` (length `num_variables`).
    pub fn eval_objective_gradient(&mut self, x: &[F], grad: &mut [F]) -> Result<(), EvalError> {
        self.check_ready(x)?;
        if grad.len() != self.num_vars {
            return Err(EvalError::DimensionMismatch {
                expected: self.num_vars,
                actual: grad.len(),
            });
        }
        let start = Instant::now();
        self.refresh_point(x);

        grad.fill(<F as num_traits::Zero>::zero());
        for &(v, c) in &self.obj_linear {
            grad[v as usize] = grad[v as usize] + c;
        }
        for &(i, j, c) in &self.obj_quad {
            grad[i as usize] = grad[i as usize] + c * x[j as usize];
            grad[j as usize] = grad[j as usize] + c * x[i as usize];
        }
        if let Some(f) = &self.objective {
            let s = &mut self.session;
            propagate_adjoints(
                &f.graph,
                &f.deps,
                &self.subs,
                &s.obj_nodes,
                &s.sub_nodes,
                <F as num_traits::One>::one(),
                &mut s.adjoint_scratch,
                &mut s.subexpr_adjoints,
                grad,
            );
            s.counters.reverse_sweeps += 1;
        }
        self.timers.eval_objective_gradient += start.elapsed();
        Ok(())
    }

    /// All constraint values at `x`, in the fixed row order.
    pub fn eval_constraints(&mut self, x: &[F], out: &mut [F]) -> Result<(), EvalError> {
        self.check_ready(x)?;
        if out.len() != self.num_constraints() {
            return Err(EvalError::DimensionMismatch {
                expected: self.num_constraints(),
                actual: out.len(),
            });
        }
        let start = Instant::now();
        self.refresh_point(x);

        let mut row = 0usize;
        for i in 0..self.linear_cons.num_rows() {
            let (cols, vals) = self.linear_cons.row(i);
            let mut acc = <F as num_traits::Zero>::zero();
            for (&c, &v) in cols.iter().zip(vals.iter()) {
                acc = acc + v * x[c as usize];
            }
            out[row] = acc;
            row += 1;
        }
        for q in &self.quad_cons {
            let mut acc = <F as num_traits::Zero>::zero();
            for &(v, c) in &q.linear {
                acc = acc + c * x[v as usize];
            }
            for &(i, j, c) in &q.quad {
                acc = acc + c * x[i as usize] * x[j as usize];
            }
            out[row] = acc;
            row += 1;
        }
        for k in 0..self.nonlinear_cons.len() {
            out[row] = self.session.con_nodes[k][0];
            row += 1;
        }
        self.timers.eval_constraints += start.elapsed();
        Ok(())
    }

    /// Jacobian structure as parallel (row, col) arrays, rows ascending.
    pub fn jacobian_structure(&self) -> Result<(&[u32], &[u32]), EvalError> {
        if !self.initialized {
            return Err(EvalError::NotInitialized);
        }
        Ok((&self.jac_rows, &self.jac_cols))
    }

    /// Jacobian values at `x`, parallel to [`jacobian_structure`].
    ///
    /// [`jacobian_structure`]: Evaluator::jacobian_structure
    pub fn eval_constraint_jacobian(&mut self, x: &[F], vals: &mut [F]) -> Result<(), EvalError> {
        self.check_ready(x)?;
        if vals.len() != self.jac_cols.len() {
            return Err(EvalError::DimensionMismatch {
                expected: self.jac_cols.len(),
                actual: vals.len(),
            });
        }
        let start = Instant::now();
        self.refresh_point(x);

        let mut row = 0usize;
        for i in 0..self.linear_cons.num_rows() {
            let (_, row_vals) = self.linear_cons.row(i);
            let lo = self.jac_row_offsets[row] as usize;
            vals[lo..lo + row_vals.len()].copy_from_slice(row_vals);
            row += 1;
        }
        for q in &self.quad_cons {
            let lo = self.jac_row_offsets[row] as usize;
            let hi = self.jac_row_offsets[row + 1] as usize;
            let cols = &self.jac_cols[lo..hi];
            let grad = &mut self.session.dense_grad;
            for &c in cols {
                grad[c as usize] = <F as num_traits::Zero>::zero();
            }
            for &(v, c) in &q.linear {
                grad[v as usize] = grad[v as usize] + c;
            }
            for &(i, j, c) in &q.quad {
                grad[i as usize] = grad[i as usize] + c * x[j as usize];
                grad[j as usize] = grad[j as usize] + c * x[i as usize];
            }
            for (slot, &c) in vals[lo..hi].iter_mut().zip(cols.iter()) {
                *slot = grad[c as usize];
            }
            row += 1;
        }
        for (k, f) in self.nonlinear_cons.iter().enumerate() {
            let lo = self.jac_row_offsets[row] as usize;
            let hi = self.jac_row_offsets[row + 1] as usize;
            let cols = &self.jac_cols[lo..hi];
            let s = &mut self.session;
            for &c in cols {
                s.dense_grad[c as usize] = <F as num_traits::Zero>::zero();
            }
            propagate_adjoints(
                &f.graph,
                &f.deps,
                &self.subs,
                &s.con_nodes[k],
                &s.sub_nodes,
                <F as num_traits::One>::one(),
                &mut s.adjoint_scratch,
                &mut s.subexpr_adjoints,
                &mut s.dense_grad,
            );
            s.counters.reverse_sweeps += 1;
            for (slot, &c) in vals[lo..hi].iter_mut().zip(cols.iter()) {
                *slot = s.dense_grad[c as usize];
            }
            row += 1;
        }
        self.timers.eval_constraint_jacobian += start.elapsed();
        Ok(())
    }

    /// Lower-triangle Hessian structure as parallel (row, col) arrays.
    pub fn hessian_structure(&self) -> Result<(&[u32], &[u32]), EvalError> {
        if !self.initialized {
            return Err(EvalError::NotInitialized);
        }
        if !self.want_hess {
            return Err(EvalError::HessianNotRequested);
        }
        Ok((&self.hess_pattern.rows, &self.hess_pattern.cols))
    }

    /// Whether the objective is affine in the variables.
    pub fn is_objective_linear(&self) -> Result<bool, EvalError> {
        if !self.initialized {
            return Err(EvalError::NotInitialized);
        }
        Ok(self.obj_quad.is_empty()
            && self
                .objective
                .as_ref()
                .map_or(true, |f| f.curvature() <= Curvature::Linear))
    }

    /// Whether the objective is at most quadratic. A nonlinear graph part
    /// only passes when it analyzed as linear or constant; genuinely
    /// quadratic graphs are not detected and report `false`.
    pub fn is_objective_quadratic(&self) -> Result<bool, EvalError> {
        if !self.initialized {
            return Err(EvalError::NotInitialized);
        }
        Ok(self
            .objective
            .as_ref()
            .map_or(true, |f| f.curvature() <= Curvature::Linear))
    }

    /// Whether constraint row `i` is affine in the variables.
    pub fn is_constraint_linear(&self, i: usize) -> Result<bool, EvalError> {
        if !self.initialized {
            return Err(EvalError::NotInitialized);
        }
        if i >= self.num_constraints() {
            return Err(EvalError::DimensionMismatch {
                expected: self.num_constraints(),
                actual: i,
            });
        }
        Ok(match self.row_classes[i] {
            RowClass::Linear => true,
            RowClass::Quadratic => {
                self.quad_cons[i - self.linear_cons.num_rows()].quad.is_empty()
            }
            RowClass::Nonlinear => {
                let k = i - self.linear_cons.num_rows() - self.quad_cons.len();
                self.nonlinear_cons[k].curvature() <= Curvature::Linear
            }
        })
    }
}

/// Lower-triangle normalization of an unordered index pair.
#[inline]
fn lower(i: u32, j: u32) -> (u32, u32) {
    if i >= j {
        (i, j)
    } else {
        (j, i)
    }
}

/// Sorted, deduplicated gradient sparsity of one quadratic constraint.
fn quadratic_sparsity<F: Float>(q: &QuadraticExpr<F>) -> Vec<u32> {
    let mut cols: Vec<u32> = q.linear.iter().map(|&(v, _)| v).collect();
    for &(i, j, _) in &q.quad {
        cols.push(i);
        cols.push(j);
    }
    cols.sort_unstable();
    cols.dedup();
    cols
}
