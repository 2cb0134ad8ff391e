//! Hessian-of-the-Lagrangian assembly by compressed directional probing.
//!
//! Each nonlinear function is probed once per color of its recovery plan: the
//! forward and reverse sweeps re-run with [`Dual`] scalars seeded along the
//! color's column group, and each pattern entry `(r, c)` is read from the
//! variable adjoint tangent at `r` during the sweep for `c`'s color. The
//! distance-2 coloring guarantees that read is unaliased. Quadratic terms
//! have closed-form second derivatives and skip the probing entirely.

use std::time::Instant;

use crate::dual::Dual;
use crate::error::EvalError;
use crate::float::Float;
use crate::storage::{FunctionStorage, SubexpressionStorage};

use super::{forward_sweep, propagate_adjoints, Evaluator, Session};

impl<F: Float> Evaluator<F> {
    /// Lower-triangle values of `obj_weight * ∇²f + Σ con_weights[i] * ∇²g_i`
    /// at `x`, parallel to [`hessian_structure`].
    ///
    /// [`hessian_structure`]: Evaluator::hessian_structure
    pub fn eval_lagrangian_hessian(
        &mut self,
        x: &[F],
        obj_weight: F,
        con_weights: &[F],
        out: &mut [F],
    ) -> Result<(), EvalError> {
        self.check_ready(x)?;
        if !self.want_hess {
            return Err(EvalError::HessianNotRequested);
        }
        if con_weights.len() != self.num_constraints() {
            return Err(EvalError::DimensionMismatch {
                expected: self.num_constraints(),
                actual: con_weights.len(),
            });
        }
        if out.len() != self.hess_pattern.nnz() {
            return Err(EvalError::DimensionMismatch {
                expected: self.hess_pattern.nnz(),
                actual: out.len(),
            });
        }
        let start = Instant::now();
        self.refresh_point(x);

        out.fill(<F as num_traits::Zero>::zero());
        let num_linear = self.linear_cons.num_rows();
        let num_quad = self.quad_cons.len();
        let two = <F as num_traits::One>::one() + <F as num_traits::One>::one();

        for (&(i, j, c), &slot) in self.obj_quad.iter().zip(self.obj_quad_slots.iter()) {
            let slot = slot as usize;
            let coef = if i == j { two * c } else { c };
            out[slot] = out[slot] + obj_weight * coef;
        }
        for (qi, (q, slots)) in self
            .quad_cons
            .iter()
            .zip(self.quad_con_slots.iter())
            .enumerate()
        {
            let w = con_weights[num_linear + qi];
            for (&(i, j, c), &slot) in q.quad.iter().zip(slots.iter()) {
                let slot = slot as usize;
                let coef = if i == j { two * c } else { c };
                out[slot] = out[slot] + w * coef;
            }
        }

        {
            let Evaluator {
                session,
                subs,
                objective,
                nonlinear_cons,
                ..
            } = self;
            if let Some(f) = objective.as_ref() {
                accumulate_function(f, subs, obj_weight, x, session, out);
            }
            for (k, f) in nonlinear_cons.iter().enumerate() {
                let w = con_weights[num_linear + num_quad + k];
                accumulate_function(f, subs, w, x, session, out);
            }
        }

        self.timers.eval_lagrangian_hessian += start.elapsed();
        Ok(())
    }
}

/// Probe one function's Hessian and scatter `weight * H` into the union
/// pattern slots. No-op for functions without a plan (not nonlinear) or a
/// zero weight.
fn accumulate_function<F: Float>(
    f: &FunctionStorage<F>,
    subs: &[Option<SubexpressionStorage<F>>],
    weight: F,
    x: &[F],
    s: &mut Session<F>,
    out: &mut [F],
) {
    let plan = match &f.plan {
        Some(p) => p,
        None => return,
    };
    if weight == <F as num_traits::Zero>::zero() {
        return;
    }

    for color in 0..plan.num_colors {
        for (v, &xv) in x.iter().enumerate() {
            let eps = if plan.colors[v] == color {
                <F as num_traits::One>::one()
            } else {
                <F as num_traits::Zero>::zero()
            };
            s.dual_x[v] = Dual::new(xv, eps);
        }

        for &d in &f.deps {
            let d = d as usize;
            let sub = subs[d].as_ref().expect("scheduled subexpression compiled");
            forward_sweep(
                &sub.graph,
                &s.dual_x,
                &s.dual_subexpr_values,
                &mut s.dual_sub_nodes[d],
            );
            s.dual_subexpr_values[d] = s.dual_sub_nodes[d][0];
        }
        forward_sweep(&f.graph, &s.dual_x, &s.dual_subexpr_values, &mut s.dual_nodes);

        for &v in f.sparsity() {
            s.dual_var_adjoints[v as usize] = Dual::constant(<F as num_traits::Zero>::zero());
        }
        propagate_adjoints(
            &f.graph,
            &f.deps,
            subs,
            &s.dual_nodes,
            &s.dual_sub_nodes,
            Dual::constant(<F as num_traits::One>::one()),
            &mut s.dual_adjoint_scratch,
            &mut s.dual_subexpr_adjoints,
            &mut s.dual_var_adjoints,
        );
        s.counters.reverse_sweeps += 1;
        s.counters.hessian_probes += 1;

        for (k, (&r, &c)) in plan
            .pattern
            .rows
            .iter()
            .zip(plan.pattern.cols.iter())
            .enumerate()
        {
            if plan.colors[c as usize] == color {
                let slot = f.union_map[k] as usize;
                out[slot] = out[slot] + weight * s.dual_var_adjoints[r as usize].eps;
            }
        }
    }
}
