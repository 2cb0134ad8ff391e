//! Subexpression scheduling: one global topological order over every
//! subexpression reachable from a main expression, plus per-function
//! dependency lists in that same order.
//!
//! Subexpressions may reference other subexpressions; ids form a DAG by
//! construction, but a cycle introduced by a broken front-end is detected and
//! reported rather than looping. Unreachable subexpressions are never
//! scheduled (and therefore never compiled or evaluated).

use crate::error::EvalError;
use crate::float::Float;
use crate::graph::ExprGraph;

/// Compiled evaluation order over subexpressions.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    /// Global topological order: a subexpression's dependencies precede it.
    /// Only ids reachable from some root appear.
    pub global_order: Vec<u32>,
    /// Position of each subexpression id in `global_order`
    /// (`u32::MAX` for unreachable ids).
    rank: Vec<u32>,
    /// Direct subexpression references of each subexpression, captured at
    /// build time so dependency queries outlive the source graphs.
    deps: Vec<Vec<u32>>,
}

impl Schedule {
    /// Build the schedule from the subexpression graphs and the direct
    /// reference lists of the main expressions (objective + constraints).
    ///
    /// Tie-break: Kahn's algorithm with ready ids taken in ascending order,
    /// so the order is deterministic.
    pub fn build<F: Float>(
        subexpressions: &[ExprGraph<F>],
        root_refs: &[Vec<u32>],
    ) -> Result<Self, EvalError> {
        let n = subexpressions.len();
        let deps: Vec<Vec<u32>> = subexpressions
            .iter()
            .map(|g| g.direct_subexpressions())
            .collect();

        // Reachability from the main expressions.
        let mut reachable = vec![false; n];
        let mut stack: Vec<u32> = root_refs.iter().flatten().copied().collect();
        while let Some(s) = stack.pop() {
            let s = s as usize;
            if s >= n {
                return Err(EvalError::MalformedGraph(format!(
                    "reference to unknown subexpression {s}"
                )));
            }
            if !reachable[s] {
                reachable[s] = true;
                stack.extend(deps[s].iter().copied());
            }
        }

        // Kahn over the reachable subgraph, ascending-id tie-break.
        let mut indegree = vec![0usize; n];
        let mut dependents: Vec<Vec<u32>> = vec![Vec::new(); n];
        for s in 0..n {
            if !reachable[s] {
                continue;
            }
            for &d in &deps[s] {
                indegree[s] += 1;
                dependents[d as usize].push(s as u32);
            }
        }

        let mut ready: Vec<u32> = (0..n as u32)
            .filter(|&s| reachable[s as usize] && indegree[s as usize] == 0)
            .collect();
        let mut global_order = Vec::new();
        while let Some(&s) = ready.first() {
            ready.remove(0);
            global_order.push(s);
            for &dep in &dependents[s as usize] {
                indegree[dep as usize] -= 1;
                if indegree[dep as usize] == 0 {
                    let pos = ready.partition_point(|&r| r < dep);
                    ready.insert(pos, dep);
                }
            }
        }

        let expected = reachable.iter().filter(|&&r| r).count();
        if global_order.len() != expected {
            return Err(EvalError::CyclicSubexpressions);
        }

        let mut rank = vec![u32::MAX; n];
        for (pos, &s) in global_order.iter().enumerate() {
            rank[s as usize] = pos as u32;
        }

        Ok(Schedule {
            global_order,
            rank,
            deps,
        })
    }

    /// Whether subexpression `s` is reachable from some main expression.
    pub fn is_scheduled(&self, s: u32) -> bool {
        self.rank
            .get(s as usize)
            .map_or(false, |&r| r != u32::MAX)
    }

    /// The transitive dependency list of one main expression, ordered
    /// consistently with the global order. Forward evaluation walks this
    /// front to back; reverse accumulation walks it in exact reverse.
    pub fn dependency_order(&self, direct: &[u32]) -> Vec<u32> {
        let mut seen = vec![false; self.deps.len()];
        let mut stack: Vec<u32> = direct.to_vec();
        while let Some(s) = stack.pop() {
            if !seen[s as usize] {
                seen[s as usize] = true;
                stack.extend(self.deps[s as usize].iter().copied());
            }
        }
        let mut list: Vec<u32> = (0..self.deps.len() as u32)
            .filter(|&s| seen[s as usize])
            .collect();
        list.sort_unstable_by_key(|&s| self.rank[s as usize]);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::opcode::OpCode;

    fn sub_ref(s: u32) -> ExprGraph<f64> {
        ExprGraph::new(
            vec![Node::Op(OpCode::Neg, vec![1]), Node::Subexpression(s)],
            vec![],
        )
        .unwrap()
    }

    fn leaf() -> ExprGraph<f64> {
        ExprGraph::new(vec![Node::Variable(0)], vec![]).unwrap()
    }

    #[test]
    fn dependencies_precede_dependents() {
        // 0 -> 1 -> 2 (0 depends on 1, 1 depends on 2)
        let subs = vec![sub_ref(1), sub_ref(2), leaf()];
        let sched = Schedule::build(&subs, &[vec![0]]).unwrap();
        assert_eq!(sched.global_order, vec![2, 1, 0]);
        assert_eq!(sched.dependency_order(&[0]), vec![2, 1, 0]);
    }

    #[test]
    fn unreachable_subexpressions_are_skipped() {
        let subs = vec![leaf(), leaf(), leaf()];
        let sched = Schedule::build(&subs, &[vec![1]]).unwrap();
        assert_eq!(sched.global_order, vec![1]);
        assert!(!sched.is_scheduled(0));
        assert!(!sched.is_scheduled(2));
    }

    #[test]
    fn cycle_is_detected() {
        let subs = vec![sub_ref(1), sub_ref(0)];
        assert!(matches!(
            Schedule::build(&subs, &[vec![0]]),
            Err(EvalError::CyclicSubexpressions)
        ));
    }
}
