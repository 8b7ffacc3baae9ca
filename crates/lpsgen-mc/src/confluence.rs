//! Tau-confluence reduction.
//!
//! Chains of prioritized (confluent) steps are collapsed onto a canonical
//! representative: the smallest state of the first strongly connected
//! component closed by Tarjan's algorithm, started from the given state on
//! the graph of prioritized transitions. The first component Tarjan closes
//! has no outgoing edges; in a confluent graph that terminal component is
//! unique, so every state reaching it gets the same representative.

use crate::generator::{GenerateResult, NextStateGenerator, SubsetId};
use crate::state::State;
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use lpsgen_eval::Enumerator;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ConfluenceReducer {
    subset: SubsetId,
}

impl ConfluenceReducer {
    /// Reduce along the transitions of `subset`.
    pub fn new(subset: SubsetId) -> Self {
        Self { subset }
    }

    pub fn subset(&self) -> SubsetId {
        self.subset
    }

    /// Canonical representative of `start`. Does not terminate if the
    /// prioritized transitions reach infinitely many states.
    pub fn representative<R: Enumerator>(
        &self,
        generator: &mut NextStateGenerator<R>,
        start: &State,
    ) -> GenerateResult<State> {
        let mut disc: HashMap<State, usize> = HashMap::new();
        let mut low: HashMap<State, usize> = HashMap::new();
        let mut successors: HashMap<State, Arc<[State]>> = HashMap::new();
        let mut stack: Vec<State> = Vec::new();
        let mut on_stack: HashSet<State> = HashSet::new();
        // (node, index of the next successor to visit)
        let mut work: Vec<(State, usize)> = vec![(start.clone(), 0)];

        successors.insert(start.clone(), generator.successors(start, self.subset)?.into());

        while let Some((u, i)) = work.pop() {
            if i == 0 {
                let k = disc.len();
                disc.insert(u.clone(), k);
                low.insert(u.clone(), k);
                stack.push(u.clone());
                on_stack.insert(u.clone());
            }

            let succ = Arc::clone(&successors[&u]);
            let mut descended = false;
            for (j, v) in succ.iter().enumerate().skip(i) {
                match disc.get(v) {
                    None => {
                        let next = generator.successors(v, self.subset)?;
                        successors.insert(v.clone(), next.into());
                        work.push((u.clone(), j + 1));
                        work.push((v.clone(), 0));
                        descended = true;
                        break;
                    }
                    Some(&dv) if on_stack.contains(v) => {
                        let lu = low[&u];
                        low.insert(u.clone(), lu.min(dv));
                    }
                    Some(_) => {}
                }
            }
            if descended {
                continue;
            }

            if disc[&u] == low[&u] {
                // u roots a component: its members sit on the stack above u.
                let root = stack.iter().rposition(|s| *s == u).unwrap_or(0);
                let representative = stack[root..].iter().min().unwrap_or(&u).clone();
                return Ok(representative);
            }

            if let Some((parent, _)) = work.last() {
                let lu = low[&u];
                if let Some(lp) = low.get_mut(parent) {
                    *lp = (*lp).min(lu);
                }
            }
        }

        // The start state roots a component at the latest.
        Ok(start.clone())
    }
}
