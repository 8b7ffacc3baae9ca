//! Divergence detection: cycles of internal steps.

use crate::generator::{GenerateResult, NextStateGenerator, SubsetId};
use crate::state::State;
use ahash::{HashSet, HashSetExt};
use lpsgen_eval::Enumerator;

struct Frame {
    state: State,
    children: Vec<State>,
    next: usize,
}

/// Depth-first search for a cycle over the internal summand subset.
///
/// States from which a search finished without finding a cycle are
/// remembered and never searched again.
#[derive(Debug)]
pub struct DivergenceDetector {
    subset: SubsetId,
    non_divergent: HashSet<State>,
}

impl DivergenceDetector {
    pub fn new(subset: SubsetId) -> Self {
        Self {
            subset,
            non_divergent: HashSet::new(),
        }
    }

    pub fn is_known_non_divergent(&self, state: &State) -> bool {
        self.non_divergent.contains(state)
    }

    /// Whether an infinite sequence of internal steps starts in `start`.
    pub fn is_divergent<R: Enumerator>(
        &mut self,
        generator: &mut NextStateGenerator<R>,
        start: &State,
    ) -> GenerateResult<bool> {
        if self.non_divergent.contains(start) {
            return Ok(false);
        }

        let mut visited: HashSet<State> = HashSet::new();
        let mut on_path: HashSet<State> = HashSet::new();
        visited.insert(start.clone());

        let mut stack = Vec::new();
        match self.enter(generator, start, &mut visited, &mut on_path)? {
            Some(frame) => stack.push(frame),
            None => return Ok(true),
        }

        while let Some(top) = stack.last_mut() {
            if top.next < top.children.len() {
                let child = top.children[top.next].clone();
                top.next += 1;
                if !visited.insert(child.clone()) {
                    continue;
                }
                match self.enter(generator, &child, &mut visited, &mut on_path)? {
                    Some(frame) => stack.push(frame),
                    None => return Ok(true),
                }
            } else {
                on_path.remove(&top.state);
                stack.pop();
            }
        }

        self.non_divergent.extend(visited);
        Ok(false)
    }

    /// Put `state` on the current path and collect its unvisited internal
    /// successors. Returns `None` if a successor closes a cycle.
    ///
    /// A state is marked visited only once its own frame is entered, so a
    /// sibling discovered here but not yet searched is still searched from
    /// whichever path reaches it first.
    fn enter<R: Enumerator>(
        &self,
        generator: &mut NextStateGenerator<R>,
        state: &State,
        visited: &mut HashSet<State>,
        on_path: &mut HashSet<State>,
    ) -> GenerateResult<Option<Frame>> {
        on_path.insert(state.clone());
        let mut children = Vec::new();
        for target in generator.successors(state, self.subset)? {
            if self.non_divergent.contains(&target) {
                continue;
            }
            if on_path.contains(&target) {
                return Ok(None);
            }
            if !visited.contains(&target) {
                children.push(target);
            }
        }
        Ok(Some(Frame {
            state: state.clone(),
            children,
            next: 0,
        }))
    }
}
