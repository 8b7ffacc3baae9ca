//! State storage: stable indices for discovered states.

use crate::state::State;
use ahash::RandomState;
use indexmap::IndexSet;
use tracing::warn;

/// Identity table for discovered states.
pub trait StateStore {
    /// Index of `state`, inserting it if unseen. The flag is true if the
    /// state was inserted.
    fn intern(&mut self, state: &State) -> (usize, bool);

    /// The state stored at `index`, if any.
    fn get(&self, index: usize) -> Option<State>;

    /// Release the slot at `index`. Only meaningful for lossy stores.
    fn forget(&mut self, index: usize);

    /// Number of states currently held.
    fn len(&self) -> usize;

    /// Number of states ever reported as new that still count as discovered.
    /// Never exceeds the capacity of a bounded store, even when forgotten
    /// slots are reused.
    fn discovered(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact store: a dense bijection between states and indices, in
/// first-seen order.
#[derive(Debug, Default)]
pub struct ExactStore {
    states: IndexSet<State, RandomState>,
}

impl ExactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&self, state: &State) -> Option<usize> {
        self.states.get_index_of(state)
    }
}

impl StateStore for ExactStore {
    fn intern(&mut self, state: &State) -> (usize, bool) {
        if let Some(index) = self.states.get_index_of(state) {
            return (index, false);
        }
        self.states.insert_full(state.clone())
    }

    fn get(&self, index: usize) -> Option<State> {
        self.states.get_index(index).cloned()
    }

    fn forget(&mut self, _index: usize) {}

    fn len(&self) -> usize {
        self.states.len()
    }

    fn discovered(&self) -> usize {
        self.states.len()
    }
}

/// Fixed-capacity, collision-tolerant store.
///
/// Each state hashes to one slot. A state landing on an occupied slot is
/// reported as already known, whether or not it is the state stored there,
/// so distinct states may alias and exploration may be incomplete. Memory is
/// bounded by the capacity.
#[derive(Debug)]
pub struct BoundedStore {
    slots: Vec<Option<State>>,
    /// Slots that have held a state at some point.
    used: Vec<bool>,
    used_count: usize,
    occupied: usize,
    aliased: usize,
}

impl BoundedStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            used: vec![false; capacity.max(1)],
            used_count: 0,
            occupied: 0,
            aliased: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Distinct states that were reported as known because their slot was
    /// taken by a different state.
    pub fn aliased(&self) -> usize {
        self.aliased
    }

    #[inline]
    fn slot(&self, state: &State) -> usize {
        let h1 = state.fingerprint().as_u64();
        let h = h1.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(0x6A09E667);
        (h % self.slots.len() as u64) as usize
    }
}

impl StateStore for BoundedStore {
    fn intern(&mut self, state: &State) -> (usize, bool) {
        let slot = self.slot(state);
        match &self.slots[slot] {
            Some(existing) => {
                if existing != state {
                    if self.aliased == 0 {
                        warn!(
                            fingerprint = %state.fingerprint(),
                            "bounded store collision: distinct states share a slot, exploration may be incomplete"
                        );
                    }
                    self.aliased += 1;
                }
                (slot, false)
            }
            None => {
                self.slots[slot] = Some(state.clone());
                self.occupied += 1;
                if !self.used[slot] {
                    self.used[slot] = true;
                    self.used_count += 1;
                }
                (slot, true)
            }
        }
    }

    fn get(&self, index: usize) -> Option<State> {
        self.slots.get(index).and_then(|s| s.clone())
    }

    fn forget(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.take().is_some() {
                self.occupied -= 1;
            }
        }
    }

    fn len(&self) -> usize {
        self.occupied
    }

    fn discovered(&self) -> usize {
        self.used_count
    }
}
