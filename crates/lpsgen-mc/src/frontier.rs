//! Frontiers of pending states.

use rand::Rng;
use std::collections::VecDeque;

/// Breadth-first queue split into the level being explored and the level
/// being discovered.
///
/// With a bound, the next level holds at most `max` entries: once full, each
/// newly discovered entry replaces a uniformly random queued one with
/// probability `max / seen`, so the kept entries are a uniform sample of the
/// level. Whatever is not kept is handed back to the caller.
#[derive(Debug)]
pub struct LevelQueue<T> {
    current: VecDeque<T>,
    next: Vec<T>,
    max: Option<usize>,
    seen: usize,
}

impl<T> LevelQueue<T> {
    pub fn new(max: Option<usize>) -> Self {
        Self {
            current: VecDeque::new(),
            next: Vec::new(),
            max,
            seen: 0,
        }
    }

    /// Add an entry to the next level. Returns the entry that was dropped, if any.
    pub fn push<R: Rng>(&mut self, item: T, rng: &mut R) -> Option<T> {
        self.seen += 1;
        match self.max {
            Some(max) if self.next.len() >= max => {
                let k = rng.gen_range(0..self.seen);
                if k < max {
                    Some(std::mem::replace(&mut self.next[k], item))
                } else {
                    Some(item)
                }
            }
            _ => {
                self.next.push(item);
                None
            }
        }
    }

    /// Next entry of the current level.
    pub fn pop(&mut self) -> Option<T> {
        self.current.pop_front()
    }

    /// Entries left on the current level.
    pub fn remaining(&self) -> usize {
        self.current.len()
    }

    /// Make the discovered level current. Returns false if it is empty.
    pub fn advance(&mut self) -> bool {
        debug_assert!(self.current.is_empty());
        self.current = std::mem::take(&mut self.next).into();
        self.seen = 0;
        !self.current.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
