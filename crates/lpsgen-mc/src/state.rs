//! State representation and fingerprinting.

use lpsgen_eval::Value;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A fingerprint is a 64-bit hash identifying a state.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Fingerprint(v)
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash a single parameter value at a given position.
/// Int/Bool take a splitmix-style fast path; everything else goes through AHash.
#[inline]
pub(crate) fn hash_value(idx: usize, val: &Value) -> u64 {
    let mix = |payload: u64| {
        let h = ((idx as u64) ^ 0x2d358dccaa6c78a5).wrapping_mul(0x9e3779b97f4a7c15);
        let h = (h ^ payload).wrapping_mul(0x517cc1b727220a95);
        h ^ (h >> 32)
    };
    match val {
        Value::Int(n) => mix(*n as u64),
        Value::Bool(b) => mix(*b as u64),
        _ => {
            let mut hasher = ahash::AHasher::default();
            idx.hash(&mut hasher);
            val.hash(&mut hasher);
            hasher.finish()
        }
    }
}

fn compute_fingerprint(values: &[Value]) -> Fingerprint {
    let mut h: u64 = 0;
    for (i, v) in values.iter().enumerate() {
        h ^= hash_value(i, v);
    }
    Fingerprint(h)
}

/// A symbolic state: one value per process parameter.
///
/// Cloning is a reference-count increment. The fingerprint is computed once
/// at construction and used as the hash; equality is pointwise on values.
#[derive(Clone)]
pub struct State {
    values: Arc<[Value]>,
    fp: Fingerprint,
}

impl State {
    pub fn new(values: Vec<Value>) -> Self {
        let fp = compute_fingerprint(&values);
        Self {
            values: values.into(),
            fp,
        }
    }

    #[inline]
    pub fn fingerprint(&self) -> Fingerprint {
        self.fp
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[inline]
    pub fn get(&self, param: usize) -> &Value {
        &self.values[param]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.fp == other.fp && self.values == other.values
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fp.0.hash(state);
    }
}

/// Lexicographic on values. Used to pick a canonical member of a component.
impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        self.values.cmp(&other.values)
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State{}", self)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

impl Serialize for State {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for v in self.values.iter() {
            seq.serialize_element(v)?;
        }
        seq.end()
    }
}
