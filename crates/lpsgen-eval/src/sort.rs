//! Finite sorts and their canonical domain order.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// The sort of a variable. All sorts are finite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    /// Integers `lo..=hi`.
    Range { lo: i64, hi: i64 },
    /// Enumerated constants, in declaration order.
    Enum(Arc<[Arc<str>]>),
}

impl Sort {
    pub fn range(lo: i64, hi: i64) -> Self {
        Sort::Range { lo, hi }
    }

    pub fn enumeration<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Sort::Enum(names.into_iter().map(|s| Arc::from(s.as_ref())).collect())
    }

    /// All values of the sort in canonical (ascending) order.
    pub fn domain(&self) -> Vec<Value> {
        match self {
            Sort::Bool => vec![Value::Bool(false), Value::Bool(true)],
            Sort::Range { lo, hi } => (*lo..=*hi).map(Value::Int).collect(),
            Sort::Enum(names) => names.iter().map(|n| Value::Sym(n.clone())).collect(),
        }
    }

    /// The value at position `index` of the canonical order, computed
    /// without materializing the domain.
    pub fn nth(&self, index: u64) -> Option<Value> {
        if index >= self.size() {
            return None;
        }
        match self {
            Sort::Bool => Some(Value::Bool(index == 1)),
            Sort::Range { lo, .. } => lo.checked_add_unsigned(index).map(Value::Int),
            Sort::Enum(names) => names.get(index as usize).map(|n| Value::Sym(n.clone())),
        }
    }

    /// Number of values in the sort.
    pub fn size(&self) -> u64 {
        match self {
            Sort::Bool => 2,
            Sort::Range { lo, hi } => {
                if hi < lo {
                    0
                } else {
                    hi.abs_diff(*lo).saturating_add(1)
                }
            }
            Sort::Enum(names) => names.len() as u64,
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        match (self, value) {
            (Sort::Bool, Value::Bool(_)) => true,
            (Sort::Range { lo, hi }, Value::Int(n)) => lo <= n && n <= hi,
            (Sort::Enum(names), Value::Sym(s)) => names.iter().any(|n| n == s),
            _ => false,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Range { lo, hi } => write!(f, "{}..{}", lo, hi),
            Sort::Enum(names) => {
                write!(f, "{{")?;
                for (i, n) in names.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", n)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_domain() {
        let s = Sort::range(-1, 1);
        assert_eq!(s.domain(), vec![Value::int(-1), Value::int(0), Value::int(1)]);
        assert_eq!(s.size(), 3);
        assert!(s.contains(&Value::int(0)));
        assert!(!s.contains(&Value::int(2)));
        assert!(!s.contains(&Value::bool(true)));
    }

    #[test]
    fn test_nth_matches_domain() {
        for s in [Sort::Bool, Sort::range(-2, 3), Sort::enumeration(["a", "b", "c"])] {
            let walked: Vec<Value> = (0..s.size()).filter_map(|i| s.nth(i)).collect();
            assert_eq!(walked, s.domain());
            assert_eq!(s.nth(s.size()), None);
        }
        let wide = Sort::range(0, i64::MAX);
        assert_eq!(wide.nth(1 << 40), Some(Value::int(1 << 40)));
    }

    #[test]
    fn test_empty_range() {
        let s = Sort::range(3, 2);
        assert!(s.domain().is_empty());
        assert_eq!(s.size(), 0);
    }

    #[test]
    fn test_enum_domain_order() {
        let s = Sort::enumeration(["idle", "busy"]);
        assert_eq!(s.domain(), vec![Value::sym("idle"), Value::sym("busy")]);
        assert_eq!(s.to_string(), "{idle, busy}");
    }
}
