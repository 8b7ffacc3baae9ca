//! Runtime data values.
//!
//! Values are immutable and compared structurally: two values are equal iff
//! they have the same variant and the same payload. `Int(1)` and `Real(1/1)`
//! are therefore distinct values, even though the evaluator treats them as
//! numerically equal in comparisons.

use num_rational::Rational64;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A data value. Clone is O(1) for every variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(Rational64),
    /// Constant of an enumerated sort.
    Sym(Arc<str>),
}

impl Value {
    #[inline]
    pub fn int(n: i64) -> Self {
        Value::Int(n)
    }

    #[inline]
    pub fn bool(b: bool) -> Self {
        Value::Bool(b)
    }

    /// Exact rational `num / den`. Panics if `den` is zero.
    pub fn real(num: i64, den: i64) -> Self {
        Value::Real(Rational64::new(num, den))
    }

    pub fn sym(name: &str) -> Self {
        Value::Sym(Arc::from(name))
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value: integers are promoted to rationals.
    #[inline]
    pub fn as_rational(&self) -> Option<Rational64> {
        match self {
            Value::Int(n) => Some(Rational64::from_integer(*n)),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    #[inline]
    pub fn is_true(&self) -> bool {
        matches!(self, Value::Bool(true))
    }

    #[inline]
    pub fn is_false(&self) -> bool {
        matches!(self, Value::Bool(false))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Real(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Real(_) => "Real",
            Value::Sym(_) => "Sym",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Rational64> for Value {
    fn from(r: Rational64) -> Self {
        Value::Real(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Real(r) => {
                if *r.denom() == 1 {
                    write!(f, "{}", r.numer())
                } else {
                    write!(f, "{}/{}", r.numer(), r.denom())
                }
            }
            Value::Sym(s) => write!(f, "{}", s),
        }
    }
}
