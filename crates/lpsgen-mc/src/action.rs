//! Concrete (evaluated) actions.

use lpsgen_eval::Value;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// The label printed for the empty multi-action.
pub const TAU: &str = "tau";

/// An action label applied to evaluated arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Action {
    pub label: Arc<str>,
    pub args: Vec<Value>,
}

impl Action {
    pub fn new(label: &str, args: Vec<Value>) -> Self {
        Self {
            label: Arc::from(label),
            args,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)?;
        if !self.args.is_empty() {
            write!(f, "(")?;
            for (i, a) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", a)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A multi-action. The empty multi-action is the internal action `tau`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MultiAction(pub SmallVec<[Action; 1]>);

impl MultiAction {
    pub fn tau() -> Self {
        MultiAction(SmallVec::new())
    }

    pub fn single(action: Action) -> Self {
        let mut actions = SmallVec::new();
        actions.push(action);
        MultiAction(actions)
    }

    pub fn is_tau(&self) -> bool {
        self.0.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.0
    }

    /// The first argument of a single-action multi-action, if it is numeric.
    /// Value-prioritized strategies order transitions by this value.
    pub fn numeric_argument(&self) -> Option<&Value> {
        match self.0.as_slice() {
            [action] => action.args.first().filter(|v| v.is_numeric()),
            _ => None,
        }
    }
}

impl fmt::Display for MultiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{}", TAU);
        }
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{}", a)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(MultiAction::tau().to_string(), "tau");
        let ma = MultiAction(SmallVec::from_vec(vec![
            Action::new("a", vec![Value::int(1)]),
            Action::new("b", vec![]),
        ]));
        assert_eq!(ma.to_string(), "a(1)|b");
    }

    #[test]
    fn test_numeric_argument() {
        let ma = MultiAction::single(Action::new("send", vec![Value::int(4), Value::bool(true)]));
        assert_eq!(ma.numeric_argument(), Some(&Value::int(4)));
        let ma = MultiAction::single(Action::new("send", vec![Value::sym("x")]));
        assert_eq!(ma.numeric_argument(), None);
        assert_eq!(MultiAction::tau().numeric_argument(), None);
    }
}
