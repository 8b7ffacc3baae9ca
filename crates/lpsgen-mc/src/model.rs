//! Linear process models: process parameters, summands and the initial state.
//!
//! A model is built once (programmatically through [`ModelBuilder`] or from
//! JSON through [`crate::load`]) and is immutable afterwards.

use lpsgen_eval::{Expr, Sort, Variable};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Model construction error.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("summand {summand} assigns {actual} parameters, expected {expected}")]
    NextStateArity {
        summand: usize,
        expected: usize,
        actual: usize,
    },

    #[error("initial state has {actual} values, expected {expected}")]
    InitialArity { expected: usize, actual: usize },

    #[error("model has no initial state")]
    NoInitialState,
}

/// An action label with argument expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTemplate {
    pub label: Arc<str>,
    pub args: Vec<Expr>,
}

impl ActionTemplate {
    pub fn new(label: &str, args: Vec<Expr>) -> Self {
        Self {
            label: Arc::from(label),
            args,
        }
    }
}

/// A probability distribution over the values of `vars`, weighted by `weight`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    pub vars: Vec<Variable>,
    pub weight: Expr,
}

impl Distribution {
    pub fn new(vars: Vec<Variable>, weight: Expr) -> Self {
        Self { vars, weight }
    }
}

/// One guarded transition rule.
#[derive(Debug, Clone)]
pub struct Summand {
    pub condition: Expr,
    /// Summation variables, enumerated in order.
    pub bound: Vec<Variable>,
    /// One expression per process parameter.
    pub next_state: Vec<Expr>,
    /// Empty for `tau`.
    pub actions: Vec<ActionTemplate>,
    pub distribution: Option<Distribution>,
    condition_params: Vec<usize>,
}

impl Summand {
    pub fn new(condition: Expr, next_state: Vec<Expr>) -> Self {
        Self {
            condition,
            bound: Vec::new(),
            next_state,
            actions: Vec::new(),
            distribution: None,
            condition_params: Vec::new(),
        }
    }

    pub fn sum(mut self, var: Variable) -> Self {
        self.bound.push(var);
        self
    }

    pub fn action(mut self, label: &str, args: Vec<Expr>) -> Self {
        self.actions.push(ActionTemplate::new(label, args));
        self
    }

    pub fn distribution(mut self, vars: Vec<Variable>, weight: Expr) -> Self {
        self.distribution = Some(Distribution::new(vars, weight));
        self
    }

    pub fn is_tau(&self) -> bool {
        self.actions.is_empty()
    }

    /// Positions of the process parameters occurring in the condition.
    pub fn condition_params(&self) -> &[usize] {
        &self.condition_params
    }

    /// Whether every action of the summand is internal: `tau`, or one of `hidden`.
    pub fn is_hidden(&self, hidden: &[String]) -> bool {
        self.actions
            .iter()
            .all(|a| hidden.iter().any(|h| h.as_str() == &*a.label))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.actions.iter().any(|a| &*a.label == label)
    }
}

/// The initial state, possibly distributed.
#[derive(Debug, Clone)]
pub struct InitialState {
    pub values: Vec<Expr>,
    pub distribution: Option<Distribution>,
}

/// An immutable linear process model.
#[derive(Debug, Clone)]
pub struct Model {
    params: Vec<Variable>,
    summands: Vec<Summand>,
    initial: InitialState,
    var_count: usize,
}

impl Model {
    pub fn params(&self) -> &[Variable] {
        &self.params
    }

    pub fn summands(&self) -> &[Summand] {
        &self.summands
    }

    pub fn initial(&self) -> &InitialState {
        &self.initial
    }

    /// Number of variable slots a substitution for this model needs.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Indices of the summands satisfying `pred`, ascending.
    pub fn summands_where(&self, pred: impl Fn(&Summand) -> bool) -> Vec<usize> {
        self.summands
            .iter()
            .enumerate()
            .filter(|(_, s)| pred(s))
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.params {
            writeln!(f, "param {}: {}", p.name, p.sort)?;
        }
        for (i, s) in self.summands.iter().enumerate() {
            let label = if s.is_tau() {
                crate::action::TAU.to_string()
            } else {
                s.actions
                    .iter()
                    .map(|a| a.label.to_string())
                    .collect::<Vec<_>>()
                    .join("|")
            };
            write!(f, "summand {}: {} when {}", i, label, s.condition)?;
            if !s.bound.is_empty() {
                let names: Vec<&str> = s.bound.iter().map(|v| &*v.name).collect();
                write!(f, " sum {}", names.join(", "))?;
            }
            if s.distribution.is_some() {
                write!(f, " (probabilistic)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Incremental model construction. Every variable (parameter, summation or
/// distribution variable) gets its own substitution slot.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    params: Vec<Variable>,
    summands: Vec<Summand>,
    initial: Option<InitialState>,
    next_slot: u32,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a process parameter.
    pub fn param(&mut self, name: &str, sort: Sort) -> Variable {
        let v = self.var(name, sort);
        self.params.push(v.clone());
        v
    }

    /// Declare a summation or distribution variable.
    pub fn var(&mut self, name: &str, sort: Sort) -> Variable {
        let v = Variable::new(self.next_slot, name, sort);
        self.next_slot += 1;
        v
    }

    pub fn summand(&mut self, summand: Summand) -> &mut Self {
        self.summands.push(summand);
        self
    }

    pub fn initial(&mut self, values: Vec<Expr>) -> &mut Self {
        self.initial = Some(InitialState {
            values,
            distribution: None,
        });
        self
    }

    pub fn initial_distribution(&mut self, values: Vec<Expr>, dist: Distribution) -> &mut Self {
        self.initial = Some(InitialState {
            values,
            distribution: Some(dist),
        });
        self
    }

    pub fn build(self) -> Result<Model, ModelError> {
        let n = self.params.len();
        let initial = self.initial.ok_or(ModelError::NoInitialState)?;
        if initial.values.len() != n {
            return Err(ModelError::InitialArity {
                expected: n,
                actual: initial.values.len(),
            });
        }

        let mut summands = self.summands;
        for (i, s) in summands.iter_mut().enumerate() {
            if s.next_state.len() != n {
                return Err(ModelError::NextStateArity {
                    summand: i,
                    expected: n,
                    actual: s.next_state.len(),
                });
            }
            s.condition_params = self
                .params
                .iter()
                .enumerate()
                .filter(|(_, p)| s.condition.mentions(p.idx))
                .map(|(pos, _)| pos)
                .collect();
        }

        Ok(Model {
            params: self.params,
            summands,
            initial,
            var_count: self.next_slot as usize,
        })
    }
}
