//! Expression evaluator.

use crate::expr::{BinOp, Expr, UnaryOp, VarIdx};
use crate::value::Value;
use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedMul, CheckedSub, Zero};
use std::cmp::Ordering;
use thiserror::Error;

/// Evaluation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("type mismatch in `{op}`: expected {expected}, got {actual}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        actual: String,
    },

    #[error("unbound variable {0}")]
    UnboundVariable(VarIdx),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow in `{0}`")]
    Overflow(&'static str),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Mapping from variable slots to values. Unbound slots evaluate to
/// "unknown" under [`Evaluator::partial`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    slots: Vec<Option<Value>>,
}

impl Substitution {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    #[inline]
    pub fn bind(&mut self, var: VarIdx, value: Value) {
        let i = var.index();
        if i >= self.slots.len() {
            self.slots.resize(i + 1, None);
        }
        self.slots[i] = Some(value);
    }

    #[inline]
    pub fn unbind(&mut self, var: VarIdx) {
        if let Some(slot) = self.slots.get_mut(var.index()) {
            *slot = None;
        }
    }

    #[inline]
    pub fn get(&self, var: VarIdx) -> Option<&Value> {
        self.slots.get(var.index()).and_then(|s| s.as_ref())
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

/// Pure, deterministic term evaluation.
pub trait Evaluator {
    /// Evaluate a closed expression. Every variable must be bound.
    fn evaluate(&self, expr: &Expr, sigma: &Substitution) -> EvalResult<Value>;

    /// Evaluate under a partial substitution. Returns `None` when the result
    /// depends on an unbound variable.
    fn partial(&self, expr: &Expr, sigma: &Substitution) -> EvalResult<Option<Value>>;
}

/// The reference evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rewriter;

impl Rewriter {
    pub fn new() -> Self {
        Rewriter
    }
}

impl Evaluator for Rewriter {
    fn evaluate(&self, expr: &Expr, sigma: &Substitution) -> EvalResult<Value> {
        match reduce(expr, sigma, true)? {
            Some(v) => Ok(v),
            // Strict mode reports the unbound variable itself; reaching here
            // would mean an open term slipped through.
            None => Err(EvalError::TypeMismatch {
                op: "evaluate",
                expected: "closed term",
                actual: expr.to_string(),
            }),
        }
    }

    fn partial(&self, expr: &Expr, sigma: &Substitution) -> EvalResult<Option<Value>> {
        reduce(expr, sigma, false)
    }
}

fn mismatch(op: &'static str, expected: &'static str, actual: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op,
        expected,
        actual: format!("{} {}", actual.type_name(), actual),
    }
}

fn expect_bool(op: &'static str, v: Option<Value>) -> EvalResult<Option<bool>> {
    match v {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(other) => Err(mismatch(op, "Bool", &other)),
    }
}

fn expect_numeric(op: &'static str, v: &Value) -> EvalResult<Rational64> {
    v.as_rational().ok_or_else(|| mismatch(op, "number", v))
}

/// Three-valued reduction. In strict mode an unbound variable is an error.
fn reduce(expr: &Expr, sigma: &Substitution, strict: bool) -> EvalResult<Option<Value>> {
    match expr {
        Expr::Lit(v) => Ok(Some(v.clone())),

        Expr::Var(idx) => match sigma.get(*idx) {
            Some(v) => Ok(Some(v.clone())),
            None if strict => Err(EvalError::UnboundVariable(*idx)),
            None => Ok(None),
        },

        Expr::Unary { op, operand } => {
            let v = reduce(operand, sigma, strict)?;
            match op {
                UnaryOp::Not => Ok(expect_bool("!", v)?.map(|b| Value::Bool(!b))),
                UnaryOp::Neg => match v {
                    None => Ok(None),
                    Some(Value::Int(n)) => n
                        .checked_neg()
                        .map(|n| Some(Value::Int(n)))
                        .ok_or(EvalError::Overflow("-")),
                    Some(Value::Real(r)) => Ok(Some(Value::Real(-r))),
                    Some(other) => Err(mismatch("-", "number", &other)),
                },
            }
        }

        Expr::Binary { op, left, right } => match op {
            BinOp::And | BinOp::Or | BinOp::Implies => {
                reduce_connective(*op, left, right, sigma, strict)
            }
            _ => {
                let l = reduce(left, sigma, strict)?;
                let r = reduce(right, sigma, strict)?;
                match (l, r) {
                    (Some(l), Some(r)) => apply_binary(*op, &l, &r).map(Some),
                    _ => Ok(None),
                }
            }
        },

        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => match expect_bool("if", reduce(cond, sigma, strict)?)? {
            Some(true) => reduce(then_branch, sigma, strict),
            Some(false) => reduce(else_branch, sigma, strict),
            None => {
                let t = reduce(then_branch, sigma, strict)?;
                let e = reduce(else_branch, sigma, strict)?;
                Ok(if t.is_some() && t == e { t } else { None })
            }
        },
    }
}

/// Boolean connectives short-circuit on a decided operand, even if the other
/// operand is unknown.
fn reduce_connective(
    op: BinOp,
    left: &Expr,
    right: &Expr,
    sigma: &Substitution,
    strict: bool,
) -> EvalResult<Option<Value>> {
    let sym = op.symbol();
    let l = expect_bool(sym, reduce(left, sigma, strict)?)?;
    let result = match (op, l) {
        (BinOp::And, Some(false)) => Some(false),
        (BinOp::Or, Some(true)) => Some(true),
        (BinOp::Implies, Some(false)) => Some(true),
        _ => {
            let r = expect_bool(sym, reduce(right, sigma, strict)?)?;
            match (op, l, r) {
                (BinOp::And, _, Some(false)) => Some(false),
                (BinOp::And, Some(true), Some(true)) => Some(true),
                (BinOp::Or, _, Some(true)) => Some(true),
                (BinOp::Or, Some(false), Some(false)) => Some(false),
                (BinOp::Implies, _, Some(true)) => Some(true),
                (BinOp::Implies, Some(true), Some(false)) => Some(false),
                _ => None,
            }
        }
    };
    Ok(result.map(Value::Bool))
}

fn compare(op: &'static str, l: &Value, r: &Value) -> EvalResult<Ordering> {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        _ => Ok(expect_numeric(op, l)?.cmp(&expect_numeric(op, r)?)),
    }
}

fn values_equal(l: &Value, r: &Value) -> bool {
    match (l.as_rational(), r.as_rational()) {
        (Some(a), Some(b)) => a == b,
        _ => l == r,
    }
}

fn apply_binary(op: BinOp, l: &Value, r: &Value) -> EvalResult<Value> {
    let sym = op.symbol();
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(l, r))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(l, r))),
        BinOp::Lt => Ok(Value::Bool(compare(sym, l, r)?.is_lt())),
        BinOp::Le => Ok(Value::Bool(compare(sym, l, r)?.is_le())),
        BinOp::Gt => Ok(Value::Bool(compare(sym, l, r)?.is_gt())),
        BinOp::Ge => Ok(Value::Bool(compare(sym, l, r)?.is_ge())),

        BinOp::Add | BinOp::Sub | BinOp::Mul => {
            if let (Value::Int(a), Value::Int(b)) = (l, r) {
                let (a, b) = (*a, *b);
                let result = match op {
                    BinOp::Add => a.checked_add(b),
                    BinOp::Sub => a.checked_sub(b),
                    _ => a.checked_mul(b),
                };
                return result.map(Value::Int).ok_or(EvalError::Overflow(sym));
            }
            let a = expect_numeric(sym, l)?;
            let b = expect_numeric(sym, r)?;
            let result = match op {
                BinOp::Add => a.checked_add(&b),
                BinOp::Sub => a.checked_sub(&b),
                _ => a.checked_mul(&b),
            };
            result.map(Value::Real).ok_or(EvalError::Overflow(sym))
        }

        BinOp::Div => {
            let a = expect_numeric(sym, l)?;
            let b = expect_numeric(sym, r)?;
            if b.is_zero() {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Real(a / b))
        }

        BinOp::Mod => match (l, r) {
            (Value::Int(_), Value::Int(0)) => Err(EvalError::DivisionByZero),
            (Value::Int(a), Value::Int(b)) => (*a)
                .checked_rem_euclid(*b)
                .map(Value::Int)
                .ok_or(EvalError::Overflow(sym)),
            (Value::Int(_), other) | (other, _) => Err(mismatch(sym, "Int", other)),
        },

        BinOp::And | BinOp::Or | BinOp::Implies => {
            unreachable!("connectives are reduced by reduce_connective")
        }
    }
}
