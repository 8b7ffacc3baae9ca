//! JSON model descriptions.
//!
//! A [`ModelDef`] names everything: parameters, summation and distribution
//! variables, and enumerated constants are referred to by name and resolved
//! to variable slots when the definition is lowered into a [`Model`].
//! Summands list assignments only for the parameters they change.
//!
//! ```json
//! {
//!   "params": [{ "name": "x", "sort": { "kind": "Range", "lo": 0, "hi": 3 } }],
//!   "summands": [{
//!     "condition": { "kind": "Binary", "op": "lt",
//!                    "left": { "kind": "Var", "name": "x" },
//!                    "right": { "kind": "Int", "value": 3 } },
//!     "actions": [{ "label": "inc" }],
//!     "assign": [{ "param": "x", "value": { "kind": "Binary", "op": "add",
//!                  "left": { "kind": "Var", "name": "x" },
//!                  "right": { "kind": "Int", "value": 1 } } }]
//!   }],
//!   "init": { "values": [{ "kind": "Int", "value": 0 }] }
//! }
//! ```

use crate::model::{Distribution, Model, ModelBuilder, ModelError, Summand};
use lpsgen_eval::{BinOp, Expr, Sort, UnaryOp, Variable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("`{0}` is declared twice")]
    DuplicateName(String),

    #[error("unknown variable `{0}`")]
    UnknownName(String),

    #[error("unknown constant `{0}`")]
    UnknownConstant(String),

    #[error("empty sort for `{0}`")]
    EmptySort(String),

    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    #[error("summand {summand}: `{name}` is not a process parameter")]
    UnknownParam { summand: usize, name: String },

    #[error("summand {summand}: parameter `{name}` is assigned twice")]
    DuplicateAssignment { summand: usize, name: String },

    #[error("{context}: expected {expected}, found {found}")]
    SortMismatch {
        context: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type LoadResult<T> = Result<T, LoadError>;

/// A model description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDef {
    pub params: Vec<VarDef>,
    #[serde(default)]
    pub summands: Vec<SummandDef>,
    pub init: InitDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub sort: SortDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum SortDef {
    Bool,
    Range { lo: i64, hi: i64 },
    Enum { values: Vec<String> },
}

/// A summand. A missing condition is `true`; no actions is `tau`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummandDef {
    #[serde(default)]
    pub sum: Vec<VarDef>,
    #[serde(default)]
    pub condition: Option<ExprDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    /// Only the listed parameters change; all others keep their value.
    #[serde(default)]
    pub assign: Vec<AssignDef>,
    #[serde(default)]
    pub distribution: Option<DistributionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionDef {
    pub label: String,
    #[serde(default)]
    pub args: Vec<ExprDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignDef {
    pub param: String,
    pub value: ExprDef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionDef {
    pub vars: Vec<VarDef>,
    pub weight: ExprDef,
}

/// The initial state: one value per parameter, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitDef {
    pub values: Vec<ExprDef>,
    #[serde(default)]
    pub distribution: Option<DistributionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum ExprDef {
    Bool {
        value: bool,
    },
    Int {
        value: i64,
    },
    Real {
        num: i64,
        den: i64,
    },
    /// A constant of an enumerated sort.
    Sym {
        value: String,
    },
    Var {
        name: String,
    },
    Not {
        operand: Box<ExprDef>,
    },
    Neg {
        operand: Box<ExprDef>,
    },
    Binary {
        op: BinOpDef,
        left: Box<ExprDef>,
        right: Box<ExprDef>,
    },
    If {
        cond: Box<ExprDef>,
        then_branch: Box<ExprDef>,
        else_branch: Box<ExprDef>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinOpDef {
    And,
    Or,
    Implies,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl From<BinOpDef> for BinOp {
    fn from(op: BinOpDef) -> Self {
        match op {
            BinOpDef::And => BinOp::And,
            BinOpDef::Or => BinOp::Or,
            BinOpDef::Implies => BinOp::Implies,
            BinOpDef::Eq => BinOp::Eq,
            BinOpDef::Ne => BinOp::Ne,
            BinOpDef::Lt => BinOp::Lt,
            BinOpDef::Le => BinOp::Le,
            BinOpDef::Gt => BinOp::Gt,
            BinOpDef::Ge => BinOp::Ge,
            BinOpDef::Add => BinOp::Add,
            BinOpDef::Sub => BinOp::Sub,
            BinOpDef::Mul => BinOp::Mul,
            BinOpDef::Div => BinOp::Div,
            BinOpDef::Mod => BinOp::Mod,
        }
    }
}

/// Read and lower a model file.
pub fn from_path(path: &Path) -> LoadResult<Model> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_json(&text)
}

pub fn from_json(text: &str) -> LoadResult<Model> {
    let def: ModelDef = serde_json::from_str(text)?;
    lower(&def)
}

/// Resolve names, check sorts and build the model.
pub fn lower(def: &ModelDef) -> LoadResult<Model> {
    let mut b = ModelBuilder::new();
    let mut lowerer = Lowerer::default();

    for p in &def.params {
        if lowerer.params.iter().any(|v| *v.name == *p.name) {
            return Err(LoadError::DuplicateName(p.name.clone()));
        }
        let sort = lowerer.sort(p)?;
        let v = b.param(&p.name, sort);
        lowerer.params.push(v);
    }

    for (index, s) in def.summands.iter().enumerate() {
        let summand = lowerer.summand(&mut b, index, s)?;
        b.summand(summand);
    }

    lowerer.locals.clear();
    let dist = match &def.init.distribution {
        Some(d) => Some(lowerer.distribution(&mut b, d, "initial distribution")?),
        None => None,
    };
    let params = lowerer.params.clone();
    let mut values = Vec::with_capacity(def.init.values.len());
    for (i, e) in def.init.values.iter().enumerate() {
        let expr = match params.get(i) {
            Some(p) => lowerer.expect_sort(e, &p.sort, &format!("initial value of `{}`", p.name))?,
            None => lowerer.expr(e)?.0,
        };
        values.push(expr);
    }
    match dist {
        Some(d) => b.initial_distribution(values, d),
        None => b.initial(values),
    };

    Ok(b.build()?)
}

/// Coarse sort used for checking: enumerated sorts are compared by their constants.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Bool,
    Num,
    Enum(Arc<[Arc<str>]>),
}

impl Kind {
    fn of(sort: &Sort) -> Self {
        match sort {
            Sort::Bool => Kind::Bool,
            Sort::Range { .. } => Kind::Num,
            Sort::Enum(names) => Kind::Enum(Arc::clone(names)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Bool => write!(f, "Bool"),
            Kind::Num => write!(f, "a number"),
            Kind::Enum(names) => {
                let names: Vec<&str> = names.iter().map(|n| &**n).collect();
                write!(f, "one of {{{}}}", names.join(", "))
            }
        }
    }
}

#[derive(Default)]
struct Lowerer {
    params: Vec<Variable>,
    /// Summation and distribution variables in scope; later ones shadow earlier ones.
    locals: Vec<Variable>,
    /// Enumerated constant -> its sort.
    constants: HashMap<String, Arc<[Arc<str>]>>,
}

impl Lowerer {
    fn sort(&mut self, var: &VarDef) -> LoadResult<Sort> {
        let sort = match &var.sort {
            SortDef::Bool => Sort::Bool,
            SortDef::Range { lo, hi } => {
                if hi < lo {
                    return Err(LoadError::EmptySort(var.name.clone()));
                }
                Sort::range(*lo, *hi)
            }
            SortDef::Enum { values } => {
                if values.is_empty() {
                    return Err(LoadError::EmptySort(var.name.clone()));
                }
                Sort::enumeration(values)
            }
        };
        if let Sort::Enum(names) = &sort {
            for name in names.iter() {
                match self.constants.get(&**name) {
                    Some(existing) if existing != names => {
                        return Err(LoadError::DuplicateName(name.to_string()));
                    }
                    Some(_) => {}
                    None => {
                        self.constants.insert(name.to_string(), Arc::clone(names));
                    }
                }
            }
        }
        Ok(sort)
    }

    fn declare(&mut self, b: &mut ModelBuilder, var: &VarDef) -> LoadResult<Variable> {
        let sort = self.sort(var)?;
        let v = b.var(&var.name, sort);
        self.locals.push(v.clone());
        Ok(v)
    }

    fn lookup(&self, name: &str) -> LoadResult<&Variable> {
        self.locals
            .iter()
            .rev()
            .chain(self.params.iter())
            .find(|v| &*v.name == name)
            .ok_or_else(|| LoadError::UnknownName(name.to_string()))
    }

    fn summand(&mut self, b: &mut ModelBuilder, index: usize, def: &SummandDef) -> LoadResult<Summand> {
        self.locals.clear();
        let context = |what: &str| format!("summand {}: {}", index, what);

        let mut bound = Vec::with_capacity(def.sum.len());
        for var in &def.sum {
            bound.push(self.declare(b, var)?);
        }
        let condition = match &def.condition {
            Some(e) => self.expect_sort(e, &Sort::Bool, &context("condition"))?,
            None => Expr::bool(true),
        };

        let mut actions = Vec::with_capacity(def.actions.len());
        for a in &def.actions {
            let args = a
                .args
                .iter()
                .map(|e| self.expr(e).map(|(expr, _)| expr))
                .collect::<LoadResult<Vec<_>>>()?;
            actions.push((a.label.as_str(), args));
        }

        // The distribution variables are in scope of the assignments.
        let distribution = match &def.distribution {
            Some(d) => Some(self.distribution(b, d, &context("distribution"))?),
            None => None,
        };

        let mut next_state: Vec<Option<Expr>> = vec![None; self.params.len()];
        for assign in &def.assign {
            let Some(pos) = self.params.iter().position(|p| *p.name == *assign.param) else {
                return Err(LoadError::UnknownParam {
                    summand: index,
                    name: assign.param.clone(),
                });
            };
            if next_state[pos].is_some() {
                return Err(LoadError::DuplicateAssignment {
                    summand: index,
                    name: assign.param.clone(),
                });
            }
            let sort = self.params[pos].sort.clone();
            let what = context(&format!("assignment to `{}`", assign.param));
            next_state[pos] = Some(self.expect_sort(&assign.value, &sort, &what)?);
        }
        let next_state = next_state
            .into_iter()
            .zip(&self.params)
            .map(|(e, p)| e.unwrap_or_else(|| p.expr()))
            .collect();

        let mut summand = Summand::new(condition, next_state);
        for v in bound {
            summand = summand.sum(v);
        }
        for (label, args) in actions {
            summand = summand.action(label, args);
        }
        if let Some(d) = distribution {
            summand = summand.distribution(d.vars, d.weight);
        }
        Ok(summand)
    }

    fn distribution(&mut self, b: &mut ModelBuilder, def: &DistributionDef, context: &str) -> LoadResult<Distribution> {
        let mut vars = Vec::with_capacity(def.vars.len());
        for var in &def.vars {
            vars.push(self.declare(b, var)?);
        }
        let (weight, kind) = self.expr(&def.weight)?;
        if kind != Kind::Num {
            return Err(mismatch(&format!("{} weight", context), &Kind::Num, &kind));
        }
        Ok(Distribution::new(vars, weight))
    }

    fn expect_sort(&self, e: &ExprDef, sort: &Sort, context: &str) -> LoadResult<Expr> {
        let (expr, kind) = self.expr(e)?;
        let expected = Kind::of(sort);
        if kind != expected {
            return Err(mismatch(context, &expected, &kind));
        }
        Ok(expr)
    }

    fn expr(&self, e: &ExprDef) -> LoadResult<(Expr, Kind)> {
        Ok(match e {
            ExprDef::Bool { value } => (Expr::bool(*value), Kind::Bool),
            ExprDef::Int { value } => (Expr::int(*value), Kind::Num),
            ExprDef::Real { num, den } => {
                if *den == 0 {
                    return Err(LoadError::InvalidLiteral(format!("{}/{}", num, den)));
                }
                (Expr::real(*num, *den), Kind::Num)
            }
            ExprDef::Sym { value } => {
                let sort = self
                    .constants
                    .get(value)
                    .ok_or_else(|| LoadError::UnknownConstant(value.clone()))?;
                (Expr::sym(value), Kind::Enum(Arc::clone(sort)))
            }
            ExprDef::Var { name } => {
                let v = self.lookup(name)?;
                (v.expr(), Kind::of(&v.sort))
            }
            ExprDef::Not { operand } => {
                let operand = self.operand(operand, Kind::Bool, "!")?;
                (Expr::not(operand), Kind::Bool)
            }
            ExprDef::Neg { operand } => {
                let operand = self.operand(operand, Kind::Num, "-")?;
                let neg = Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                };
                (neg, Kind::Num)
            }
            ExprDef::Binary { op, left, right } => {
                let op = BinOp::from(*op);
                let symbol = op.symbol();
                let (operands, result) = match op {
                    BinOp::And | BinOp::Or | BinOp::Implies => (Some(Kind::Bool), Kind::Bool),
                    BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (Some(Kind::Num), Kind::Bool),
                    BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                        (Some(Kind::Num), Kind::Num)
                    }
                    BinOp::Eq | BinOp::Ne => (None, Kind::Bool),
                };
                let (l, r) = match operands {
                    Some(kind) => (
                        self.operand(left, kind.clone(), symbol)?,
                        self.operand(right, kind, symbol)?,
                    ),
                    None => {
                        let (l, lk) = self.expr(left)?;
                        let (r, rk) = self.expr(right)?;
                        if lk != rk {
                            return Err(mismatch(&format!("right operand of `{}`", symbol), &lk, &rk));
                        }
                        (l, r)
                    }
                };
                (Expr::binary(op, l, r), result)
            }
            ExprDef::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let cond = self.operand(cond, Kind::Bool, "if")?;
                let (t, tk) = self.expr(then_branch)?;
                let (f, fk) = self.expr(else_branch)?;
                if tk != fk {
                    return Err(mismatch("else branch of `if`", &tk, &fk));
                }
                (Expr::ite(cond, t, f), tk)
            }
        })
    }

    fn operand(&self, e: &ExprDef, expected: Kind, op: &str) -> LoadResult<Expr> {
        let (expr, kind) = self.expr(e)?;
        if kind != expected {
            return Err(mismatch(&format!("operand of `{}`", op), &expected, &kind));
        }
        Ok(expr)
    }
}

fn mismatch(context: &str, expected: &Kind, found: &Kind) -> LoadError {
    LoadError::SortMismatch {
        context: context.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}
