//! Data expressions.

use crate::sort::Sort;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Index of a variable slot in a [`crate::Substitution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarIdx(pub u32);

impl VarIdx {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A typed variable: a process parameter, a summation variable or a
/// distribution variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Variable {
    pub idx: VarIdx,
    pub name: Arc<str>,
    pub sort: Sort,
}

impl Variable {
    pub fn new(idx: u32, name: &str, sort: Sort) -> Self {
        Self {
            idx: VarIdx(idx),
            name: Arc::from(name),
            sort,
        }
    }

    /// Expression referring to this variable.
    pub fn expr(&self) -> Expr {
        Expr::Var(self.idx)
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
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
    /// Exact division, always producing a rational.
    Div,
    Mod,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Implies => "=>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "mod",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// A data expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Lit(Value),
    Var(VarIdx),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

impl Expr {
    pub fn int(n: i64) -> Self {
        Expr::Lit(Value::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Lit(Value::Bool(b))
    }

    pub fn real(num: i64, den: i64) -> Self {
        Expr::Lit(Value::real(num, den))
    }

    pub fn sym(name: &str) -> Self {
        Expr::Lit(Value::sym(name))
    }

    pub fn var(idx: u32) -> Self {
        Expr::Var(VarIdx(idx))
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::And, left, right)
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Or, left, right)
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Eq, left, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Lt, left, right)
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Self::binary(BinOp::Sub, left, right)
    }

    pub fn not(operand: Expr) -> Self {
        Expr::Unary {
            op: UnaryOp::Not,
            operand: Box::new(operand),
        }
    }

    pub fn ite(cond: Expr, then_branch: Expr, else_branch: Expr) -> Self {
        Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    /// Whether `var` occurs in the expression.
    pub fn mentions(&self, var: VarIdx) -> bool {
        match self {
            Expr::Lit(_) => false,
            Expr::Var(v) => *v == var,
            Expr::Unary { operand, .. } => operand.mentions(var),
            Expr::Binary { left, right, .. } => left.mentions(var) || right.mentions(var),
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => cond.mentions(var) || then_branch.mentions(var) || else_branch.mentions(var),
        }
    }

    /// Collect every variable occurring in the expression (with repeats).
    pub fn collect_vars(&self, out: &mut Vec<VarIdx>) {
        match self {
            Expr::Lit(_) => {}
            Expr::Var(v) => out.push(*v),
            Expr::Unary { operand, .. } => operand.collect_vars(out),
            Expr::Binary { left, right, .. } => {
                left.collect_vars(out);
                right.collect_vars(out);
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_vars(out);
                then_branch.collect_vars(out);
                else_branch.collect_vars(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{}", v),
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "!({})", operand),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-({})", operand),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "if({}, {}, {})", cond, then_branch, else_branch),
        }
    }
}
