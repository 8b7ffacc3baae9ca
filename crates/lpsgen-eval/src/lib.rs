//! Data layer for lpsgen: values, sorts, expressions and the reference
//! evaluator and enumerator consumed by the state space generator.

pub mod enumerate;
pub mod eval;
pub mod expr;
pub mod sort;
pub mod value;

pub use enumerate::{Enumerator, Solution, Valuation};
pub use eval::{EvalError, EvalResult, Evaluator, Rewriter, Substitution};
pub use expr::{BinOp, Expr, UnaryOp, VarIdx, Variable};
pub use sort::Sort;
pub use value::Value;
