//! Enumeration of variable valuations satisfying a predicate.

use crate::eval::{EvalResult, Evaluator, Substitution};
use crate::expr::{Expr, Variable};
use crate::value::Value;
use smallvec::SmallVec;

/// Values for an ordered list of variables.
pub type Valuation = SmallVec<[Value; 4]>;

/// One enumerated valuation and the value the predicate reduced to under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub values: Valuation,
    pub result: Value,
}

/// Lazy solver for `{ vars | predicate }`.
///
/// Valuations for which the predicate reduces to `false` are skipped; any
/// other result (including a non-boolean one) is reported, so callers can
/// detect predicates that do not reduce to a boolean constant.
pub trait Enumerator: Evaluator {
    fn solve<'a>(
        &'a self,
        vars: &'a [Variable],
        predicate: &'a Expr,
        sigma: &Substitution,
    ) -> Box<dyn Iterator<Item = EvalResult<Solution>> + 'a>;
}

impl Enumerator for crate::Rewriter {
    fn solve<'a>(
        &'a self,
        vars: &'a [Variable],
        predicate: &'a Expr,
        sigma: &Substitution,
    ) -> Box<dyn Iterator<Item = EvalResult<Solution>> + 'a> {
        Box::new(DomainWalk::new(self, vars, predicate, sigma.clone()))
    }
}

/// Odometer over the cartesian product of the variables' sort domains.
/// The first variable is the most significant digit. Values are produced
/// from their position in the sort, so no domain is materialized.
pub struct DomainWalk<'a, E: Evaluator> {
    evaluator: &'a E,
    vars: &'a [Variable],
    predicate: &'a Expr,
    sigma: Substitution,
    sizes: SmallVec<[u64; 4]>,
    digits: SmallVec<[u64; 4]>,
    done: bool,
}

impl<'a, E: Evaluator> DomainWalk<'a, E> {
    pub fn new(
        evaluator: &'a E,
        vars: &'a [Variable],
        predicate: &'a Expr,
        sigma: Substitution,
    ) -> Self {
        let sizes: SmallVec<[u64; 4]> = vars.iter().map(|v| v.sort.size()).collect();
        let done = sizes.iter().any(|&n| n == 0);
        Self {
            evaluator,
            vars,
            predicate,
            sigma,
            digits: SmallVec::from_elem(0, sizes.len()),
            sizes,
            done,
        }
    }

    fn advance(&mut self) {
        for pos in (0..self.digits.len()).rev() {
            self.digits[pos] += 1;
            if self.digits[pos] < self.sizes[pos] {
                return;
            }
            self.digits[pos] = 0;
        }
        self.done = true;
    }
}

impl<E: Evaluator> Iterator for DomainWalk<'_, E> {
    type Item = EvalResult<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let values: Valuation = self
                .digits
                .iter()
                .zip(self.vars)
                .filter_map(|(&d, var)| var.sort.nth(d))
                .collect();
            for (var, value) in self.vars.iter().zip(&values) {
                self.sigma.bind(var.idx, value.clone());
            }
            self.advance();

            match self.evaluator.evaluate(self.predicate, &self.sigma) {
                Ok(result) if result.is_false() => continue,
                Ok(result) => return Some(Ok(Solution { values, result })),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
