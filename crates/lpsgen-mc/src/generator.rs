//! Next-state generation.
//!
//! [`NextStateGenerator::enumerate`] lists the transitions of a state for a
//! summand subset, ordered by summand index and then by the enumerator's
//! order over the summation variables. Guard solutions are memoized in an
//! [`EnumerationCache`]; candidate summands are narrowed by a per-subset
//! [`PruningTree`]. Both are transparent: switching them off changes the cost
//! of generation, never its result.

use crate::action::{Action, MultiAction};
use crate::cache::{CacheKey, EnumerationCache};
use crate::model::{ActionTemplate, Distribution, Model, Summand};
use crate::pruning::PruningTree;
use crate::state::State;
use lpsgen_eval::{
    Enumerator, EvalError, EvalResult, Evaluator, Expr, Rewriter, Solution, Substitution,
    Valuation,
};
use num_rational::Rational64;
use num_traits::{One, Zero};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Where a generation error happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Initial,
    Summand { index: usize, state: State },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Initial => write!(f, "initial state"),
            Location::Summand { index, state } => write!(f, "summand {} in state {}", index, state),
        }
    }
}

/// Next-state generation error. All variants are fatal to an exploration.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{at}: condition `{guard}` rewrote to {result} instead of true")]
    Rewrite {
        at: Location,
        guard: String,
        result: String,
    },

    #[error("{at}: {source}")]
    Eval {
        at: Location,
        #[source]
        source: EvalError,
    },

    #[error("{at}: malformed distribution: {reason}")]
    MalformedDistribution { at: Location, reason: String },
}

impl GenerateError {
    pub fn location(&self) -> &Location {
        match self {
            GenerateError::Rewrite { at, .. }
            | GenerateError::Eval { at, .. }
            | GenerateError::MalformedDistribution { at, .. } => at,
        }
    }
}

pub type GenerateResult<T> = Result<T, GenerateError>;

/// A transition: the action, the primary target and, for probabilistic
/// summands, the remaining targets of the distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: MultiAction,
    pub target: State,
    pub probability: Rational64,
    pub alternatives: Vec<(State, Rational64)>,
    pub summand: usize,
}

impl Transition {
    /// Every target with its probability, primary target first.
    pub fn targets(&self) -> impl Iterator<Item = (&State, Rational64)> {
        std::iter::once((&self.target, self.probability))
            .chain(self.alternatives.iter().map(|(s, p)| (s, *p)))
    }

    pub fn is_probabilistic(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// Handle to a named summand subset registered with a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubsetId(usize);

impl SubsetId {
    /// The subset of all summands, registered by every generator.
    pub const ALL: SubsetId = SubsetId(0);
}

#[derive(Debug)]
struct SummandSubset {
    name: String,
    summands: Arc<[usize]>,
    pruning: Option<PruningTree>,
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    pub caching: bool,
    pub pruning: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            caching: true,
            pruning: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub pruning_nodes: usize,
}

pub struct NextStateGenerator<R: Enumerator = Rewriter> {
    model: Arc<Model>,
    rewriter: R,
    options: GeneratorOptions,
    subsets: Vec<SummandSubset>,
    cache: EnumerationCache,
    sigma: Substitution,
}

impl NextStateGenerator<Rewriter> {
    pub fn with_options(model: Arc<Model>, options: GeneratorOptions) -> Self {
        Self::new(model, Rewriter::new(), options)
    }
}

impl<R: Enumerator> NextStateGenerator<R> {
    pub fn new(model: Arc<Model>, rewriter: R, options: GeneratorOptions) -> Self {
        let sigma = Substitution::with_capacity(model.var_count());
        let all: Vec<usize> = (0..model.summands().len()).collect();
        let mut generator = Self {
            model,
            rewriter,
            options,
            subsets: Vec::new(),
            cache: EnumerationCache::new(),
            sigma,
        };
        generator.add_subset("all", all);
        generator
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn options(&self) -> GeneratorOptions {
        self.options
    }

    /// Register a subset of summands. Indices are sorted and deduplicated.
    pub fn add_subset(&mut self, name: &str, mut summands: Vec<usize>) -> SubsetId {
        summands.sort_unstable();
        summands.dedup();
        let summands: Arc<[usize]> = summands.into();
        let pruning = self
            .options
            .pruning
            .then(|| PruningTree::new(&self.model, Arc::clone(&summands)));
        if let Some(tree) = &pruning {
            debug!(
                subset = name,
                params = ?tree
                    .parameters()
                    .iter()
                    .map(|&p| self.model.params()[p].name.to_string())
                    .collect::<Vec<_>>(),
                "pruning parameters"
            );
        }
        self.subsets.push(SummandSubset {
            name: name.to_string(),
            summands,
            pruning,
        });
        SubsetId(self.subsets.len() - 1)
    }

    pub fn subset_name(&self, id: SubsetId) -> &str {
        &self.subsets[id.0].name
    }

    pub fn subset_summands(&self, id: SubsetId) -> &[usize] {
        &self.subsets[id.0].summands
    }

    /// Pruning parameter positions of a subset, or `None` without pruning.
    pub fn pruning_parameters(&self, id: SubsetId) -> Option<&[usize]> {
        self.subsets[id.0].pruning.as_ref().map(|t| t.parameters())
    }

    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            cache_entries: self.cache.len(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            pruning_nodes: self
                .subsets
                .iter()
                .filter_map(|s| s.pruning.as_ref())
                .map(|t| t.node_count())
                .sum(),
        }
    }

    /// The initial states with their probabilities.
    pub fn initial_states(&mut self) -> GenerateResult<Vec<(State, Rational64)>> {
        let model = Arc::clone(&self.model);
        let init = model.initial();
        let at = || Location::Initial;
        self.sigma.clear();
        match &init.distribution {
            None => {
                let state = eval_state(&self.rewriter, &self.sigma, &init.values)
                    .map_err(|source| GenerateError::Eval { at: at(), source })?;
                Ok(vec![(state, Rational64::one())])
            }
            Some(dist) => distribute(&self.rewriter, &mut self.sigma, dist, &init.values, &at),
        }
    }

    /// Lazily enumerate the transitions of `state` over `subset`.
    pub fn enumerate(&mut self, state: &State, subset: SubsetId) -> Transitions<'_, R> {
        let candidates = self.candidates(state, subset);
        Transitions {
            generator: self,
            state: state.clone(),
            candidates,
            next_candidate: 0,
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// All transitions of `state` over `subset`.
    pub fn transitions(&mut self, state: &State, subset: SubsetId) -> GenerateResult<Vec<Transition>> {
        self.enumerate(state, subset).collect()
    }

    /// Primary targets of all transitions of `state` over `subset`.
    pub fn successors(&mut self, state: &State, subset: SubsetId) -> GenerateResult<Vec<State>> {
        self.enumerate(state, subset)
            .map(|t| t.map(|t| t.target))
            .collect()
    }

    /// Transitions of a single summand.
    pub fn enumerate_summand(&mut self, state: &State, summand: usize) -> GenerateResult<Vec<Transition>> {
        let mut out = VecDeque::new();
        self.expand_summand(state, summand, &mut out)?;
        Ok(out.into())
    }

    fn candidates(&mut self, state: &State, subset: SubsetId) -> Arc<[usize]> {
        let subset = &mut self.subsets[subset.0];
        match &mut subset.pruning {
            Some(tree) => tree.candidates(&self.model, &self.rewriter, state),
            None => Arc::clone(&subset.summands),
        }
    }

    fn bind_state(&mut self, state: &State) {
        self.sigma.clear();
        for (param, value) in self.model.params().iter().zip(state.values()) {
            self.sigma.bind(param.idx, value.clone());
        }
    }

    fn expand_summand(
        &mut self,
        state: &State,
        index: usize,
        out: &mut VecDeque<Transition>,
    ) -> GenerateResult<()> {
        let model = Arc::clone(&self.model);
        let summand = &model.summands()[index];
        let at = || Location::Summand {
            index,
            state: state.clone(),
        };
        let eval_err = |source| GenerateError::Eval { at: at(), source };

        self.bind_state(state);
        let solutions = self.guard_solutions(state, index, summand, &at)?;

        for valuation in solutions.iter() {
            for (var, value) in summand.bound.iter().zip(valuation.iter()) {
                self.sigma.bind(var.idx, value.clone());
            }
            let action = eval_action(&self.rewriter, &self.sigma, &summand.actions).map_err(eval_err)?;
            let transition = match &summand.distribution {
                None => Transition {
                    action,
                    target: eval_state(&self.rewriter, &self.sigma, &summand.next_state)
                        .map_err(eval_err)?,
                    probability: Rational64::one(),
                    alternatives: Vec::new(),
                    summand: index,
                },
                Some(dist) => {
                    let mut targets =
                        distribute(&self.rewriter, &mut self.sigma, dist, &summand.next_state, &at)?;
                    let (target, probability) = targets.remove(0);
                    Transition {
                        action,
                        target,
                        probability,
                        alternatives: targets,
                        summand: index,
                    }
                }
            };
            out.push_back(transition);
        }
        Ok(())
    }

    fn guard_solutions(
        &mut self,
        state: &State,
        index: usize,
        summand: &Summand,
        at: &dyn Fn() -> Location,
    ) -> GenerateResult<Arc<[Valuation]>> {
        if !self.options.caching {
            return solve_guard(&self.rewriter, summand, &self.sigma, at).map(Into::into);
        }
        let key: CacheKey = (
            index,
            summand
                .condition_params()
                .iter()
                .map(|&p| state.get(p).clone())
                .collect(),
        );
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let solutions = solve_guard(&self.rewriter, summand, &self.sigma, at)?;
        Ok(self.cache.insert(key, solutions))
    }
}

/// Solutions of a summand's guard. Every reported solution must make the
/// guard rewrite to `true`.
fn solve_guard<R: Enumerator>(
    rewriter: &R,
    summand: &Summand,
    sigma: &Substitution,
    at: &dyn Fn() -> Location,
) -> GenerateResult<Vec<Valuation>> {
    let mut found = Vec::new();
    for solution in rewriter.solve(&summand.bound, &summand.condition, sigma) {
        let solution = solution.map_err(|source| GenerateError::Eval { at: at(), source })?;
        if !solution.result.is_true() {
            return Err(GenerateError::Rewrite {
                at: at(),
                guard: summand.condition.to_string(),
                result: solution.result.to_string(),
            });
        }
        found.push(solution.values);
    }
    Ok(found)
}

fn eval_state<E: Evaluator>(rewriter: &E, sigma: &Substitution, exprs: &[Expr]) -> EvalResult<State> {
    exprs
        .iter()
        .map(|e| rewriter.evaluate(e, sigma))
        .collect::<EvalResult<Vec<_>>>()
        .map(State::new)
}

fn eval_action<E: Evaluator>(
    rewriter: &E,
    sigma: &Substitution,
    templates: &[ActionTemplate],
) -> EvalResult<MultiAction> {
    let actions = templates
        .iter()
        .map(|t| {
            let args = t
                .args
                .iter()
                .map(|e| rewriter.evaluate(e, sigma))
                .collect::<EvalResult<Vec<_>>>()?;
            Ok(Action {
                label: Arc::clone(&t.label),
                args,
            })
        })
        .collect::<EvalResult<_>>()?;
    Ok(MultiAction(actions))
}

/// Targets of a distribution with their weights. Zero-weight instances are
/// dropped; what remains must be non-empty.
fn distribute<R: Enumerator>(
    rewriter: &R,
    sigma: &mut Substitution,
    dist: &Distribution,
    next_state: &[Expr],
    at: &dyn Fn() -> Location,
) -> GenerateResult<Vec<(State, Rational64)>> {
    let malformed = |reason: String| GenerateError::MalformedDistribution { at: at(), reason };
    let instances: Vec<Solution> = rewriter
        .solve(&dist.vars, &dist.weight, sigma)
        .collect::<EvalResult<_>>()
        .map_err(|source| GenerateError::Eval { at: at(), source })?;

    let mut targets = Vec::with_capacity(instances.len());
    for instance in instances {
        let weight = instance
            .result
            .as_rational()
            .ok_or_else(|| malformed(format!("weight {} is not a number", instance.result)))?;
        if weight < Rational64::zero() {
            return Err(malformed(format!("negative weight {}", instance.result)));
        }
        if weight.is_zero() {
            continue;
        }
        for (var, value) in dist.vars.iter().zip(instance.values) {
            sigma.bind(var.idx, value);
        }
        let target = eval_state(rewriter, sigma, next_state)
            .map_err(|source| GenerateError::Eval { at: at(), source })?;
        targets.push((target, weight));
    }
    if targets.is_empty() {
        return Err(malformed(format!("`{}` has no instance with positive weight", dist.weight)));
    }
    Ok(targets)
}

/// Lazy transition sequence returned by [`NextStateGenerator::enumerate`].
/// Summands are expanded one at a time as the sequence is consumed. After an
/// error the sequence ends.
pub struct Transitions<'g, R: Enumerator> {
    generator: &'g mut NextStateGenerator<R>,
    state: State,
    candidates: Arc<[usize]>,
    next_candidate: usize,
    pending: VecDeque<Transition>,
    failed: bool,
}

impl<R: Enumerator> Iterator for Transitions<'_, R> {
    type Item = GenerateResult<Transition>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(t) = self.pending.pop_front() {
                return Some(Ok(t));
            }
            if self.failed || self.next_candidate >= self.candidates.len() {
                return None;
            }
            let index = self.candidates[self.next_candidate];
            self.next_candidate += 1;
            if let Err(e) = self
                .generator
                .expand_summand(&self.state, index, &mut self.pending)
            {
                self.failed = true;
                self.pending.clear();
                return Some(Err(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;
    use lpsgen_eval::{BinOp, Sort, Value};

    fn int_state(values: &[i64]) -> State {
        State::new(values.iter().map(|&v| Value::int(v)).collect())
    }

    /// Counter 0..3 with `inc` while x < 3, `reset` at 3, and `pick(d)` for
    /// every d in 0..2 with d <= x.
    fn counter_model() -> Arc<Model> {
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, 3));
        let d = b.var("d", Sort::range(0, 2));
        b.summand(
            Summand::new(
                Expr::lt(x.expr(), Expr::int(3)),
                vec![Expr::add(x.expr(), Expr::int(1))],
            )
            .action("inc", vec![]),
        );
        b.summand(
            Summand::new(Expr::eq(x.expr(), Expr::int(3)), vec![Expr::int(0)]).action("reset", vec![]),
        );
        b.summand(
            Summand::new(
                Expr::binary(BinOp::Le, d.expr(), x.expr()),
                vec![d.expr()],
            )
            .sum(d.clone())
            .action("pick", vec![d.expr()]),
        );
        b.initial(vec![Expr::int(0)]);
        Arc::new(b.build().unwrap())
    }

    fn labels(ts: &[Transition]) -> Vec<String> {
        ts.iter().map(|t| t.action.to_string()).collect()
    }

    #[test]
    fn test_order_is_summand_then_enumeration() {
        let mut g = NextStateGenerator::with_options(counter_model(), GeneratorOptions::default());
        let ts = g.transitions(&int_state(&[1]), SubsetId::ALL).unwrap();
        assert_eq!(labels(&ts), vec!["inc", "pick(0)", "pick(1)"]);
        assert_eq!(ts[0].target, int_state(&[2]));
        assert_eq!(ts[2].target, int_state(&[1]));
        assert_eq!(ts[2].summand, 2);

        let ts = g.transitions(&int_state(&[3]), SubsetId::ALL).unwrap();
        assert_eq!(labels(&ts), vec!["reset", "pick(0)", "pick(1)", "pick(2)"]);
    }

    #[test]
    fn test_caching_and_pruning_are_transparent() {
        let model = counter_model();
        let mut plain = NextStateGenerator::with_options(
            Arc::clone(&model),
            GeneratorOptions {
                caching: false,
                pruning: false,
            },
        );
        let mut fast = NextStateGenerator::with_options(model, GeneratorOptions::default());
        for round in 0..2 {
            for x in 0..=3 {
                let s = int_state(&[x]);
                assert_eq!(
                    plain.transitions(&s, SubsetId::ALL).unwrap(),
                    fast.transitions(&s, SubsetId::ALL).unwrap(),
                    "state {} round {}",
                    s,
                    round
                );
            }
        }
        let stats = fast.stats();
        assert!(stats.cache_hits > 0);
        assert!(stats.pruning_nodes > 1);
        assert_eq!(plain.stats().cache_entries, 0);
    }

    #[test]
    fn test_subset_restricts_summands() {
        let mut g = NextStateGenerator::with_options(counter_model(), GeneratorOptions::default());
        let picks = g.add_subset("picks", vec![2]);
        let ts = g.transitions(&int_state(&[0]), picks).unwrap();
        assert_eq!(labels(&ts), vec!["pick(0)"]);
        assert_eq!(g.subset_name(picks), "picks");
        assert_eq!(g.subset_summands(SubsetId::ALL), &[0, 1, 2]);
    }

    #[test]
    fn test_enumerate_summand() {
        let mut g = NextStateGenerator::with_options(counter_model(), GeneratorOptions::default());
        let ts = g.enumerate_summand(&int_state(&[2]), 2).unwrap();
        assert_eq!(labels(&ts), vec!["pick(0)", "pick(1)", "pick(2)"]);
        assert!(g.enumerate_summand(&int_state(&[2]), 1).unwrap().is_empty());
    }

    #[test]
    fn test_non_boolean_guard_is_rewrite_failure() {
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, 1));
        b.summand(Summand::new(Expr::add(x.expr(), Expr::int(1)), vec![x.expr()]));
        b.initial(vec![Expr::int(0)]);
        let mut g = NextStateGenerator::with_options(Arc::new(b.build().unwrap()), GeneratorOptions::default());
        let err = g.transitions(&int_state(&[0]), SubsetId::ALL).unwrap_err();
        assert!(matches!(
            err,
            GenerateError::Rewrite { ref result, .. } if result == "1"
        ));
        assert!(matches!(err.location(), Location::Summand { index: 0, .. }));
    }

    #[test]
    fn test_evaluation_error_in_target() {
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, 1));
        b.summand(Summand::new(
            Expr::bool(true),
            vec![Expr::binary(BinOp::Mod, x.expr(), Expr::int(0))],
        ));
        b.initial(vec![Expr::int(0)]);
        let mut g = NextStateGenerator::with_options(Arc::new(b.build().unwrap()), GeneratorOptions::default());
        let mut it = g.enumerate(&int_state(&[0]), SubsetId::ALL);
        assert!(matches!(
            it.next(),
            Some(Err(GenerateError::Eval {
                source: EvalError::DivisionByZero,
                ..
            }))
        ));
        assert!(it.next().is_none());
    }

    fn coin_model(heads_weight: Expr) -> Arc<Model> {
        // flip: x := c with probability `heads_weight` for c == 1, the rest for c == 0.
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, 2));
        let c = b.var("c", Sort::range(0, 1));
        let weight = Expr::ite(
            Expr::eq(c.expr(), Expr::int(1)),
            heads_weight.clone(),
            Expr::sub(Expr::int(1), heads_weight),
        );
        b.summand(
            Summand::new(Expr::eq(x.expr(), Expr::int(0)), vec![Expr::add(c.expr(), Expr::int(1))])
                .action("flip", vec![])
                .distribution(vec![c], weight),
        );
        b.initial(vec![Expr::int(0)]);
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn test_probabilistic_transition() {
        let mut g = NextStateGenerator::with_options(
            coin_model(Expr::binary(BinOp::Div, Expr::int(1), Expr::int(2))),
            GeneratorOptions::default(),
        );
        let ts = g.transitions(&int_state(&[0]), SubsetId::ALL).unwrap();
        assert_eq!(ts.len(), 1);
        let t = &ts[0];
        assert!(t.is_probabilistic());
        assert_eq!(t.target, int_state(&[1]));
        assert_eq!(t.alternatives, vec![(int_state(&[2]), Rational64::new(1, 2))]);
        let total: Rational64 = t.targets().map(|(_, p)| p).sum();
        assert_eq!(total, Rational64::one());
    }

    #[test]
    fn test_zero_weight_instances_dropped() {
        let mut g = NextStateGenerator::with_options(coin_model(Expr::int(1)), GeneratorOptions::default());
        let ts = g.transitions(&int_state(&[0]), SubsetId::ALL).unwrap();
        assert_eq!(ts[0].target, int_state(&[2]));
        assert_eq!(ts[0].probability, Rational64::one());
        assert!(ts[0].alternatives.is_empty());
    }

    #[test]
    fn test_malformed_distribution() {
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, 1));
        let c = b.var("c", Sort::range(0, 1));
        b.summand(
            Summand::new(Expr::bool(true), vec![c.expr()]).distribution(vec![c.clone()], Expr::int(0)),
        );
        b.summand(
            Summand::new(Expr::bool(true), vec![x.expr()]).distribution(vec![c], Expr::int(-1)),
        );
        b.initial(vec![Expr::int(0)]);
        let mut g = NextStateGenerator::with_options(Arc::new(b.build().unwrap()), GeneratorOptions::default());
        for summand in 0..2 {
            assert!(matches!(
                g.enumerate_summand(&int_state(&[0]), summand),
                Err(GenerateError::MalformedDistribution { .. })
            ));
        }
    }

    #[test]
    fn test_initial_distribution() {
        let mut b = ModelBuilder::new();
        let _x = b.param("x", Sort::range(0, 3));
        let i = b.var("i", Sort::range(0, 3));
        b.initial_distribution(
            vec![i.expr()],
            Distribution::new(
                vec![i.clone()],
                Expr::ite(
                    Expr::lt(i.expr(), Expr::int(2)),
                    Expr::binary(BinOp::Div, Expr::int(1), Expr::int(2)),
                    Expr::int(0),
                ),
            ),
        );
        let mut g = NextStateGenerator::with_options(Arc::new(b.build().unwrap()), GeneratorOptions::default());
        let init = g.initial_states().unwrap();
        assert_eq!(
            init,
            vec![
                (int_state(&[0]), Rational64::new(1, 2)),
                (int_state(&[1]), Rational64::new(1, 2)),
            ]
        );
    }
}
