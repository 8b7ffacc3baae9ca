//! Small random models and reference computations for property tests.

use lpsgen_eval::{BinOp, Expr, Sort, Variable};
use lpsgen_mc::{
    ExploreConfig, ExploreReport, Explorer, GeneratorOptions, LtsCollector, Model, ModelBuilder,
    NextStateGenerator, State, SubsetId, Summand,
};
use proptest::prelude::*;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// Guard of a generated summand over parameter `param`.
#[derive(Debug, Clone, Copy)]
pub enum Guard {
    True,
    Lt(i64),
    Eq(i64),
    Ne(i64),
    /// Summation over `d` with guard `param < d`; the target becomes `d`.
    Sum,
}

#[derive(Debug, Clone)]
pub struct SummandShape {
    pub guard_param: usize,
    pub guard: Guard,
    pub target: usize,
    pub step: i64,
    /// `None` is `tau`; even labels carry the new target value as argument.
    pub label: Option<u8>,
}

/// A model over `params` counters in `0..=bound`, all starting at 0.
#[derive(Debug, Clone)]
pub struct ModelShape {
    pub params: usize,
    pub bound: i64,
    pub summands: Vec<SummandShape>,
}

impl ModelShape {
    pub fn build(&self) -> Result<Arc<Model>, String> {
        let mut b = ModelBuilder::new();
        let params: Vec<Variable> = (0..self.params.max(1))
            .map(|i| b.param(&format!("p{i}"), Sort::range(0, self.bound)))
            .collect();
        let modulus = Expr::int(self.bound + 1);

        for shape in &self.summands {
            let g = &params[shape.guard_param % params.len()];
            let t = shape.target % params.len();
            let mut next: Vec<Expr> = params.iter().map(|p| p.expr()).collect();

            let (condition, bound_var) = match shape.guard {
                Guard::True => (Expr::bool(true), None),
                Guard::Lt(v) => (Expr::lt(g.expr(), Expr::int(v)), None),
                Guard::Eq(v) => (Expr::eq(g.expr(), Expr::int(v)), None),
                Guard::Ne(v) => (Expr::not(Expr::eq(g.expr(), Expr::int(v))), None),
                Guard::Sum => {
                    let d = b.var("d", Sort::range(0, self.bound));
                    (Expr::lt(g.expr(), d.expr()), Some(d))
                }
            };
            next[t] = match &bound_var {
                Some(d) => d.expr(),
                None => Expr::binary(
                    BinOp::Mod,
                    Expr::add(params[t].expr(), Expr::int(shape.step)),
                    modulus.clone(),
                ),
            };

            let mut summand = Summand::new(condition, next.clone());
            if let Some(d) = bound_var {
                summand = summand.sum(d);
            }
            if let Some(label) = shape.label {
                let args = if label % 2 == 0 {
                    vec![next[t].clone()]
                } else {
                    vec![]
                };
                summand = summand.action(&format!("a{label}"), args);
            }
            b.summand(summand);
        }

        b.initial(params.iter().map(|_| Expr::int(0)).collect());
        b.build().map(Arc::new).map_err(|e| e.to_string())
    }
}

fn guard_strategy(bound: i64) -> impl Strategy<Value = Guard> {
    prop_oneof![
        Just(Guard::True),
        (0..=bound).prop_map(Guard::Lt),
        (0..=bound).prop_map(Guard::Eq),
        (0..=bound).prop_map(Guard::Ne),
        Just(Guard::Sum),
    ]
}

fn summand_strategy(bound: i64) -> impl Strategy<Value = SummandShape> {
    (
        0usize..3,
        guard_strategy(bound),
        0usize..3,
        1..=bound.max(1),
        proptest::option::of(0u8..4),
    )
        .prop_map(|(guard_param, guard, target, step, label)| SummandShape {
            guard_param,
            guard,
            target,
            step,
            label,
        })
}

/// Models with one to three parameters and one to six summands.
pub fn model_shape() -> impl Strategy<Value = ModelShape> {
    (1usize..=3, 1i64..=4).prop_flat_map(|(params, bound)| {
        proptest::collection::vec(summand_strategy(bound), 1..=6).prop_map(move |summands| {
            ModelShape {
                params,
                bound,
                summands,
            }
        })
    })
}

/// Explore `model` into an in-memory LTS.
pub fn explore(model: Arc<Model>, config: ExploreConfig) -> Result<(ExploreReport, LtsCollector), String> {
    let mut lts = LtsCollector::new();
    let report = Explorer::new(model, config, &mut lts)
        .run()
        .map_err(|e| e.to_string())?;
    Ok((report, lts))
}

/// Labelled edges of an LTS with indices resolved to states.
pub fn edge_set(lts: &LtsCollector) -> BTreeSet<(State, String, State)> {
    let mut by_index: Vec<Option<&State>> = Vec::new();
    for (index, state) in &lts.states {
        if by_index.len() <= *index {
            by_index.resize(index + 1, None);
        }
        by_index[*index] = Some(state);
    }
    let lookup = |i: usize| by_index.get(i).copied().flatten().cloned();
    lts.transitions
        .iter()
        .filter_map(|(source, label, targets)| {
            Some((lookup(*source)?, label.clone(), lookup(targets[0].0)?))
        })
        .collect()
}

pub fn state_set(lts: &LtsCollector) -> BTreeSet<State> {
    lts.states.iter().map(|(_, s)| s.clone()).collect()
}

/// Outgoing transitions of `state` as sorted `(label, target, summand)`
/// triples.
pub fn outgoing(
    generator: &mut NextStateGenerator,
    state: &State,
) -> Result<Vec<(String, State, usize)>, String> {
    let mut out: Vec<_> = generator
        .transitions(state, SubsetId::ALL)
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|t| (t.action.to_string(), t.target, t.summand))
        .collect();
    out.sort();
    Ok(out)
}

/// Reachable states by plain breadth-first search, with caching and pruning
/// off.
pub fn reference_reachable(model: &Arc<Model>) -> Result<BTreeSet<State>, String> {
    let options = GeneratorOptions {
        caching: false,
        pruning: false,
    };
    let mut generator = NextStateGenerator::with_options(Arc::clone(model), options);
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();
    for (state, _) in generator.initial_states().map_err(|e| e.to_string())? {
        if seen.insert(state.clone()) {
            queue.push_back(state);
        }
    }
    while let Some(state) = queue.pop_front() {
        for target in generator
            .successors(&state, SubsetId::ALL)
            .map_err(|e| e.to_string())?
        {
            if seen.insert(target.clone()) {
                queue.push_back(target);
            }
        }
    }
    Ok(seen)
}
