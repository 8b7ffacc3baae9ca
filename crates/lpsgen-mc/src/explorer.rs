//! State space exploration.
//!
//! The [`Explorer`] drives a [`NextStateGenerator`] over the reachable states
//! of a model with one of the traversal strategies of [`Strategy`], interning
//! states in a [`StateStore`] and reporting states and edges to an
//! [`OutputSink`]. Deadlocks, divergences, nondeterministic states and watched
//! actions are detected on the way; with tracing on, each detection is backed
//! by a witness trace rebuilt from backpointers.

use crate::action::{MultiAction, TAU};
use crate::config::{ExploreConfig, Strategy};
use crate::confluence::ConfluenceReducer;
use crate::divergence::DivergenceDetector;
use crate::frontier::LevelQueue;
use crate::generator::{
    GenerateError, GenerateResult, GeneratorOptions, NextStateGenerator, SubsetId, Transition,
};
use crate::model::{Model, Summand};
use crate::sink::OutputSink;
use crate::state::State;
use crate::store::{BoundedStore, ExactStore, StateStore};
use crate::trace::{Trace, TraceSink};
use ahash::{HashMap, HashMapExt};
use lpsgen_eval::{Enumerator, Rewriter, Value};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

/// Fatal exploration error.
#[derive(Debug, Error)]
pub enum ExploreError {
    #[error("exploration failed: {0}")]
    Generate(#[from] GenerateError),
}

pub type ExploreResult<T> = Result<T, ExploreError>;

/// Why an exploration stopped. Every status is a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExploreStatus {
    /// Every reachable state was expanded (or the walk ended in a deadlock).
    Completed,
    StateLimitReached,
    TraceLimitReached,
    /// The stop flag was raised.
    Aborted,
}

impl fmt::Display for ExploreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExploreStatus::Completed => "completed",
            ExploreStatus::StateLimitReached => "state limit reached",
            ExploreStatus::TraceLimitReached => "trace limit reached",
            ExploreStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExploreReport {
    /// Distinct states discovered. With the bounded store this counts slots
    /// ever used, so it never exceeds the capacity.
    pub states: usize,
    pub transitions: usize,
    /// Breadth-first levels reached; 0 for the other strategies.
    pub levels: usize,
    pub deadlocks: usize,
    pub divergences: usize,
    pub detected_actions: usize,
    pub nondeterministic_states: usize,
    pub traces_saved: usize,
    pub status: ExploreStatus,
}

/// A pending state with its store index. The state travels with the index
/// because a lossy store may hand back a different one.
type Entry = (State, usize);

#[derive(Debug, Error)]
enum TraceError {
    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("state {0} is no longer stored")]
    Forgotten(usize),

    #[error("summand {summand} has no transition from state {from} to state {to}")]
    Unmatched { from: usize, to: usize, summand: usize },
}

#[derive(Debug, Default)]
struct Counters {
    /// One past the highest store index handed out.
    index_bound: usize,
    expanded: usize,
    transitions: usize,
    levels: usize,
    deadlocks: usize,
    divergences: usize,
    detected_actions: usize,
    nondeterministic_states: usize,
    traces_saved: usize,
}

pub struct Explorer<'a, R: Enumerator = Rewriter> {
    config: ExploreConfig,
    generator: NextStateGenerator<R>,
    main: SubsetId,
    confluence: Option<ConfluenceReducer>,
    divergence: Option<DivergenceDetector>,
    store: Box<dyn StateStore>,
    sink: &'a mut dyn OutputSink,
    traces: Option<&'a mut dyn TraceSink>,
    /// Store index -> (predecessor index, originating summand).
    backpointers: HashMap<usize, (usize, usize)>,
    rng: StdRng,
    stop_flag: Option<Arc<AtomicBool>>,
    counters: Counters,
}

impl<'a> Explorer<'a, Rewriter> {
    pub fn new(model: Arc<Model>, config: ExploreConfig, sink: &'a mut dyn OutputSink) -> Self {
        Self::with_rewriter(model, Rewriter::new(), config, sink)
    }
}

impl<'a, R: Enumerator> Explorer<'a, R> {
    pub fn with_rewriter(
        model: Arc<Model>,
        rewriter: R,
        config: ExploreConfig,
        sink: &'a mut dyn OutputSink,
    ) -> Self {
        let options = GeneratorOptions {
            caching: config.caching,
            pruning: config.pruning,
        };
        let mut generator = NextStateGenerator::new(Arc::clone(&model), rewriter, options);

        let (main, confluence) = match config.confluence.as_deref() {
            Some(label) => {
                let prioritized = |s: &Summand| {
                    if label == TAU {
                        s.is_tau()
                    } else {
                        s.actions.len() == 1 && s.has_label(label)
                    }
                };
                let subset = generator.add_subset("prioritized", model.summands_where(prioritized));
                let main =
                    generator.add_subset("non-prioritized", model.summands_where(|s| !prioritized(s)));
                info!(
                    action = label,
                    prioritized = generator.subset_summands(subset).len(),
                    "confluence reduction enabled"
                );
                (main, Some(ConfluenceReducer::new(subset)))
            }
            None => (SubsetId::ALL, None),
        };

        let divergence = config.detect_divergence.then(|| {
            let internal = model.summands_where(|s| s.is_hidden(&config.hidden));
            DivergenceDetector::new(generator.add_subset("tau-only", internal))
        });

        let store: Box<dyn StateStore> = match config.bithash {
            Some(capacity) => {
                info!(capacity, "using bounded state store");
                Box::new(BoundedStore::new(capacity))
            }
            None => Box::new(ExactStore::new()),
        };

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            generator,
            main,
            confluence,
            divergence,
            store,
            sink,
            traces: None,
            backpointers: HashMap::new(),
            rng,
            stop_flag: None,
            counters: Counters::default(),
        }
    }

    /// Receive witness traces. Without a trace sink, traces are built but dropped.
    pub fn set_trace_sink(&mut self, traces: &'a mut dyn TraceSink) {
        self.traces = Some(traces);
    }

    /// Set an external stop flag, checked before every expansion.
    pub fn set_stop_flag(&mut self, flag: Arc<AtomicBool>) {
        self.stop_flag = Some(flag);
    }

    pub fn generator(&self) -> &NextStateGenerator<R> {
        &self.generator
    }

    pub fn config(&self) -> &ExploreConfig {
        &self.config
    }

    /// Explore the state space.
    pub fn run(&mut self) -> ExploreResult<ExploreReport> {
        info!(
            strategy = %self.config.strategy,
            max_states = self.config.max_states,
            "starting exploration"
        );

        let initial = self.add_initial_states()?;
        let status = match self.config.strategy {
            Strategy::Breadth | Strategy::ValuePrioritized => self.breadth_first(initial)?,
            Strategy::Depth => self.depth_first(initial)?,
            Strategy::Random | Strategy::ValueRandomPrioritized => self.random_walk(initial)?,
        };

        warn_on_sink_error(
            self.sink
                .finish(self.counters.index_bound, self.counters.transitions),
        );

        let stats = self.generator.stats();
        debug!(
            cache_entries = stats.cache_entries,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            pruning_nodes = stats.pruning_nodes,
            "generator statistics"
        );

        let report = self.report(status);
        info!(
            states = report.states,
            transitions = report.transitions,
            levels = report.levels,
            status = %report.status,
            "exploration finished"
        );
        Ok(report)
    }

    fn report(&self, status: ExploreStatus) -> ExploreReport {
        let c = &self.counters;
        ExploreReport {
            states: self.store.discovered(),
            transitions: c.transitions,
            levels: c.levels,
            deadlocks: c.deadlocks,
            divergences: c.divergences,
            detected_actions: c.detected_actions,
            nondeterministic_states: c.nondeterministic_states,
            traces_saved: c.traces_saved,
            status,
        }
    }

    /// Intern the initial states and report them. Returns the new ones in order.
    fn add_initial_states(&mut self) -> ExploreResult<Vec<Entry>> {
        let result = self.generator.initial_states();
        let initial = self.check(result, None)?;

        let mut targets = Vec::with_capacity(initial.len());
        let mut entries = Vec::with_capacity(initial.len());
        for (state, probability) in initial {
            let state = self.representative(&state, None)?;
            let (index, is_new) = self.intern(&state);
            targets.push((index, probability));
            if is_new {
                entries.push((state, index));
            }
        }
        warn_on_sink_error(self.sink.set_initial(&targets));
        info!(count = entries.len(), "generated initial states");
        Ok(entries)
    }

    // --- strategies ---

    fn breadth_first(&mut self, initial: Vec<Entry>) -> ExploreResult<ExploreStatus> {
        let bound = self
            .config
            .todo_max
            .map(|max| max.min(self.config.max_states));
        let mut queue = LevelQueue::new(bound);
        for entry in initial {
            self.enqueue(&mut queue, entry);
        }
        if !queue.advance() {
            return Ok(ExploreStatus::Completed);
        }
        self.counters.levels = 1;

        loop {
            if queue.remaining() == 0 {
                debug!(
                    level = self.counters.levels - 1,
                    states = self.store.discovered(),
                    transitions = self.counters.transitions,
                    "explored level"
                );
                if !queue.advance() {
                    return Ok(ExploreStatus::Completed);
                }
                self.counters.levels += 1;
            }
            if let Some(status) = self.limit_reached() {
                return Ok(status);
            }
            let Some((state, index)) = queue.pop() else {
                return Ok(ExploreStatus::Completed);
            };

            let transitions = self.expand(&state, index)?;
            self.counters.expanded += 1;
            let mut discovered = Vec::new();
            for transition in &transitions {
                self.add_transition(index, transition, &mut discovered);
            }
            for entry in discovered {
                self.enqueue(&mut queue, entry);
            }
        }
    }

    fn enqueue(&mut self, queue: &mut LevelQueue<Entry>, entry: Entry) {
        if let Some((_, dropped)) = queue.push(entry, &mut self.rng) {
            trace!(index = dropped, "queue full, state dropped");
            self.store.forget(dropped);
        }
    }

    fn depth_first(&mut self, initial: Vec<Entry>) -> ExploreResult<ExploreStatus> {
        let mut stack = initial;
        stack.reverse();

        while !stack.is_empty() {
            if let Some(status) = self.limit_reached() {
                return Ok(status);
            }
            let Some((state, index)) = stack.pop() else {
                break;
            };

            let transitions = self.expand(&state, index)?;
            self.counters.expanded += 1;
            let mut discovered = Vec::new();
            for transition in &transitions {
                self.add_transition(index, transition, &mut discovered);
            }
            for (state, index) in discovered {
                let room = self.counters.expanded + stack.len() < self.config.max_states
                    && self.config.todo_max.map_or(true, |max| stack.len() < max);
                if room {
                    stack.push((state, index));
                } else {
                    trace!(index, "stack full, state not expanded");
                    self.store.forget(index);
                }
            }
        }
        Ok(ExploreStatus::Completed)
    }

    /// Random walk; value-random prioritization restricts the choice to the
    /// minimal-value transitions before drawing.
    fn random_walk(&mut self, initial: Vec<Entry>) -> ExploreResult<ExploreStatus> {
        if initial.len() > 1 {
            warn!(
                count = initial.len(),
                "several initial states, the walk starts from the first"
            );
        }
        let Some((mut state, mut index)) = initial.into_iter().next() else {
            return Ok(ExploreStatus::Completed);
        };

        loop {
            if let Some(status) = self.limit_reached() {
                return Ok(status);
            }
            let transitions = self.expand(&state, index)?;
            self.counters.expanded += 1;

            let mut discovered = Vec::new();
            let mut moves: Vec<Entry> = Vec::with_capacity(transitions.len());
            for transition in &transitions {
                let target = self.add_transition(index, transition, &mut discovered);
                moves.push((transition.target.clone(), target));
            }
            let Some(next) = moves.choose(&mut self.rng) else {
                debug!(steps = self.counters.expanded, "walk ended in a deadlock");
                return Ok(ExploreStatus::Completed);
            };
            (state, index) = next.clone();
        }
    }

    fn limit_reached(&self) -> Option<ExploreStatus> {
        if self
            .stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            info!("exploration aborted");
            return Some(ExploreStatus::Aborted);
        }
        if self.config.trace && self.counters.traces_saved >= self.config.max_traces {
            info!(traces = self.counters.traces_saved, "reached trace limit");
            return Some(ExploreStatus::TraceLimitReached);
        }
        if self.counters.expanded >= self.config.max_states {
            info!(states = self.store.discovered(), "reached state limit");
            return Some(ExploreStatus::StateLimitReached);
        }
        None
    }

    // --- expansion ---

    /// Outgoing transitions of the state at `index`, after detection and
    /// reduction.
    fn expand(&mut self, state: &State, index: usize) -> ExploreResult<Vec<Transition>> {
        trace!(index, state = %state, "expanding");

        if let Some(detector) = self.divergence.as_mut() {
            if !detector.is_known_non_divergent(state) {
                let result = detector.is_divergent(&mut self.generator, state);
                if self.check(result, Some(index))? {
                    self.counters.divergences += 1;
                    info!(state = index, "divergence detected");
                    self.save_trace("divergence", "", index, None);
                }
            }
        }

        let result = self.generator.transitions(state, self.main);
        let mut transitions = self.check(result, Some(index))?;

        if self.config.strategy.is_value_prioritized() {
            transitions = value_prioritize(transitions);
        }

        if transitions.is_empty() && self.config.detect_deadlock {
            self.counters.deadlocks += 1;
            info!(state = index, "deadlock detected");
            self.save_trace("dlk", "", index, None);
        }

        if self.config.detect_nondeterminism {
            if let Some(t) = nondeterministic(&transitions) {
                let step = (t.action.to_string(), t.target.clone());
                self.counters.nondeterministic_states += 1;
                info!(state = index, action = %t.action, "nondeterministic state detected");
                self.save_trace("nondeterministic", "", index, Some(step));
            }
        }

        if self.confluence.is_some() {
            for t in &mut transitions {
                t.target = self.representative(&t.target, Some(index))?;
                for (alternative, _) in &mut t.alternatives {
                    *alternative = self.representative(alternative, Some(index))?;
                }
            }
        }
        Ok(transitions)
    }

    fn representative(&mut self, state: &State, source: Option<usize>) -> ExploreResult<State> {
        match self.confluence {
            Some(reducer) => {
                let result = reducer.representative(&mut self.generator, state);
                self.check(result, source)
            }
            None => Ok(state.clone()),
        }
    }

    /// Pass a generation result through, handling a failure: it is logged and
    /// the error trace to `source` is saved if configured.
    fn check<T>(&mut self, result: GenerateResult<T>, source: Option<usize>) -> ExploreResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(error = %e, "next-state generation failed");
                if let (true, Some(index)) = (self.config.save_error_trace, source) {
                    let name = format!("{}_error.trc", self.config.trace_prefix);
                    self.persist_trace(&name, index, None);
                }
                Err(e.into())
            }
        }
    }

    fn intern(&mut self, state: &State) -> (usize, bool) {
        let (index, is_new) = self.store.intern(state);
        if is_new {
            self.counters.index_bound = self.counters.index_bound.max(index + 1);
            trace!(index, state = %state, "new state");
            warn_on_sink_error(self.sink.add_state(index, state));
        }
        (index, is_new)
    }

    /// Intern the targets of `transition`, emit the edge and run the watched
    /// action check. New targets are appended to `discovered`. Returns the
    /// index of the primary target.
    fn add_transition(&mut self, source: usize, transition: &Transition, discovered: &mut Vec<Entry>) -> usize {
        let mut targets = Vec::with_capacity(1 + transition.alternatives.len());
        for (state, probability) in transition.targets() {
            let (index, is_new) = self.intern(state);
            if is_new {
                if self.config.needs_backpointers() {
                    self.backpointers.insert(index, (source, transition.summand));
                }
                discovered.push((state.clone(), index));
            }
            targets.push((index, probability));
        }
        warn_on_sink_error(self.sink.add_transition(source, &transition.action, &targets));
        self.counters.transitions += 1;
        self.detect_watched(source, transition);
        targets[0].0
    }

    fn detect_watched(&mut self, source: usize, transition: &Transition) {
        if self.config.watched_actions.is_empty() && self.config.watched_multiactions.is_empty() {
            return;
        }
        let printed = transition.action.to_string();
        let multiaction = self.config.watched_multiactions.iter().any(|m| *m == printed);
        let mut suffix = String::new();
        if multiaction {
            suffix.push_str("_multiaction");
        }
        for action in transition.action.actions() {
            if self.config.watched_actions.iter().any(|w| **w == *action.label) {
                suffix.push('_');
                suffix.push_str(&action.label);
            }
        }
        if suffix.is_empty() {
            return;
        }

        self.counters.detected_actions += 1;
        info!(state = source, action = %printed, "detected action");
        self.save_trace("act", &suffix, source, Some((printed, transition.target.clone())));
    }

    // --- traces ---

    /// Save a detection trace named `<prefix>_<kind>_<n><suffix>.trc`, where
    /// `n` counts the traces saved so far, if tracing is on and the trace
    /// limit is not reached.
    fn save_trace(&mut self, kind: &str, suffix: &str, index: usize, step: Option<(String, State)>) {
        if !self.config.trace || self.counters.traces_saved >= self.config.max_traces {
            return;
        }
        let name = format!(
            "{}_{}_{}{}.trc",
            self.config.trace_prefix, kind, self.counters.traces_saved, suffix
        );
        if self.persist_trace(&name, index, step) {
            self.counters.traces_saved += 1;
        }
    }

    /// Rebuild the trace to `index`, extend it with `step` and hand it to the
    /// trace sink. Returns false if the trace could not be rebuilt; a sink
    /// failure only warns.
    fn persist_trace(&mut self, name: &str, index: usize, step: Option<(String, State)>) -> bool {
        let mut trace = match self.reconstruct(index) {
            Ok(trace) => trace,
            Err(e) => {
                warn!(trace = name, error = %e, "could not reconstruct trace");
                return false;
            }
        };
        if let Some((action, state)) = step {
            trace.push(action, state);
        }
        match self.traces.as_mut() {
            Some(sink) => match sink.save(name, &trace) {
                Ok(()) => info!(trace = name, steps = trace.len(), "saved trace"),
                Err(e) => warn!(trace = name, error = %e, "could not save trace"),
            },
            None => debug!(trace = name, "no trace sink, trace dropped"),
        }
        true
    }

    /// Walk the backpointers from `index` to a state without one (an initial
    /// state) and re-derive the label of every step.
    fn reconstruct(&mut self, index: usize) -> Result<Trace, TraceError> {
        let mut path = vec![index];
        let mut summands = Vec::new();
        let mut current = index;
        while let Some(&(predecessor, summand)) = self.backpointers.get(&current) {
            // A lossy store can reuse indices and close a cycle.
            if path.len() > self.backpointers.len() {
                break;
            }
            path.push(predecessor);
            summands.push(summand);
            current = predecessor;
        }
        path.reverse();
        summands.reverse();

        let mut previous = self.stored(path[0])?;
        let mut trace = Trace::new(previous.clone());
        for (pair, &summand) in path.windows(2).zip(&summands) {
            let (from, to) = (pair[0], pair[1]);
            let next = self.stored(to)?;
            let label = self
                .edge_label(&previous, summand, &next)?
                .ok_or(TraceError::Unmatched { from, to, summand })?;
            trace.push(label, next.clone());
            previous = next;
        }
        Ok(trace)
    }

    fn stored(&self, index: usize) -> Result<State, TraceError> {
        self.store.get(index).ok_or(TraceError::Forgotten(index))
    }

    /// Label of the first transition of `summand` from `from` that reaches `to`.
    fn edge_label(&mut self, from: &State, summand: usize, to: &State) -> GenerateResult<Option<String>> {
        for transition in self.generator.enumerate_summand(from, summand)? {
            for (target, _) in transition.targets() {
                let target = match self.confluence {
                    Some(reducer) => reducer.representative(&mut self.generator, target)?,
                    None => target.clone(),
                };
                if target == *to {
                    return Ok(Some(transition.action.to_string()));
                }
            }
        }
        Ok(None)
    }
}

fn warn_on_sink_error(result: io::Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "output sink failed");
    }
}

/// Keep the transitions without a numeric argument and, among the others,
/// those whose argument is minimal.
fn value_prioritize(transitions: Vec<Transition>) -> Vec<Transition> {
    let key = |t: &Transition| t.action.numeric_argument().and_then(Value::as_rational);
    let Some(min) = transitions.iter().filter_map(key).min() else {
        return transitions;
    };
    transitions
        .into_iter()
        .filter(|t| key(t).map_or(true, |v| v == min))
        .collect()
}

/// First transition that shares its action with an earlier one but not its target.
fn nondeterministic(transitions: &[Transition]) -> Option<&Transition> {
    let mut seen: HashMap<&MultiAction, &State> = HashMap::new();
    for t in transitions {
        match seen.get(&t.action) {
            Some(&target) if *target != t.target => return Some(t),
            Some(_) => {}
            None => {
                seen.insert(&t.action, &t.target);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::model::ModelBuilder;
    use crate::sink::{LtsCollector, NullSink};
    use crate::trace::TraceCollector;
    use lpsgen_eval::{BinOp, Expr, Sort};
    use num_rational::Rational64;
    use num_traits::One;

    fn int_state(n: i64) -> State {
        State::new(vec![Value::int(n)])
    }

    fn transition(label: &str, arg: Option<Value>, target: i64) -> Transition {
        Transition {
            action: MultiAction::single(Action::new(label, arg.into_iter().collect())),
            target: int_state(target),
            probability: Rational64::one(),
            alternatives: Vec::new(),
            summand: 0,
        }
    }

    /// x in 0..n; one summand per edge `(from, label, to)`, `tau` for an empty label.
    fn graph(n: i64, edges: &[(i64, &str, i64)]) -> Arc<Model> {
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, n));
        for &(from, label, to) in edges {
            let s = Summand::new(Expr::eq(x.expr(), Expr::int(from)), vec![Expr::int(to)]);
            b.summand(if label.is_empty() { s } else { s.action(label, vec![]) });
        }
        b.initial(vec![Expr::int(0)]);
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn test_value_prioritize_keeps_minimal_and_non_numeric() {
        let ts = vec![
            transition("w", Some(Value::int(3)), 1),
            transition("w", Some(Value::int(1)), 2),
            transition("go", None, 3),
            transition("w", Some(Value::real(1, 1)), 4),
            transition("w", Some(Value::int(2)), 5),
        ];
        let kept: Vec<State> = value_prioritize(ts).into_iter().map(|t| t.target).collect();
        assert_eq!(kept, vec![int_state(2), int_state(3), int_state(4)]);
    }

    #[test]
    fn test_nondeterministic_pair() {
        let ts = vec![
            transition("a", None, 1),
            transition("b", None, 2),
            transition("a", None, 1),
        ];
        assert!(nondeterministic(&ts).is_none());
        let ts = vec![transition("a", None, 1), transition("a", None, 2)];
        assert_eq!(nondeterministic(&ts).map(|t| t.target.clone()), Some(int_state(2)));
    }

    #[test]
    fn test_zero_max_states_adds_initial_only() {
        let model = graph(1, &[(0, "a", 1)]);
        let mut lts = LtsCollector::new();
        let config = ExploreConfig {
            max_states: 0,
            ..ExploreConfig::default()
        };
        let report = Explorer::new(model, config, &mut lts).run().unwrap();
        assert_eq!(report.status, ExploreStatus::StateLimitReached);
        assert_eq!(report.states, 1);
        assert_eq!(report.transitions, 0);
        assert_eq!(lts.initial, vec![(0, Rational64::one())]);
    }

    #[test]
    fn test_stop_flag_aborts() {
        let model = graph(1, &[(0, "a", 1)]);
        let mut sink = NullSink;
        let mut explorer = Explorer::new(model, ExploreConfig::default(), &mut sink);
        explorer.set_stop_flag(Arc::new(AtomicBool::new(true)));
        let report = explorer.run().unwrap();
        assert_eq!(report.status, ExploreStatus::Aborted);
        assert_eq!(report.transitions, 0);
    }

    #[test]
    fn test_watched_action_trace() {
        let model = graph(2, &[(0, "a", 1), (1, "send", 2)]);
        let mut lts = LtsCollector::new();
        let mut traces = TraceCollector::default();
        let config = ExploreConfig {
            watched_actions: vec!["send".to_string()],
            trace: true,
            trace_prefix: "m".to_string(),
            ..ExploreConfig::default()
        };
        let report = {
            let mut explorer = Explorer::new(model, config, &mut lts);
            explorer.set_trace_sink(&mut traces);
            explorer.run().unwrap()
        };
        assert_eq!(report.detected_actions, 1);
        assert_eq!(report.traces_saved, 1);
        let (name, trace) = &traces.traces[0];
        assert_eq!(name, "m_act_0_send.trc");
        assert_eq!(trace.initial, int_state(0));
        let steps: Vec<(&str, State)> = trace
            .steps
            .iter()
            .map(|s| (s.action.as_str(), s.state.clone()))
            .collect();
        assert_eq!(steps, vec![("a", int_state(1)), ("send", int_state(2))]);
    }

    #[test]
    fn test_watched_multiaction_without_trace() {
        let model = graph(2, &[(0, "a", 1), (1, "b", 2)]);
        let mut sink = NullSink;
        let config = ExploreConfig {
            watched_multiactions: vec!["b".to_string()],
            ..ExploreConfig::default()
        };
        let report = Explorer::new(model, config, &mut sink).run().unwrap();
        assert_eq!(report.detected_actions, 1);
        assert_eq!(report.traces_saved, 0);
    }

    #[test]
    fn test_trace_limit_stops_exploration() {
        // Deadlocks at 1, 2 and 3; only one trace may be saved.
        let model = graph(3, &[(0, "a", 1), (0, "b", 2), (0, "c", 3)]);
        let mut sink = NullSink;
        let mut traces = TraceCollector::default();
        let config = ExploreConfig {
            detect_deadlock: true,
            trace: true,
            max_traces: 1,
            ..ExploreConfig::default()
        };
        let report = {
            let mut explorer = Explorer::new(model, config, &mut sink);
            explorer.set_trace_sink(&mut traces);
            explorer.run().unwrap()
        };
        assert_eq!(report.status, ExploreStatus::TraceLimitReached);
        assert_eq!(report.deadlocks, 1);
        assert_eq!(traces.traces.len(), 1);
        assert_eq!(traces.traces[0].0, "lpsgen_dlk_0.trc");
    }

    #[test]
    fn test_nondeterminism_detected() {
        let model = graph(2, &[(0, "a", 1), (0, "a", 2)]);
        let mut sink = NullSink;
        let mut traces = TraceCollector::default();
        let config = ExploreConfig {
            detect_nondeterminism: true,
            trace: true,
            ..ExploreConfig::default()
        };
        let report = {
            let mut explorer = Explorer::new(model, config, &mut sink);
            explorer.set_trace_sink(&mut traces);
            explorer.run().unwrap()
        };
        assert_eq!(report.nondeterministic_states, 1);
        let (name, trace) = &traces.traces[0];
        assert_eq!(name, "lpsgen_nondeterministic_0.trc");
        assert_eq!(trace.last_state(), &int_state(2));
    }

    #[test]
    fn test_error_trace_on_failure() {
        // 0 -a-> 1, and in state 1 the target divides by zero.
        let mut b = ModelBuilder::new();
        let x = b.param("x", Sort::range(0, 1));
        b.summand(
            Summand::new(Expr::eq(x.expr(), Expr::int(0)), vec![Expr::int(1)]).action("a", vec![]),
        );
        b.summand(
            Summand::new(
                Expr::eq(x.expr(), Expr::int(1)),
                vec![Expr::binary(BinOp::Mod, x.expr(), Expr::int(0))],
            )
            .action("b", vec![]),
        );
        b.initial(vec![Expr::int(0)]);
        let model = Arc::new(b.build().unwrap());

        let mut sink = NullSink;
        let mut traces = TraceCollector::default();
        let config = ExploreConfig {
            save_error_trace: true,
            trace_prefix: "bad".to_string(),
            ..ExploreConfig::default()
        };
        let err = {
            let mut explorer = Explorer::new(model, config, &mut sink);
            explorer.set_trace_sink(&mut traces);
            explorer.run().unwrap_err()
        };
        assert!(matches!(err, ExploreError::Generate(GenerateError::Eval { .. })));
        let (name, trace) = &traces.traces[0];
        assert_eq!(name, "bad_error.trc");
        assert_eq!(trace.last_state(), &int_state(1));
    }

    #[test]
    fn test_depth_first_respects_todo_max() {
        // 0 fans out to 1..=4, each of which is a deadlock.
        let model = graph(4, &[(0, "a", 1), (0, "b", 2), (0, "c", 3), (0, "d", 4)]);
        let mut sink = NullSink;
        let config = ExploreConfig {
            strategy: Strategy::Depth,
            todo_max: Some(2),
            detect_deadlock: true,
            ..ExploreConfig::default()
        };
        let report = Explorer::new(model, config, &mut sink).run().unwrap();
        assert_eq!(report.status, ExploreStatus::Completed);
        assert_eq!(report.states, 5);
        assert_eq!(report.deadlocks, 2);
    }
}
