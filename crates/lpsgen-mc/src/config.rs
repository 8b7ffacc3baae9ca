//! Exploration configuration.

use std::fmt;
use std::str::FromStr;

/// Traversal strategy. Exactly one is used per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Breadth,
    Depth,
    Random,
    /// Breadth-first over the transitions whose numeric argument is minimal.
    ValuePrioritized,
    /// Random walk over the transitions whose numeric argument is minimal.
    ValueRandomPrioritized,
}

impl Strategy {
    pub fn is_value_prioritized(self) -> bool {
        matches!(self, Strategy::ValuePrioritized | Strategy::ValueRandomPrioritized)
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Breadth => "breadth",
            Strategy::Depth => "depth",
            Strategy::Random => "random",
            Strategy::ValuePrioritized => "value-prioritized",
            Strategy::ValueRandomPrioritized => "value-random",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "b" | "breadth" => Ok(Strategy::Breadth),
            "d" | "depth" => Ok(Strategy::Depth),
            "r" | "random" => Ok(Strategy::Random),
            "p" | "value-prioritized" => Ok(Strategy::ValuePrioritized),
            "q" | "value-random" => Ok(Strategy::ValueRandomPrioritized),
            other => Err(format!(
                "unknown strategy `{}` (expected breadth, depth, random, value-prioritized or value-random)",
                other
            )),
        }
    }
}

/// Configuration for an exploration run.
#[derive(Debug, Clone)]
pub struct ExploreConfig {
    pub strategy: Strategy,
    /// Maximum number of states to expand (steps, for walks). 0 adds only
    /// the initial states.
    pub max_states: usize,
    /// Maximum size of the breadth-first level queue or the depth-first stack.
    pub todo_max: Option<usize>,
    /// Use the lossy bounded store with this many slots.
    pub bithash: Option<usize>,
    pub caching: bool,
    pub pruning: bool,
    /// Action label whose transitions are prioritized by confluence
    /// reduction. `tau` selects the internal summands.
    pub confluence: Option<String>,
    pub detect_deadlock: bool,
    pub detect_divergence: bool,
    /// Labels treated as internal by divergence detection, besides `tau`.
    pub hidden: Vec<String>,
    pub watched_actions: Vec<String>,
    /// Full multi-actions to watch, as printed, e.g. `send(1)|recv(1)`.
    pub watched_multiactions: Vec<String>,
    pub detect_nondeterminism: bool,
    /// Save a trace for every detection, up to `max_traces`.
    pub trace: bool,
    pub max_traces: usize,
    pub trace_prefix: String,
    /// Save `<prefix>_error.trc` when generation fails.
    pub save_error_trace: bool,
    /// Seed for the randomized strategies and queue eviction. `None` seeds
    /// from entropy.
    pub seed: Option<u64>,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Breadth,
            max_states: usize::MAX,
            todo_max: None,
            bithash: None,
            caching: true,
            pruning: true,
            confluence: None,
            detect_deadlock: false,
            detect_divergence: false,
            hidden: Vec::new(),
            watched_actions: Vec::new(),
            watched_multiactions: Vec::new(),
            detect_nondeterminism: false,
            trace: false,
            max_traces: 10,
            trace_prefix: "lpsgen".to_string(),
            save_error_trace: false,
            seed: None,
        }
    }
}

impl ExploreConfig {
    /// Whether backpointers must be kept for trace reconstruction.
    pub fn needs_backpointers(&self) -> bool {
        self.trace || self.save_error_trace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names_round_trip() {
        for s in [
            Strategy::Breadth,
            Strategy::Depth,
            Strategy::Random,
            Strategy::ValuePrioritized,
            Strategy::ValueRandomPrioritized,
        ] {
            assert_eq!(s.name().parse::<Strategy>(), Ok(s));
        }
        assert_eq!("q".parse::<Strategy>(), Ok(Strategy::ValueRandomPrioritized));
        assert!("sideways".parse::<Strategy>().is_err());
    }
}
