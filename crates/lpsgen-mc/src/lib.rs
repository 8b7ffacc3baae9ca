//! State space generation for linear process models.
//!
//! The [`NextStateGenerator`] turns a state into its outgoing transitions;
//! the [`Explorer`] drives it over the reachable state space.

pub mod action;
pub mod cache;
pub mod config;
pub mod confluence;
pub mod divergence;
pub mod explorer;
pub mod frontier;
pub mod generator;
pub mod load;
pub mod model;
pub mod pruning;
pub mod sink;
pub mod state;
pub mod store;
pub mod trace;

pub use action::{Action, MultiAction, TAU};
pub use config::{ExploreConfig, Strategy};
pub use confluence::ConfluenceReducer;
pub use divergence::DivergenceDetector;
pub use explorer::{ExploreError, ExploreReport, ExploreResult, ExploreStatus, Explorer};
pub use generator::{
    GenerateError, GenerateResult, GeneratorOptions, GeneratorStats, Location, NextStateGenerator,
    SubsetId, Transition,
};
pub use load::LoadError;
pub use model::{ActionTemplate, Distribution, Model, ModelBuilder, ModelError, Summand};
pub use sink::{AutWriter, LtsCollector, NullSink, OutputSink};
pub use state::{Fingerprint, State};
pub use store::{BoundedStore, ExactStore, StateStore};
pub use trace::{DirTraceSink, Trace, TraceCollector, TraceSink};
