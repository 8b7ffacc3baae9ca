//! Witness traces.

use crate::state::State;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceStep {
    pub action: String,
    pub state: State,
}

/// A path from an initial state: the initial state followed by
/// `(action, state)` steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trace {
    pub initial: State,
    pub steps: Vec<TraceStep>,
}

impl Trace {
    pub fn new(initial: State) -> Self {
        Self {
            initial,
            steps: Vec::new(),
        }
    }

    pub fn push(&mut self, action: String, state: State) {
        self.steps.push(TraceStep { action, state });
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_state(&self) -> &State {
        self.steps.last().map_or(&self.initial, |s| &s.state)
    }
}

/// Receiver of finished traces. A failure to persist is logged by the
/// driver and otherwise ignored.
pub trait TraceSink {
    fn save(&mut self, name: &str, trace: &Trace) -> io::Result<()>;
}

/// Writes each trace as a JSON file named `name` inside a directory.
#[derive(Debug, Clone)]
pub struct DirTraceSink {
    dir: PathBuf,
}

impl DirTraceSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TraceSink for DirTraceSink {
    fn save(&mut self, name: &str, trace: &Trace) -> io::Result<()> {
        let json = serde_json::to_string_pretty(trace).map_err(io::Error::from)?;
        fs::write(self.dir.join(name), json)
    }
}

/// Keeps traces in memory.
#[derive(Debug, Default, Clone)]
pub struct TraceCollector {
    pub traces: Vec<(String, Trace)>,
}

impl TraceSink for TraceCollector {
    fn save(&mut self, name: &str, trace: &Trace) -> io::Result<()> {
        self.traces.push((name.to_string(), trace.clone()));
        Ok(())
    }
}
