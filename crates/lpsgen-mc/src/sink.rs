//! Output sinks for the explored state space.

use crate::action::MultiAction;
use crate::state::State;
use num_rational::Rational64;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

/// A probabilistic target list: state indices with probabilities, primary
/// target first.
pub type Targets = [(usize, Rational64)];

/// Receiver of the explored state space. Failures are reported to the
/// driver, which logs them and carries on.
pub trait OutputSink {
    fn set_initial(&mut self, initial: &Targets) -> io::Result<()>;

    fn add_state(&mut self, index: usize, state: &State) -> io::Result<()>;

    fn add_transition(&mut self, source: usize, action: &MultiAction, targets: &Targets) -> io::Result<()>;

    /// Called once after exploration with the final counts.
    fn finish(&mut self, states: usize, transitions: usize) -> io::Result<()> {
        let _ = (states, transitions);
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn set_initial(&mut self, _initial: &Targets) -> io::Result<()> {
        Ok(())
    }

    fn add_state(&mut self, _index: usize, _state: &State) -> io::Result<()> {
        Ok(())
    }

    fn add_transition(&mut self, _source: usize, _action: &MultiAction, _targets: &Targets) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory labelled transition system.
#[derive(Debug, Default, Clone)]
pub struct LtsCollector {
    pub initial: Vec<(usize, Rational64)>,
    pub states: Vec<(usize, State)>,
    pub transitions: Vec<(usize, String, Vec<(usize, Rational64)>)>,
}

impl LtsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions as `(source, label, primary target)`.
    pub fn edges(&self) -> Vec<(usize, &str, usize)> {
        self.transitions
            .iter()
            .map(|(s, l, t)| (*s, l.as_str(), t[0].0))
            .collect()
    }
}

impl OutputSink for LtsCollector {
    fn set_initial(&mut self, initial: &Targets) -> io::Result<()> {
        self.initial = initial.to_vec();
        Ok(())
    }

    fn add_state(&mut self, index: usize, state: &State) -> io::Result<()> {
        self.states.push((index, state.clone()));
        Ok(())
    }

    fn add_transition(&mut self, source: usize, action: &MultiAction, targets: &Targets) -> io::Result<()> {
        self.transitions
            .push((source, action.to_string(), targets.to_vec()));
        Ok(())
    }
}

/// Width reserved for the header, which is rewritten once the counts are known.
const HEADER_WIDTH: usize = 64;

/// Writer for the Aldebaran (`.aut`) format.
///
/// A probabilistic target is written as `s1 p1 s2 p2 ... sn`: the primary
/// target comes last and its probability is implied.
pub struct AutWriter<W: Write + Seek> {
    out: W,
    initial: String,
}

impl AutWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write + Seek> AutWriter<W> {
    pub fn new(mut out: W) -> io::Result<Self> {
        writeln!(out, "{:width$}", "", width = HEADER_WIDTH)?;
        Ok(Self {
            out,
            initial: "0".to_string(),
        })
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(&self, states: usize, transitions: usize) -> String {
        format!("des ({},{},{})", self.initial, transitions, states)
    }
}

fn format_targets(targets: &Targets) -> String {
    let mut out = String::new();
    if let Some(((primary, _), rest)) = targets.split_first() {
        for (index, p) in rest {
            out.push_str(&format!("{} {}/{} ", index, p.numer(), p.denom()));
        }
        out.push_str(&primary.to_string());
    }
    out
}

impl<W: Write + Seek> OutputSink for AutWriter<W> {
    fn set_initial(&mut self, initial: &Targets) -> io::Result<()> {
        self.initial = format_targets(initial);
        Ok(())
    }

    fn add_state(&mut self, _index: usize, _state: &State) -> io::Result<()> {
        Ok(())
    }

    fn add_transition(&mut self, source: usize, action: &MultiAction, targets: &Targets) -> io::Result<()> {
        writeln!(self.out, "({},\"{}\",{})", source, action, format_targets(targets))
    }

    fn finish(&mut self, states: usize, transitions: usize) -> io::Result<()> {
        let header = self.header(states, transitions);
        if header.len() > HEADER_WIDTH {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("aut header `{}` does not fit the reserved space", header),
            ));
        }
        self.out.flush()?;
        self.out.seek(SeekFrom::Start(0))?;
        write!(self.out, "{:width$}", header, width = HEADER_WIDTH)?;
        self.out.seek(SeekFrom::End(0))?;
        self.out.flush()
    }
}
