//! Command-line interface for the lpsgen state space generator.

use clap::{Parser, Subcommand};
use lpsgen_mc::load;
use lpsgen_mc::{
    AutWriter, DirTraceSink, ExploreConfig, ExploreStatus, Explorer, GeneratorOptions, Model,
    NextStateGenerator, NullSink, OutputSink, Strategy, SubsetId,
};
use miette::Diagnostic;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("failed to load {path}: {message}")]
    #[diagnostic(
        code(lpsgen::load_error),
        help("models are JSON documents with `params`, `summands` and `init`")
    )]
    LoadError { path: String, message: String },

    #[error("failed to open output {path}: {message}")]
    IoError { path: String, message: String },

    #[error("exploration error: {message}")]
    #[diagnostic(code(lpsgen::explore_error))]
    ExploreError { message: String },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "lpsgen", version)]
#[command(about = "State space generator for linear process models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the state space of a model
    Explore {
        /// Model file (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Exploration strategy: breadth, depth, random, value-prioritized, value-random
        #[arg(short, long, default_value = "breadth")]
        strategy: Strategy,

        /// Maximum number of states to expand (0 = only add initial states)
        #[arg(long)]
        max_states: Option<usize>,

        /// Maximum number of states waiting to be expanded
        #[arg(long, value_name = "N")]
        todo_max: Option<usize>,

        /// Use a bounded fingerprint store with N slots instead of an exact one
        #[arg(long, value_name = "N")]
        bithash: Option<usize>,

        /// Disable the enumeration cache
        #[arg(long)]
        no_caching: bool,

        /// Disable the summand pruning tree
        #[arg(long)]
        no_pruning: bool,

        /// Apply tau-confluence reduction for the given action (usually `tau`)
        #[arg(long, value_name = "ACTION")]
        confluence: Option<String>,

        /// Report deadlocks
        #[arg(long)]
        deadlock: bool,

        /// Report divergent states
        #[arg(long)]
        divergence: bool,

        /// Action label treated as internal for divergence detection
        #[arg(long, value_name = "LABEL")]
        hidden: Vec<String>,

        /// Report transitions carrying this action label
        #[arg(short, long, value_name = "LABEL")]
        action: Vec<String>,

        /// Report transitions carrying exactly this multi-action, e.g. `send(1)|recv`
        #[arg(long, value_name = "MULTIACTION")]
        multiaction: Vec<String>,

        /// Report states with two equally labelled transitions to different states
        #[arg(long)]
        nondeterminism: bool,

        /// Save a trace for every detected deadlock, action, divergence or nondeterminism
        #[arg(short, long)]
        trace: bool,

        /// Stop after this many traces have been saved
        #[arg(long, default_value = "10")]
        max_traces: usize,

        /// Prefix of trace file names
        #[arg(long, default_value = "lpsgen")]
        trace_prefix: String,

        /// Save a trace to the offending state on a fatal error
        #[arg(long)]
        error_trace: bool,

        /// Seed for randomized strategies and frontier eviction
        #[arg(long)]
        seed: Option<u64>,

        /// Abort exploration after this many seconds
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        /// Write the state space in AUT format
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the parameters and summands of a model
    Info {
        /// Model file (JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if matches!(&cli.command, Commands::Explore { verbose: true, .. }) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Explore {
            file,
            strategy,
            max_states,
            todo_max,
            bithash,
            no_caching,
            no_pruning,
            confluence,
            deadlock,
            divergence,
            hidden,
            action,
            multiaction,
            nondeterminism,
            trace,
            max_traces,
            trace_prefix,
            error_trace,
            seed,
            time_limit,
            output,
            verbose: _,
        } => {
            let config = ExploreConfig {
                strategy,
                max_states: max_states.unwrap_or(usize::MAX),
                todo_max,
                bithash,
                caching: !no_caching,
                pruning: !no_pruning,
                confluence,
                detect_deadlock: deadlock,
                detect_divergence: divergence,
                hidden,
                watched_actions: action,
                watched_multiactions: multiaction,
                detect_nondeterminism: nondeterminism,
                trace,
                max_traces,
                trace_prefix,
                save_error_trace: error_trace,
                seed,
            };
            cmd_explore(&file, config, time_limit, output.as_deref())
        }
        Commands::Info { file } => cmd_info(&file),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}

fn load_model(file: &Path) -> CliResult<Arc<Model>> {
    let model = load::from_path(file).map_err(|e| CliError::LoadError {
        path: file.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Arc::new(model))
}

fn cmd_explore(
    file: &Path,
    config: ExploreConfig,
    time_limit: Option<u64>,
    output: Option<&Path>,
) -> CliResult<()> {
    info!("loading {}...", file.display());
    let model = load_model(file)?;

    let mut aut;
    let mut null = NullSink;
    let sink: &mut dyn OutputSink = match output {
        Some(path) => {
            aut = AutWriter::create(path).map_err(|e| CliError::IoError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            &mut aut
        }
        None => &mut null,
    };
    let mut traces = DirTraceSink::new(".");
    let wants_traces = config.needs_backpointers();

    let mut explorer = Explorer::new(model, config, sink);
    if wants_traces {
        explorer.set_trace_sink(&mut traces);
    }
    if let Some(secs) = time_limit {
        let flag = Arc::new(AtomicBool::new(false));
        explorer.set_stop_flag(Arc::clone(&flag));
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            flag.store(true, Ordering::Relaxed);
        });
    }

    let start = Instant::now();
    let report = explorer.run().map_err(|e| CliError::ExploreError {
        message: e.to_string(),
    })?;
    let elapsed = start.elapsed();

    if report.status == ExploreStatus::Aborted {
        warn!("time limit reached, exploration aborted");
    }

    println!();
    println!("Result: {}", report.status);
    println!("  States: {}", report.states);
    println!("  Transitions: {}", report.transitions);
    if report.levels > 0 {
        println!("  Levels: {}", report.levels);
    }
    if report.deadlocks > 0 {
        println!("  Deadlocks: {}", report.deadlocks);
    }
    if report.divergences > 0 {
        println!("  Divergent states: {}", report.divergences);
    }
    if report.detected_actions > 0 {
        println!("  Detected actions: {}", report.detected_actions);
    }
    if report.nondeterministic_states > 0 {
        println!("  Nondeterministic states: {}", report.nondeterministic_states);
    }
    if report.traces_saved > 0 {
        println!("  Traces saved: {}", report.traces_saved);
    }
    println!("  Time: {:.2}s", elapsed.as_secs_f64());
    println!(
        "  States/sec: {:.0}",
        report.states as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    if let Some(path) = output {
        println!("  Output: {}", path.display());
    }
    Ok(())
}

fn cmd_info(file: &Path) -> CliResult<()> {
    let model = load_model(file)?;
    print!("{}", model);

    let mut generator =
        NextStateGenerator::with_options(Arc::clone(&model), GeneratorOptions::default());
    if let Some(order) = generator.pruning_parameters(SubsetId::ALL) {
        let names: Vec<&str> = order
            .iter()
            .map(|&p| &*model.params()[p].name)
            .collect();
        println!("pruning order: {}", names.join(", "));
    }

    let initial = generator
        .initial_states()
        .map_err(|e| CliError::ExploreError {
            message: e.to_string(),
        })?;
    for (state, probability) in initial {
        println!("initial {} (probability {})", state, probability);
    }
    Ok(())
}
