//! weft CLI
//!
//! Loads a `.weft` program and explores its interleavings:
//!
//! ```text
//! weft check counter.weft
//! Trace count: 6 (also 1 sleepset blocked)
//! ```
//!
//! On error the triggering interleaving is rendered after the counts.
//! Exit code 1 means an error was found, 2 means the invocation failed.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use weft_check::{CheckConfig, ErrorPolicy, Reduction, TieBreak};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Stateless model checker for concurrent programs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore all schedules of a program and report errors
    Check {
        /// Program to check
        file: PathBuf,
        /// Reduction algorithm
        #[arg(long, value_enum, default_value = "dpor")]
        reduction: ReductionArg,
        /// Keep exploring after the first error (full trace counts)
        #[arg(long)]
        keep_going: bool,
        /// Report unsynchronized conflicting plain accesses as errors
        #[arg(long)]
        flag_races: bool,
        /// Stop each run after this many steps
        #[arg(long)]
        max_steps: Option<u64>,
        /// Stop exploring after this many runs
        #[arg(long)]
        max_runs: Option<u64>,
        /// Try higher thread ids first when breaking ties
        #[arg(long)]
        reverse_ties: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReductionArg {
    /// Classic DPOR with sleep sets
    Dpor,
    /// No reduction (exponential; differential-testing reference)
    None,
}

impl From<ReductionArg> for Reduction {
    fn from(arg: ReductionArg) -> Self {
        match arg {
            ReductionArg::Dpor => Reduction::Dpor,
            ReductionArg::None => Reduction::Exhaustive,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            file,
            reduction,
            keep_going,
            flag_races,
            max_steps,
            max_runs,
            reverse_ties,
        } => {
            let program = match weft_core::load_path(&file) {
                Ok(program) => program,
                Err(err) => {
                    eprintln!("Error: {err}");
                    return ExitCode::from(2);
                }
            };
            debug!(
                threads = program.thread_count(),
                vars = program.vars.len(),
                locks = program.locks.len(),
                "program loaded"
            );

            let mut config = CheckConfig::new()
                .with_reduction(reduction.into())
                .with_flag_races(flag_races);
            if keep_going {
                config = config.with_policy(ErrorPolicy::KeepGoing);
            }
            if reverse_ties {
                config = config.with_tie_break(TieBreak::HighestFirst);
            }
            if let Some(max) = max_steps {
                config = config.with_max_steps_per_run(max);
            }
            if let Some(max) = max_runs {
                config = config.with_max_runs(max);
            }

            match weft_check::check(&program, &config) {
                Ok(result) => {
                    println!("{result}");
                    if result.has_errors() {
                        ExitCode::from(1)
                    } else {
                        ExitCode::SUCCESS
                    }
                }
                Err(err) => {
                    eprintln!("Error: {err}");
                    ExitCode::from(2)
                }
            }
        }
    }
}
