//! CLI command definitions for the `tutorsim` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod config;
pub mod experiences;
pub mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use tutorsim_types::config::OutputConfig;

/// Simulate tutoring conversations between an LLM student and an LLM teacher.
#[derive(Parser)]
#[command(name = "tutorsim", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ./tutorsim.toml when present).
    #[arg(long, global = true, env = "TUTORSIM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Detailed output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one simulated tutoring conversation.
    Run(RunArgs),

    /// Print the effective configuration (file + environment overrides).
    Config,

    /// Show statistics for the experience bank.
    Experiences {
        /// Experience bank file (defaults to the configured one).
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Problem text the learner is stuck on.
    #[arg(long, conflicts_with = "problem_file")]
    pub problem: Option<String>,

    /// Read the problem text from a file.
    #[arg(long)]
    pub problem_file: Option<PathBuf>,

    /// Override the maximum number of rounds.
    #[arg(long)]
    pub rounds: Option<u32>,

    /// Deliver tutor drafts without review.
    #[arg(long)]
    pub no_review: bool,

    /// Skip the knowledge analysis of the learner's exercise history.
    #[arg(long)]
    pub no_knowledge: bool,

    /// Skip the post-conversation reflection.
    #[arg(long)]
    pub no_reflection: bool,

    /// Directory for transcripts and the experience bank.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Experience bank location: relative paths live under the output dir.
pub fn experience_bank_path(output: &OutputConfig) -> PathBuf {
    output.dir.join(&output.experience_bank)
}
