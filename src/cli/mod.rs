//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, PlanCommand, RunCommand};
use std::ffi::OsString;

/// Runs the daily conformance load on an existing Dataproc cluster
#[derive(Debug, Parser, Clone)]
#[command(name = "conformance-orchestrator")]
#[command(version = "0.1.0")]
#[command(about = "Runs PySpark jobs on an existing Dataproc cluster (no create/delete)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the pipeline
    Run(RunCommand),

    /// Resolve configuration and print the jobs a run would submit
    Plan(PlanCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
