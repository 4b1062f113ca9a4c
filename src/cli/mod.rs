//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, PurgeCommand, RunCommand, StatusCommand, ValidateCommand};
use std::ffi::OsString;

/// Run story-generation pipelines and inspect their progress
#[derive(Debug, Parser, Clone)]
#[command(name = "storyloom")]
#[command(version = "0.1.0")]
#[command(about = "Dependency-ordered pipelines for structured creative writing", long_about = None)]
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
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Show the status of a run
    Status(StatusCommand),

    /// Show execution history
    History(HistoryCommand),

    /// Delete old status records
    Purge(PurgeCommand),
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
