//! CLI command definitions

use crate::execution::SchedulingStrategy;
use clap::Args;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Scheduling strategy (overrides the pipeline's engine settings)
    #[arg(long, value_enum)]
    pub strategy: Option<SchedulingStrategyArg>,

    /// Run input as inline JSON
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read run input from a JSON file
    #[arg(long)]
    pub input_file: Option<String>,

    /// Request ID to track the run under (generated if omitted)
    #[arg(long)]
    pub request_id: Option<String>,

    /// User the run is for
    #[arg(long, default_value = "local")]
    pub user: String,

    /// Project the run belongs to
    #[arg(long, default_value = "default")]
    pub project: String,

    /// Keep status in memory only instead of the history database
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the status of one run
#[derive(Debug, Args, Clone)]
pub struct StatusCommand {
    /// Request ID of the run
    #[arg(short, long)]
    pub request_id: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show execution history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Project to filter by
    #[arg(short, long)]
    pub project: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Delete old status records
#[derive(Debug, Args, Clone)]
pub struct PurgeCommand {
    /// Delete records not updated for this many seconds
    #[arg(long, default_value_t = 86_400)]
    pub older_than_secs: u64,
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
}

impl From<SchedulingStrategyArg> for SchedulingStrategy {
    fn from(arg: SchedulingStrategyArg) -> Self {
        match arg {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
        }
    }
}
