use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use storyloom::cli::commands::{HistoryCommand, PurgeCommand, RunCommand, StatusCommand, ValidateCommand};
use storyloom::cli::output::*;
use storyloom::cli::{Cli, Command};
use storyloom::core::config::{PipelineConfig, StatusSettings};
use storyloom::core::{ExecutionContext, RunIdentity};
use storyloom::execution::{ExecutionEngine, SchedulingStrategy};
use storyloom::operations::builtin_registry;
use storyloom::status::{ExecutionStatusTracker, InMemoryStatusStore, NoopNotifier, StatusError, StatusStore};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Status(cmd) => show_status(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
        Command::Purge(cmd) => purge(cmd).await?,
    }

    Ok(())
}

/// Status records live in the history database unless the sqlite feature is off
#[cfg(feature = "sqlite")]
async fn history_store() -> Result<Arc<dyn StatusStore>> {
    let store = storyloom::status::SqliteStatusStore::with_default_path().await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn history_store() -> Result<Arc<dyn StatusStore>> {
    anyhow::bail!("History requires the 'sqlite' feature")
}

fn read_input(cmd: &RunCommand) -> Result<Value> {
    if let Some(inline) = &cmd.input {
        return serde_json::from_str(inline).context("--input is not valid JSON");
    }
    if let Some(path) = &cmd.input_file {
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
        return serde_json::from_str(&content).with_context(|| format!("{} is not valid JSON", path));
    }
    Ok(Value::Object(Default::default()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    // Load pipeline config
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    let registry = builtin_registry();
    let pipeline = config.to_pipeline(&registry)?;
    let input = read_input(cmd)?;

    let store: Arc<dyn StatusStore> = if cmd.no_history {
        let settings: &StatusSettings = &config.engine.status;
        Arc::new(InMemoryStatusStore::new(settings.capacity, settings.ttl()))
    } else {
        history_store().await?
    };

    let notifier = Arc::new(ConsoleNotifier::new(create_progress_bar()));
    let tracker = Arc::new(ExecutionStatusTracker::new(store, notifier.clone()));

    let strategy: SchedulingStrategy = cmd.strategy.map(Into::into).unwrap_or(config.engine.strategy);
    let engine = ExecutionEngine::new(strategy, tracker);

    let request_id = cmd
        .request_id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut ctx = ExecutionContext::new(RunIdentity::new(&cmd.user, &cmd.project, &request_id));

    // Execute pipeline
    println!(
        "{} Request {} ({:?}, {} steps)",
        INFO,
        style(&request_id).dim(),
        strategy,
        pipeline.len()
    );
    let result = engine.execute(&pipeline, input, &mut ctx).await;
    notifier.wait_finished(Duration::from_secs(2)).await;

    print_result(&result);
    if result.success {
        println!(
            "\n{} {} completed {}",
            CHECK,
            style(pipeline.name()).bold(),
            style("successfully").green()
        );
        Ok(())
    } else {
        println!("\n{} {} {}", CROSS, style(pipeline.name()).bold(), style("failed").red());
        error!("{}", result.error.as_deref().unwrap_or("unknown error"));
        std::process::exit(1);
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let registry = builtin_registry();
    let built = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let pipeline = config.to_pipeline(&registry)?;
        Ok((config, pipeline))
    });

    let (config, pipeline) = match built {
        Ok(built) => built,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let report = pipeline.validate();
    if !report.is_valid {
        println!("{} Validation failed:", CROSS);
        for issue in &report.errors {
            println!("  {}", style(issue).red());
        }
        std::process::exit(1);
    }

    let ctx = ExecutionContext::for_request("validate");
    let empty = Value::Object(Default::default());
    println!("{} Pipeline configuration is valid!", CHECK);
    println!("  Name: {}", style(&config.name).bold());
    println!("  Steps: {}", style(pipeline.len()).cyan());
    println!(
        "  Estimated cost: {}",
        style(format!("{:.2}", pipeline.estimate_cost(&empty, &ctx))).cyan()
    );
    println!(
        "  Estimated time (serial): {}",
        style(format_duration(pipeline.estimate_time(&empty, &ctx))).dim()
    );

    if cmd.json {
        let json = serde_json::to_string_pretty(&config)?;
        println!("\n{}", json);
    }
    Ok(())
}

async fn show_status(cmd: &StatusCommand) -> Result<()> {
    let tracker = ExecutionStatusTracker::new(history_store().await?, Arc::new(NoopNotifier));

    match tracker.get_status(&cmd.request_id).await {
        Ok(status) if cmd.json => println!("{}", serde_json::to_string_pretty(&status)?),
        Ok(status) => print_status_details(&status),
        Err(StatusError::NotFound(_)) => println!("{} No run found for request {}", WARN, cmd.request_id),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let tracker = ExecutionStatusTracker::new(history_store().await?, Arc::new(NoopNotifier));
    let runs = tracker.list(cmd.project.as_deref(), cmd.limit).await?;

    if runs.is_empty() {
        println!("{} No executions found", INFO);
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "executions": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Execution history (showing latest {}):", INFO, cmd.limit);
        for status in &runs {
            println!("  {}", format_status_summary(status));
        }
    }

    Ok(())
}

async fn purge(cmd: &PurgeCommand) -> Result<()> {
    let tracker = ExecutionStatusTracker::new(history_store().await?, Arc::new(NoopNotifier));
    let removed = tracker
        .purge_expired(Duration::from_secs(cmd.older_than_secs))
        .await?;
    println!("{} Removed {} status record(s)", INFO, style(removed).cyan());
    Ok(())
}
