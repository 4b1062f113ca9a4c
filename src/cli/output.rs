//! CLI output formatting

use crate::core::PipelineResult;
use crate::status::{
    ExecutionStatus, LifecycleState, NotifyError, ProgressEvent, ProgressEventType, ProgressNotifier, StepRecord,
};
use async_trait::async_trait;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Create a percentage progress bar
pub fn create_progress_bar() -> ProgressBar {
    let progress = ProgressBar::new(100);
    if let Ok(bar_style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Drives a terminal progress bar from progress events
pub struct ConsoleNotifier {
    progress: ProgressBar,
    printed: Mutex<HashSet<String>>,
    finished: Notify,
}

impl ConsoleNotifier {
    pub fn new(progress: ProgressBar) -> Self {
        Self {
            progress,
            printed: Mutex::new(HashSet::new()),
            finished: Notify::new(),
        }
    }

    /// Wait until a terminal event has been drawn, or `timeout` elapses
    pub async fn wait_finished(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.finished.notified()).await;
    }

    fn print_completed(&self, record: &StepRecord) {
        let first_time = self
            .printed
            .lock()
            .map(|mut printed| printed.insert(record.step_id.clone()))
            .unwrap_or(false);
        if first_time {
            self.progress.println(format_step_record(record));
        }
    }
}

#[async_trait]
impl ProgressNotifier for ConsoleNotifier {
    async fn publish(&self, _project_id: &str, event: &ProgressEvent) -> Result<(), NotifyError> {
        let status = &event.payload;
        for record in &status.completed_steps {
            self.print_completed(record);
        }

        self.progress.set_position(status.progress as u64);
        match event.event_type {
            ProgressEventType::Started | ProgressEventType::Progress => {
                if !status.active_steps.is_empty() {
                    self.progress.set_message(status.active_steps.join(", "));
                }
            }
            ProgressEventType::Completed | ProgressEventType::Error => {
                self.progress.finish_and_clear();
                self.finished.notify_one();
            }
        }
        Ok(())
    }
}

/// Format a lifecycle state for display
pub fn format_state(state: LifecycleState) -> String {
    match state {
        LifecycleState::Pending => style("PENDING").dim().to_string(),
        LifecycleState::Running => style("RUNNING").yellow().to_string(),
        LifecycleState::Completed => style("COMPLETED").green().to_string(),
        LifecycleState::Failed => style("FAILED").red().to_string(),
    }
}

/// One line per finished step
pub fn format_step_record(record: &StepRecord) -> String {
    if record.skipped {
        return format!("{} {}", SKIP, style(&record.step_id).dim());
    }
    let icon = if record.success { CHECK } else { CROSS };
    let name = if record.success {
        style(&record.step_id).green()
    } else {
        style(&record.step_id).red()
    };
    match &record.explanation {
        Some(text) => format!("{} {} ({:.2}) {}", icon, name, record.cost, style(text).dim()),
        None => format!("{} {} ({:.2})", icon, name, record.cost),
    }
}

/// One-line history entry
pub fn format_status_summary(status: &ExecutionStatus) -> String {
    let icon = match status.state {
        LifecycleState::Completed => CHECK,
        LifecycleState::Failed => CROSS,
        LifecycleState::Running => SPINNER,
        LifecycleState::Pending => INFO,
    };

    format!(
        "{} {} - {} - {} ({}/{}) - {} - {}",
        icon,
        style(&status.request_id).dim(),
        style(status.pipeline_id.as_deref().unwrap_or("?")).bold(),
        format_state(status.state),
        status.completed_steps.len(),
        status.total_steps,
        style(format!("{}%", status.progress)).cyan(),
        style(status.updated_at.to_rfc3339()).dim()
    )
}

/// Multi-line status report
pub fn print_status_details(status: &ExecutionStatus) {
    println!("{} Execution Status", INFO);
    println!("  Request: {}", style(&status.request_id).cyan());
    println!("  Project: {}", style(&status.project_id).bold());
    if let Some(pipeline) = &status.pipeline_id {
        println!("  Pipeline: {}", style(pipeline).bold());
    }
    println!("  State: {}", format_state(status.state));
    println!(
        "  Progress: {} ({}/{})",
        style(format!("{}%", status.progress)).cyan(),
        status.completed_steps.len(),
        status.total_steps
    );
    if !status.active_steps.is_empty() {
        println!("  Active: {}", status.active_steps.join(", "));
    }
    if let Some(started) = status.started_at {
        println!("  Started: {}", style(started.to_rfc3339()).dim());
    }
    if let Some(completed) = status.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
    }
    if let Some(error) = &status.error {
        println!("  Error: {}", style(error).red());
    }
    for record in &status.completed_steps {
        println!("    {}", format_step_record(record));
    }
}

/// Final summary of a run
pub fn print_result(result: &PipelineResult) {
    println!(
        "  Steps: {} run, {} skipped",
        style(result.steps.len()).cyan(),
        style(result.skipped.len()).dim()
    );
    println!("  Cost: {}", style(format!("{:.2}", result.total_cost)).cyan());
    println!("  Time: {}", style(format_duration(Duration::from_millis(result.total_time_ms))).dim());
    if result.wavefronts.len() < result.execution_order.len() {
        for (i, wave) in result.wavefronts.iter().enumerate() {
            println!("  Wavefront {}: {}", i + 1, wave.join(", "));
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{}.{:01}s", secs, (millis % 1000) / 100)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
