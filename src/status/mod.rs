//! Execution status tracking
//!
//! A per-request progress record, merged from partial updates by the engines
//! and pushed to an external [`ProgressNotifier`] after every change.

pub mod notifier;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;
mod tracker;

pub use notifier::{ChannelNotifier, NoopNotifier, NotifyError, ProgressEvent, ProgressEventType, ProgressNotifier};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStatusStore;
pub use store::{InMemoryStatusStore, StatusStore};
pub use tracker::ExecutionStatusTracker;

use crate::core::{OperationResult, RunIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors returned by status lookups
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("No execution status for request '{0}'")]
    NotFound(String),

    #[error("Status store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Run has not started
    Pending,
    /// Run is executing steps
    Running,
    /// Run finished successfully
    Completed,
    /// Run failed
    Failed,
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Completed | LifecycleState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Pending => "pending",
            LifecycleState::Running => "running",
            LifecycleState::Completed => "completed",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LifecycleState::Pending),
            "running" => Some(LifecycleState::Running),
            "completed" => Some(LifecycleState::Completed),
            "failed" => Some(LifecycleState::Failed),
            _ => None,
        }
    }
}

/// What a finished step contributed to the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub success: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    pub cost: f64,
    pub completed_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn skipped(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            success: true,
            skipped: true,
            explanation: Some("Skipped: condition not met".to_string()),
            content: None,
            cost: 0.0,
            completed_at: Utc::now(),
        }
    }

    pub fn from_result(step_id: impl Into<String>, result: &OperationResult) -> Self {
        let explanation = match (result.success, result.explanation()) {
            (_, Some(text)) => Some(text.to_string()),
            (false, None) => result.error.clone(),
            (true, None) => None,
        };
        Self {
            step_id: step_id.into(),
            success: result.success,
            skipped: false,
            explanation,
            content: result.data.clone(),
            cost: result.metadata.cost,
            completed_at: Utc::now(),
        }
    }
}

/// Live progress record of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub request_id: String,
    pub user_id: String,
    pub project_id: String,
    #[serde(default)]
    pub pipeline_id: Option<String>,
    pub state: LifecycleState,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub active_steps: Vec<String>,
    /// 0 to 100
    pub progress: u8,
    pub total_steps: usize,
    #[serde(default)]
    pub completed_steps: Vec<StepRecord>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionStatus {
    /// A fresh pending record
    pub fn new(identity: &RunIdentity) -> Self {
        let now = Utc::now();
        Self {
            request_id: identity.request_id.clone(),
            user_id: identity.user_id.clone(),
            project_id: identity.project_id.clone(),
            pipeline_id: None,
            state: LifecycleState::Pending,
            current_step: None,
            active_steps: Vec::new(),
            progress: 0,
            total_steps: 0,
            completed_steps: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Merge a partial update into this record
    pub fn apply(&mut self, update: StatusUpdate) {
        let now = Utc::now();

        if let Some(pipeline_id) = update.pipeline_id {
            self.pipeline_id = Some(pipeline_id);
        }
        if let Some(total) = update.total_steps {
            self.total_steps = total;
        }
        if let Some(state) = update.state {
            if state == LifecycleState::Running && self.started_at.is_none() {
                self.started_at = Some(now);
            }
            if state.is_terminal() {
                self.completed_at = Some(now);
                self.current_step = None;
                self.active_steps.clear();
            }
            self.state = state;
        }
        if let Some(current) = update.current_step {
            self.current_step = current;
        }
        if let Some(active) = update.active_steps {
            self.active_steps = active;
        }
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if let Some(record) = update.completed_step {
            self.completed_steps.push(record);
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        self.updated_at = now;
    }

    /// Sum of recorded step costs
    pub fn total_cost(&self) -> f64 {
        self.completed_steps.iter().map(|s| s.cost).sum()
    }
}

/// A partial change to an [`ExecutionStatus`]; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub pipeline_id: Option<String>,
    pub state: Option<LifecycleState>,
    pub current_step: Option<Option<String>>,
    pub active_steps: Option<Vec<String>>,
    pub progress: Option<u8>,
    pub total_steps: Option<usize>,
    pub completed_step: Option<StepRecord>,
    pub error: Option<String>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pipeline(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = Some(pipeline_id.into());
        self
    }

    pub fn state(mut self, state: LifecycleState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn current_step(mut self, step_id: Option<String>) -> Self {
        self.current_step = Some(step_id);
        self
    }

    pub fn active_steps(mut self, step_ids: Vec<String>) -> Self {
        self.active_steps = Some(step_ids);
        self
    }

    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn total_steps(mut self, total: usize) -> Self {
        self.total_steps = Some(total);
        self
    }

    pub fn completed_step(mut self, record: StepRecord) -> Self {
        self.completed_step = Some(record);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Percentage of `completed` over `total`, rounded
pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round().min(100.0) as u8
}
