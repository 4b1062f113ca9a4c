//! Progress notification
//!
//! Every status change is published to the project's channel. Delivery is
//! best-effort; a failing notifier never affects the run.

use crate::status::{ExecutionStatus, LifecycleState, StepRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel closed")]
    ChannelClosed,

    #[error("Notification transport error: {0}")]
    Transport(String),
}

/// Kind of progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEventType {
    Started,
    Progress,
    Completed,
    Error,
}

impl ProgressEventType {
    pub fn for_status(status: &ExecutionStatus) -> Self {
        match status.state {
            LifecycleState::Pending => ProgressEventType::Started,
            LifecycleState::Running if status.completed_steps.is_empty() => ProgressEventType::Started,
            LifecycleState::Running => ProgressEventType::Progress,
            LifecycleState::Completed => ProgressEventType::Completed,
            LifecycleState::Failed => ProgressEventType::Error,
        }
    }
}

/// Payload pushed to subscribers of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub event_type: ProgressEventType,
    /// Snapshot of the status record after the update
    pub payload: ExecutionStatus,
    pub user_id: String,
    pub project_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn from_status(status: &ExecutionStatus) -> Self {
        Self {
            event_type: ProgressEventType::for_status(status),
            payload: status.clone(),
            user_id: status.user_id.clone(),
            project_id: status.project_id.clone(),
            timestamp: status.updated_at,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.payload.request_id
    }

    pub fn progress(&self) -> u8 {
        self.payload.progress
    }

    /// Most recently finished step, if any
    pub fn last_completed(&self) -> Option<&StepRecord> {
        self.payload.completed_steps.last()
    }
}

/// Push channel for progress events
#[async_trait]
pub trait ProgressNotifier: Send + Sync {
    /// Publish an event to everyone following `project_id`
    async fn publish(&self, project_id: &str, event: &ProgressEvent) -> Result<(), NotifyError>;
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl ProgressNotifier for NoopNotifier {
    async fn publish(&self, _project_id: &str, _event: &ProgressEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Forwards events into a tokio channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    /// A notifier and the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ProgressNotifier for ChannelNotifier {
    async fn publish(&self, _project_id: &str, event: &ProgressEvent) -> Result<(), NotifyError> {
        self.tx.send(event.clone()).map_err(|_| NotifyError::ChannelClosed)
    }
}
