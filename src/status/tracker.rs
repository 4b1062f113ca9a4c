//! Status tracker shared by every engine

use crate::core::RunIdentity;
use crate::core::config::StatusSettings;
use crate::status::{
    ExecutionStatus, InMemoryStatusStore, ProgressEvent, ProgressNotifier, StatusError, StatusStore, StatusUpdate,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Owns the status records and pushes a notification after every change
///
/// Updates for a request are applied one at a time, and notifications leave
/// in the order the updates were applied. Must be created inside a Tokio
/// runtime: delivery runs on a background task.
pub struct ExecutionStatusTracker {
    store: Arc<dyn StatusStore>,
    events: mpsc::UnboundedSender<ProgressEvent>,
    write_lock: Mutex<()>,
}

impl ExecutionStatusTracker {
    pub fn new(store: Arc<dyn StatusStore>, notifier: Arc<dyn ProgressNotifier>) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(rx, notifier));
        Self {
            store,
            events,
            write_lock: Mutex::new(()),
        }
    }

    /// Tracker over a bounded in-memory store
    pub fn in_memory(settings: &StatusSettings, notifier: Arc<dyn ProgressNotifier>) -> Self {
        let store = InMemoryStatusStore::new(settings.capacity, settings.ttl());
        Self::new(Arc::new(store), notifier)
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Merge `update` into the request's record, creating it if absent
    pub async fn update(&self, identity: &RunIdentity, update: StatusUpdate) -> Result<ExecutionStatus, StatusError> {
        let status = {
            let _guard = self.write_lock.lock().await;
            let mut status = self
                .store
                .load(&identity.request_id)
                .await?
                .unwrap_or_else(|| ExecutionStatus::new(identity));
            status.apply(update);
            self.store.save(&status).await?;
            // Queue while still holding the lock so events keep update order
            self.publish(&status);
            status
        };
        Ok(status)
    }

    pub async fn get_status(&self, request_id: &str) -> Result<ExecutionStatus, StatusError> {
        self.store
            .load(request_id)
            .await?
            .ok_or_else(|| StatusError::NotFound(request_id.to_string()))
    }

    pub async fn list(&self, project_id: Option<&str>, limit: usize) -> Result<Vec<ExecutionStatus>, StatusError> {
        Ok(self.store.list(project_id, limit).await?)
    }

    pub async fn remove(&self, request_id: &str) -> Result<bool, StatusError> {
        let _guard = self.write_lock.lock().await;
        Ok(self.store.remove(request_id).await?)
    }

    /// Delete records not updated within `age`
    pub async fn purge_expired(&self, age: Duration) -> Result<usize, StatusError> {
        let age = chrono::Duration::from_std(age).map_err(|e| StatusError::Store(e.into()))?;
        let _guard = self.write_lock.lock().await;
        Ok(self.store.purge_older_than(Utc::now() - age).await?)
    }

    fn publish(&self, status: &ExecutionStatus) {
        if self.events.send(ProgressEvent::from_status(status)).is_err() {
            warn!("Progress dispatcher stopped; dropping event for {}", status.request_id);
        }
    }
}

async fn dispatch(mut rx: mpsc::UnboundedReceiver<ProgressEvent>, notifier: Arc<dyn ProgressNotifier>) {
    while let Some(event) = rx.recv().await {
        debug!(
            "Publishing {:?} for {} ({}%)",
            event.event_type,
            event.request_id(),
            event.progress()
        );
        if let Err(e) = notifier.publish(&event.project_id, &event).await {
            warn!("Failed to publish progress for {}: {}", event.request_id(), e);
        }
    }
}
