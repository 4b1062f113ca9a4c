//! Status storage backends

use crate::status::ExecutionStatus;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Trait for status storage backends
#[async_trait::async_trait]
pub trait StatusStore: Send + Sync {
    /// Load the record of a request, if present and not expired
    async fn load(&self, request_id: &str) -> Result<Option<ExecutionStatus>>;

    /// Insert or replace a record
    async fn save(&self, status: &ExecutionStatus) -> Result<()>;

    /// Delete a record; returns whether one existed
    async fn remove(&self, request_id: &str) -> Result<bool>;

    /// Most recently updated records first, optionally for one project
    async fn list(&self, project_id: Option<&str>, limit: usize) -> Result<Vec<ExecutionStatus>>;

    /// Delete every record last updated before `cutoff`
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}

/// Bounded in-memory store
///
/// Finished records older than the TTL are invisible and dropped on the next
/// write. When full, the least recently updated finished record is evicted.
/// Pending and running records are never expired or evicted, so the store
/// may briefly exceed its capacity while many runs are in flight.
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<String, ExecutionStatus>>,
    capacity: usize,
    ttl: chrono::Duration,
}

impl InMemoryStatusStore {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of records currently held, expired ones included
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop finished records past their TTL
    pub async fn purge_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut records = self.records.write().await;
        Self::drop_expired(&mut records, cutoff)
    }

    fn is_expired(&self, status: &ExecutionStatus, now: DateTime<Utc>) -> bool {
        status.state.is_terminal() && status.updated_at < now - self.ttl
    }

    fn drop_expired(records: &mut HashMap<String, ExecutionStatus>, cutoff: DateTime<Utc>) -> usize {
        let before = records.len();
        records.retain(|_, status| !status.state.is_terminal() || status.updated_at >= cutoff);
        before - records.len()
    }

    fn drop_before(records: &mut HashMap<String, ExecutionStatus>, cutoff: DateTime<Utc>) -> usize {
        let before = records.len();
        records.retain(|_, status| status.updated_at >= cutoff);
        before - records.len()
    }
}

impl Default for InMemoryStatusStore {
    fn default() -> Self {
        Self::new(1024, Duration::from_secs(3600))
    }
}

#[async_trait::async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn load(&self, request_id: &str) -> Result<Option<ExecutionStatus>> {
        let records = self.records.read().await;
        Ok(records
            .get(request_id)
            .filter(|status| !self.is_expired(status, Utc::now()))
            .cloned())
    }

    async fn save(&self, status: &ExecutionStatus) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(status.request_id.clone(), status.clone());

        Self::drop_expired(&mut records, Utc::now() - self.ttl);
        while records.len() > self.capacity {
            let oldest = records
                .values()
                .filter(|s| s.request_id != status.request_id && s.state.is_terminal())
                .min_by_key(|s| s.updated_at)
                .map(|s| s.request_id.clone());
            match oldest {
                Some(id) => {
                    tracing::debug!("Evicting status record {}", id);
                    records.remove(&id);
                }
                None => break,
            }
        }

        Ok(())
    }

    async fn remove(&self, request_id: &str) -> Result<bool> {
        let mut records = self.records.write().await;
        Ok(records.remove(request_id).is_some())
    }

    async fn list(&self, project_id: Option<&str>, limit: usize) -> Result<Vec<ExecutionStatus>> {
        let now = Utc::now();
        let records = self.records.read().await;
        let mut matching: Vec<ExecutionStatus> = records
            .values()
            .filter(|s| project_id.map_or(true, |p| s.project_id == p))
            .filter(|s| !self.is_expired(s, now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.write().await;
        Ok(Self::drop_before(&mut records, cutoff))
    }
}
