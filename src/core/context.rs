//! Execution context - per-run shared state and prior step results

use crate::core::result::OperationResult;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by context mutation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Shared store key '{0}' was already written")]
    KeyAlreadySet(String),
}

/// Who a run is for
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    pub user_id: String,
    pub project_id: String,
    pub request_id: String,
}

impl RunIdentity {
    pub fn new(
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            project_id: project_id.into(),
            request_id: request_id.into(),
        }
    }
}

/// Write-once key-value store shared by the steps of one run
///
/// Steps running in the same wavefront write distinct keys, so the map is
/// never contended on a single key.
#[derive(Debug, Default)]
pub struct SharedStore {
    entries: DashMap<String, Value>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; a key can only be written once per run
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Result<(), ContextError> {
        match self.entries.entry(key.into()) {
            Entry::Occupied(entry) => Err(ContextError::KeyAlreadySet(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(())
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Execution context for a pipeline run
///
/// Created fresh per request and dropped when the run completes.
#[derive(Debug)]
pub struct ExecutionContext {
    pub identity: RunIdentity,

    /// When the run was created
    pub started_at: DateTime<Utc>,

    /// Free-form request metadata
    pub metadata: HashMap<String, String>,

    shared: SharedStore,

    /// Results of steps that already ran (skipped steps never appear)
    prior_results: HashMap<String, OperationResult>,
}

impl ExecutionContext {
    pub fn new(identity: RunIdentity) -> Self {
        Self {
            identity,
            started_at: Utc::now(),
            metadata: HashMap::new(),
            shared: SharedStore::new(),
            prior_results: HashMap::new(),
        }
    }

    /// Context with only a request id set
    pub fn for_request(request_id: impl Into<String>) -> Self {
        Self::new(RunIdentity {
            request_id: request_id.into(),
            ..Default::default()
        })
    }

    pub fn request_id(&self) -> &str {
        &self.identity.request_id
    }

    pub fn shared(&self) -> &SharedStore {
        &self.shared
    }

    pub fn prior_result(&self, step_id: &str) -> Option<&OperationResult> {
        self.prior_results.get(step_id)
    }

    pub fn prior_results(&self) -> &HashMap<String, OperationResult> {
        &self.prior_results
    }

    /// Data payload of a prior step, if it ran and produced one
    pub fn step_output(&self, step_id: &str) -> Option<&Value> {
        self.prior_results.get(step_id).and_then(|r| r.data.as_ref())
    }

    pub(crate) fn record_result(&mut self, step_id: &str, result: OperationResult) {
        self.prior_results.insert(step_id.to_string(), result);
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn get_metadata(&self, key: &str) -> Option<&String> {
        self.metadata.get(key)
    }
}
