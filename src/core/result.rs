//! Step and pipeline result models

use crate::core::operation::{Complexity, OperationCategory};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Metadata attached to every operation result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Wall time spent inside the operation
    pub execution_time_ms: u64,

    /// Cost charged for this execution
    pub cost: f64,

    /// Token usage (if the operation talks to a model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,

    /// Model identifier (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<OperationCategory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,

    /// Operation-specific extension fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

/// Outcome of a single operation execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Longer diagnostic for the error (cause chain, panic payload, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    #[serde(default)]
    pub metadata: ResultMetadata,
}

impl OperationResult {
    /// A successful result carrying `data`
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_detail: None,
            metadata: ResultMetadata::default(),
        }
    }

    /// A successful result without payload
    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
            error_detail: None,
            metadata: ResultMetadata::default(),
        }
    }

    /// A failed result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            error_detail: None,
            metadata: ResultMetadata::default(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }

    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.metadata.cost = cost;
        self
    }

    pub fn with_execution_time(mut self, elapsed: Duration) -> Self {
        self.metadata.execution_time_ms = elapsed.as_millis() as u64;
        self
    }

    /// Error message, or a placeholder when the operation gave none
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }

    /// Human-readable explanation published with progress updates
    pub fn explanation(&self) -> Option<&str> {
        self.metadata.extra.get("explanation").and_then(|v| v.as_str())
    }
}

/// Aggregate outcome of one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,

    /// Results of the steps that actually ran (skipped steps are absent)
    pub steps: HashMap<String, OperationResult>,

    /// Steps whose condition evaluated false
    pub skipped: Vec<String>,

    /// Order in which step results were recorded: completion order when
    /// sequential, ready-set (declaration) order within each wavefront when parallel
    pub execution_order: Vec<String>,

    /// Step ids per wavefront (a single-step wavefront per step when sequential)
    pub wavefronts: Vec<Vec<String>>,

    pub total_cost: f64,

    pub total_time_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineResult {
    /// A failed result that never reached any step
    pub fn aborted(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            total_time_ms: elapsed.as_millis() as u64,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Record a step result and accumulate its cost
    pub(crate) fn record(&mut self, step_id: &str, result: OperationResult) {
        self.total_cost += result.metadata.cost;
        self.execution_order.push(step_id.to_string());
        self.steps.insert(step_id.to_string(), result);
    }

    pub(crate) fn record_skip(&mut self, step_id: &str) {
        self.execution_order.push(step_id.to_string());
        self.skipped.push(step_id.to_string());
    }

    /// Get the result of a step
    pub fn step(&self, step_id: &str) -> Option<&OperationResult> {
        self.steps.get(step_id)
    }
}
