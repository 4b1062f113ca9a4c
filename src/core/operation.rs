//! Operation contract - the unit of work every step wraps
//!
//! An [`Operation`] is what the engine calls. Most operations are built by
//! composing a plain [`Work`] function with a [`CostEstimator`] through
//! [`ComposedOperation`], which times the work and attaches result metadata.

use crate::core::{
    context::ExecutionContext,
    result::{OperationResult, ResultMetadata, TokenUsage},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Error types for operation execution
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad category of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCategory {
    /// Text generation through a model provider
    Generation,
    /// Image generation or processing
    Media,
    /// Writes to a content store
    Persistence,
    /// Pure data shaping
    Transformation,
    /// Anything else
    Utility,
}

/// Weight of an operation; drives default cost and time estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// Default cost charged for one execution
    pub fn base_cost(&self) -> f64 {
        match self {
            Complexity::Low => 1.0,
            Complexity::Medium => 2.5,
            Complexity::High => 5.0,
        }
    }

    /// Default duration estimate for one execution
    pub fn base_time(&self) -> Duration {
        match self {
            Complexity::Low => Duration::from_millis(500),
            Complexity::Medium => Duration::from_secs(2),
            Complexity::High => Duration::from_secs(10),
        }
    }
}

/// Resources an operation declares. Advisory only; the engine never enforces them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    /// Capability tags (e.g. "text-model", "image-model", "database")
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Token or size ceiling
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Expected upper bound on execution time, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Identity and static properties of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub category: OperationCategory,
    pub complexity: Complexity,
    #[serde(default)]
    pub requirements: ResourceRequirements,
}

impl OperationDescriptor {
    pub fn new(id: impl Into<String>, category: OperationCategory, complexity: Complexity) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: "1.0.0".to_string(),
            category,
            complexity,
            requirements: ResourceRequirements::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_requirements(mut self, requirements: ResourceRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    /// Advisory timeout, if declared
    pub fn timeout_hint(&self) -> Option<Duration> {
        self.requirements.timeout_secs.map(Duration::from_secs)
    }
}

/// Outcome of input validation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// The unit-of-work interface every step wraps
#[async_trait]
pub trait Operation: Send + Sync {
    /// Identity, category, complexity and requirements
    fn descriptor(&self) -> &OperationDescriptor;

    /// Check that `input` is acceptable before execution
    fn validate(&self, _input: &Value, _ctx: &ExecutionContext) -> ValidationResult {
        ValidationResult::valid()
    }

    /// Run the operation
    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<OperationResult, OperationError>;

    /// Cost this execution is expected to incur
    fn estimate_cost(&self, _input: &Value, _ctx: &ExecutionContext) -> f64 {
        self.descriptor().complexity.base_cost()
    }

    /// Time this execution is expected to take
    fn estimate_time(&self, _input: &Value, _ctx: &ExecutionContext) -> Duration {
        self.descriptor().complexity.base_time()
    }
}

/// Pure cost/time estimation, kept apart from execution
pub trait CostEstimator: Send + Sync {
    fn estimate_cost(&self, descriptor: &OperationDescriptor, input: &Value, ctx: &ExecutionContext) -> f64;

    fn estimate_time(&self, descriptor: &OperationDescriptor, input: &Value, ctx: &ExecutionContext) -> Duration;
}

/// Estimates from the descriptor's complexity level alone
#[derive(Debug, Clone, Copy, Default)]
pub struct ComplexityCostEstimator;

impl CostEstimator for ComplexityCostEstimator {
    fn estimate_cost(&self, descriptor: &OperationDescriptor, _input: &Value, _ctx: &ExecutionContext) -> f64 {
        descriptor.complexity.base_cost()
    }

    fn estimate_time(&self, descriptor: &OperationDescriptor, _input: &Value, _ctx: &ExecutionContext) -> Duration {
        descriptor.complexity.base_time()
    }
}

/// Fixed cost per execution regardless of complexity
#[derive(Debug, Clone, Copy)]
pub struct FixedCostEstimator {
    pub cost: f64,
    pub time: Duration,
}

impl CostEstimator for FixedCostEstimator {
    fn estimate_cost(&self, _descriptor: &OperationDescriptor, _input: &Value, _ctx: &ExecutionContext) -> f64 {
        self.cost
    }

    fn estimate_time(&self, _descriptor: &OperationDescriptor, _input: &Value, _ctx: &ExecutionContext) -> Duration {
        self.time
    }
}

/// What a [`Work`] function produces
#[derive(Debug, Clone, Default)]
pub struct WorkOutput {
    pub data: Option<Value>,
    /// Actual cost, when the work knows it better than the estimate
    pub cost: Option<f64>,
    pub tokens: Option<TokenUsage>,
    pub model: Option<String>,
    pub extra: Map<String, Value>,
}

impl WorkOutput {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_tokens(mut self, tokens: TokenUsage) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.extra
            .insert("explanation".to_string(), Value::String(explanation.into()));
        self
    }
}

/// A plain unit of work, without any cross-cutting concerns
#[async_trait]
pub trait Work: Send + Sync {
    async fn run(&self, input: Value, ctx: &ExecutionContext) -> Result<WorkOutput, OperationError>;

    /// Input check, surfaced as [`Operation::validate`]
    fn check(&self, _input: &Value, _ctx: &ExecutionContext) -> ValidationResult {
        ValidationResult::valid()
    }
}

/// An [`Operation`] assembled from a [`Work`] function and a [`CostEstimator`]
///
/// `execute` estimates the cost, times the work, and attaches metadata
/// (execution time, cost, tokens, model, category and complexity echo).
pub struct ComposedOperation<W, E = ComplexityCostEstimator> {
    descriptor: OperationDescriptor,
    work: W,
    estimator: E,
}

impl<W: Work> ComposedOperation<W, ComplexityCostEstimator> {
    pub fn new(descriptor: OperationDescriptor, work: W) -> Self {
        Self {
            descriptor,
            work,
            estimator: ComplexityCostEstimator,
        }
    }
}

impl<W: Work, E: CostEstimator> ComposedOperation<W, E> {
    /// Swap the cost estimator
    pub fn with_estimator<E2: CostEstimator>(self, estimator: E2) -> ComposedOperation<W, E2> {
        ComposedOperation {
            descriptor: self.descriptor,
            work: self.work,
            estimator,
        }
    }

    pub fn work(&self) -> &W {
        &self.work
    }
}

#[async_trait]
impl<W: Work, E: CostEstimator> Operation for ComposedOperation<W, E> {
    fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    fn validate(&self, input: &Value, ctx: &ExecutionContext) -> ValidationResult {
        self.work.check(input, ctx)
    }

    async fn execute(&self, input: Value, ctx: &ExecutionContext) -> Result<OperationResult, OperationError> {
        let estimated = self.estimator.estimate_cost(&self.descriptor, &input, ctx);
        let started = Instant::now();
        let output = self.work.run(input, ctx).await?;
        let elapsed = started.elapsed();

        debug!(
            "Operation {} finished in {}ms (estimated cost {})",
            self.descriptor.id,
            elapsed.as_millis(),
            estimated
        );

        let metadata = ResultMetadata {
            execution_time_ms: elapsed.as_millis() as u64,
            cost: output.cost.unwrap_or(estimated),
            tokens: output.tokens,
            model: output.model,
            category: Some(self.descriptor.category),
            complexity: Some(self.descriptor.complexity),
            extra: output.extra,
        };

        Ok(OperationResult {
            success: true,
            data: output.data,
            error: None,
            error_detail: None,
            metadata,
        })
    }

    fn estimate_cost(&self, input: &Value, ctx: &ExecutionContext) -> f64 {
        self.estimator.estimate_cost(&self.descriptor, input, ctx)
    }

    fn estimate_time(&self, input: &Value, ctx: &ExecutionContext) -> Duration {
        self.estimator.estimate_time(&self.descriptor, input, ctx)
    }
}
