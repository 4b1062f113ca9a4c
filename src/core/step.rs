//! Step domain model

use crate::core::{
    condition::{InputTransform, StepCondition},
    context::ExecutionContext,
    operation::Operation,
};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A single step in a pipeline: one operation placed in the graph
#[derive(Clone)]
pub struct Step {
    id: String,
    operation: Arc<dyn Operation>,
    dependencies: Vec<String>,
    condition: Option<StepCondition>,
    input_transform: Option<InputTransform>,
    store_as: Option<String>,
}

impl Step {
    pub fn new(id: impl Into<String>, operation: Arc<dyn Operation>) -> Self {
        Self {
            id: id.into(),
            operation,
            dependencies: Vec::new(),
            condition: None,
            input_transform: None,
            store_as: None,
        }
    }

    /// Add dependencies on other steps
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Only run when `condition` holds
    pub fn when(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Compute the operation input with `transform` instead of the raw pipeline input
    pub fn with_input(mut self, transform: InputTransform) -> Self {
        self.input_transform = Some(transform);
        self
    }

    /// Publish the step's data payload under `key` in the shared store
    pub fn store_as(mut self, key: impl Into<String>) -> Self {
        self.store_as = Some(key.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn operation(&self) -> &dyn Operation {
        self.operation.as_ref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn condition(&self) -> Option<&StepCondition> {
        self.condition.as_ref()
    }

    pub fn input_transform(&self) -> Option<&InputTransform> {
        self.input_transform.as_ref()
    }

    pub fn output_key(&self) -> Option<&str> {
        self.store_as.as_deref()
    }

    /// Check if all dependencies are in the executed set
    pub fn dependencies_met(&self, executed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| executed.contains(dep))
    }

    /// Evaluate the guard; steps without one always run
    pub fn should_run(&self, ctx: &ExecutionContext) -> bool {
        self.condition.as_ref().map_or(true, |c| c.evaluate(ctx))
    }

    /// Operation input for this step
    pub fn resolve_input(&self, raw: &Value, ctx: &ExecutionContext) -> Value {
        match &self.input_transform {
            Some(transform) => transform.apply(raw, ctx),
            None => raw.clone(),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("id", &self.id)
            .field("operation", &self.operation.descriptor().id)
            .field("dependencies", &self.dependencies)
            .field("condition", &self.condition)
            .field("input_transform", &self.input_transform)
            .field("store_as", &self.store_as)
            .finish()
    }
}
