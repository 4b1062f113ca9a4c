//! Step executor - runs a single step against the run context

use crate::core::{ExecutionContext, OperationResult, Step};
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of executing a step
#[derive(Debug, Clone)]
pub enum StepOutcome {
    /// Condition evaluated false; the operation never ran
    Skipped,
    /// Operation ran (or was rejected by validation); check `success`
    Ran(OperationResult),
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepOutcome::Ran(result) if !result.success)
    }
}

/// Executes a single step
///
/// Never returns an error: operation errors, validation rejections and
/// panics all become a failed [`OperationResult`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StepExecutor;

impl StepExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the condition, resolve input, validate, then run the operation
    ///
    /// A panic anywhere in that sequence, including inside a named condition
    /// or transform, fails the step instead of unwinding into the engine.
    pub async fn execute(&self, step: &Step, raw_input: &Value, ctx: &ExecutionContext) -> StepOutcome {
        let started = Instant::now();
        match AssertUnwindSafe(self.run_step(step, raw_input, ctx)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Step {} panicked: {}", step.id(), message);
                let mut result = OperationResult::failure(format!("Step panicked: {}", message));
                result.metadata.execution_time_ms = started.elapsed().as_millis() as u64;
                StepOutcome::Ran(result)
            }
        }
    }

    async fn run_step(&self, step: &Step, raw_input: &Value, ctx: &ExecutionContext) -> StepOutcome {
        if !step.should_run(ctx) {
            info!("Skipping step {}: condition not met", step.id());
            return StepOutcome::Skipped;
        }

        let input = step.resolve_input(raw_input, ctx);
        let operation = step.operation();
        let descriptor = operation.descriptor();

        let validation = operation.validate(&input, ctx);
        if !validation.is_valid {
            let message = format!("Validation failed: {}", validation.errors.join(", "));
            warn!("Step {} rejected input: {}", step.id(), message);
            return StepOutcome::Ran(OperationResult::failure(message));
        }

        info!("Executing step: {} ({})", step.id(), descriptor.id);
        let started = Instant::now();
        let outcome = operation.execute(input, ctx).await;
        let elapsed = started.elapsed();

        let mut result = match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("Operation error for step {}: {}", step.id(), e);
                OperationResult::failure(e.to_string()).with_detail(format!("{:?}", e))
            }
        };

        if result.metadata.execution_time_ms == 0 {
            result.metadata.execution_time_ms = elapsed.as_millis() as u64;
        }
        result.metadata.category.get_or_insert(descriptor.category);
        result.metadata.complexity.get_or_insert(descriptor.complexity);

        if let Some(hint) = descriptor.timeout_hint() {
            if elapsed > hint {
                warn!(
                    "Step {} took {}ms, over its {}ms timeout hint",
                    step.id(),
                    elapsed.as_millis(),
                    hint.as_millis()
                );
            }
        }

        debug!(
            "Step {} finished in {}ms (success: {}, cost: {})",
            step.id(),
            elapsed.as_millis(),
            result.success,
            result.metadata.cost
        );
        StepOutcome::Ran(result)
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
