//! Main execution engine - orchestrates a whole pipeline run

use crate::core::{
    ContextError, ExecutionContext, OperationResult, Pipeline, PipelineResult, PipelineValidation, Step,
};
use crate::execution::executor::panic_message;
use crate::execution::{ExecutionScheduler, SchedulingStrategy, StepExecutor, StepOutcome};
use crate::status::{
    progress_percent, ExecutionStatus, ExecutionStatusTracker, LifecycleState, StatusError, StatusUpdate, StepRecord,
};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that abort a run before or between steps
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pipeline validation failed: {0}")]
    Validation(PipelineValidation),

    #[error("Step '{step}' depends on missing step '{dependency}'")]
    MissingDependency { step: String, dependency: String },

    #[error("Circular dependency detected among steps: {}", .steps.join(", "))]
    CircularDependency { steps: Vec<String> },

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("Internal engine error: {0}")]
    Internal(String),
}

/// Main pipeline execution engine
///
/// Holds no per-run state; one engine can drive any number of runs.
pub struct ExecutionEngine {
    strategy: SchedulingStrategy,
    executor: StepExecutor,
    tracker: Arc<ExecutionStatusTracker>,
}

impl ExecutionEngine {
    pub fn new(strategy: SchedulingStrategy, tracker: Arc<ExecutionStatusTracker>) -> Self {
        Self {
            strategy,
            executor: StepExecutor::new(),
            tracker,
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    pub fn tracker(&self) -> &Arc<ExecutionStatusTracker> {
        &self.tracker
    }

    /// Execute the entire pipeline
    ///
    /// Never fails: validation problems, step failures and internal errors
    /// all come back as an unsuccessful [`PipelineResult`].
    pub async fn execute(&self, pipeline: &Pipeline, input: Value, ctx: &mut ExecutionContext) -> PipelineResult {
        let started = Instant::now();
        info!(
            "Starting pipeline execution: {} ({}) with {:?} strategy",
            pipeline.name(),
            ctx.request_id(),
            self.strategy
        );

        self.track(
            ctx,
            StatusUpdate::new()
                .pipeline(pipeline.id())
                .state(LifecycleState::Running)
                .total_steps(pipeline.len())
                .progress(0),
        )
        .await;

        let mut result = PipelineResult::default();
        let outcome = AssertUnwindSafe(self.run(pipeline, &input, ctx, &mut result))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(EngineError::Internal(format!("panicked: {}", panic_message(panic.as_ref()))))
            });
        match outcome {
            Ok(()) => result.success = result.error.is_none(),
            Err(e) => {
                error!("Pipeline {} aborted: {}", pipeline.name(), e);
                result.success = false;
                result.error = Some(e.to_string());
            }
        }
        result.total_time_ms = started.elapsed().as_millis() as u64;

        if result.success {
            info!(
                "Pipeline {} completed in {}ms (cost {:.2})",
                pipeline.name(),
                result.total_time_ms,
                result.total_cost
            );
            self.track(ctx, StatusUpdate::new().state(LifecycleState::Completed).progress(100))
                .await;
        } else {
            let message = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
            warn!("Pipeline {} failed: {}", pipeline.name(), message);
            self.track(ctx, StatusUpdate::new().state(LifecycleState::Failed).error(message))
                .await;
        }

        result
    }

    /// Current status of a request
    pub async fn get_status(&self, request_id: &str) -> Result<ExecutionStatus, StatusError> {
        self.tracker.get_status(request_id).await
    }

    async fn run(
        &self,
        pipeline: &Pipeline,
        input: &Value,
        ctx: &mut ExecutionContext,
        result: &mut PipelineResult,
    ) -> Result<(), EngineError> {
        let validation = pipeline.validate();
        if !validation.is_valid {
            return Err(EngineError::Validation(validation));
        }

        match self.strategy {
            SchedulingStrategy::Sequential => self.run_sequential(pipeline, input, ctx, result).await,
            SchedulingStrategy::Parallel => self.run_wavefronts(pipeline, input, ctx, result).await,
        }
    }

    /// One step at a time in topological order
    async fn run_sequential(
        &self,
        pipeline: &Pipeline,
        input: &Value,
        ctx: &mut ExecutionContext,
        result: &mut PipelineResult,
    ) -> Result<(), EngineError> {
        let order = ExecutionScheduler::new(pipeline).sequential_order()?;
        let total = pipeline.len();
        let mut completed = 0;

        for step in order {
            let step_id = step.id().to_string();
            self.track(
                ctx,
                StatusUpdate::new()
                    .current_step(Some(step_id.clone()))
                    .active_steps(vec![step_id.clone()]),
            )
            .await;

            let outcome = self.executor.execute(step, input, ctx).await;
            if let StepOutcome::Ran(step_result) = &outcome {
                store_output(step, step_result, ctx)?;
            }
            if !outcome.is_failure() {
                completed += 1;
            }
            self.track_finished(ctx, &step_id, &outcome, progress_percent(completed, total), Vec::new())
                .await;

            result.wavefronts.push(vec![step_id.clone()]);
            if let Some(message) = fold_outcome(&step_id, outcome, ctx, result) {
                result.error = Some(format!("Step {} failed: {}", step_id, message));
                return Ok(());
            }
        }

        Ok(())
    }

    /// Every ready step at once, with a barrier between wavefronts
    async fn run_wavefronts(
        &self,
        pipeline: &Pipeline,
        input: &Value,
        ctx: &mut ExecutionContext,
        result: &mut PipelineResult,
    ) -> Result<(), EngineError> {
        let mut scheduler = ExecutionScheduler::new(pipeline);
        let total = pipeline.len();
        let mut completed = 0;

        while !scheduler.is_complete() {
            let wave = scheduler.next_wavefront()?;
            let wave_ids: Vec<String> = wave.iter().map(|s| s.id().to_string()).collect();
            debug!("Wavefront {}: {:?}", result.wavefronts.len() + 1, wave_ids);

            self.track(
                ctx,
                StatusUpdate::new()
                    .current_step(wave_ids.first().cloned())
                    .active_steps(wave_ids.clone()),
            )
            .await;

            let mut outcomes: HashMap<String, StepOutcome> = HashMap::new();
            let mut store_error: Option<EngineError> = None;
            {
                let shared_ctx: &ExecutionContext = ctx;
                let executor = &self.executor;
                let mut in_flight: FuturesUnordered<_> = wave
                    .iter()
                    .copied()
                    .map(|step| async move { (step, executor.execute(step, input, shared_ctx).await) })
                    .collect();
                let mut active = wave_ids.clone();

                while let Some((step, outcome)) = in_flight.next().await {
                    active.retain(|id| id != step.id());
                    if let StepOutcome::Ran(step_result) = &outcome {
                        if let Err(e) = store_output(step, step_result, shared_ctx) {
                            store_error.get_or_insert(e.into());
                        }
                    }
                    if !outcome.is_failure() {
                        completed += 1;
                    }
                    self.track_finished(
                        shared_ctx,
                        step.id(),
                        &outcome,
                        progress_percent(completed, total),
                        active.clone(),
                    )
                    .await;
                    outcomes.insert(step.id().to_string(), outcome);
                }
            }

            // Results become visible to later wavefronts only after the barrier
            let mut first_failure = None;
            for step_id in &wave_ids {
                scheduler.mark_executed(step_id);
                let outcome = outcomes
                    .remove(step_id)
                    .ok_or_else(|| EngineError::Internal(format!("no outcome for step '{}'", step_id)))?;
                if let Some(message) = fold_outcome(step_id, outcome, ctx, result) {
                    first_failure.get_or_insert_with(|| format!("Step {} failed: {}", step_id, message));
                }
            }
            result.wavefronts.push(wave_ids);

            if let Some(e) = store_error {
                return Err(e);
            }
            if let Some(error) = first_failure {
                result.error = Some(error);
                return Ok(());
            }
        }

        Ok(())
    }

    async fn track_finished(
        &self,
        ctx: &ExecutionContext,
        step_id: &str,
        outcome: &StepOutcome,
        progress: u8,
        active: Vec<String>,
    ) {
        let record = match outcome {
            StepOutcome::Skipped => StepRecord::skipped(step_id),
            StepOutcome::Ran(step_result) => StepRecord::from_result(step_id, step_result),
        };
        let mut update = StatusUpdate::new()
            .current_step(active.first().cloned())
            .active_steps(active)
            .completed_step(record);
        if !outcome.is_failure() {
            update = update.progress(progress);
        }
        self.track(ctx, update).await;
    }

    /// Status problems are logged, never allowed to fail the run
    async fn track(&self, ctx: &ExecutionContext, update: StatusUpdate) {
        if let Err(e) = self.tracker.update(&ctx.identity, update).await {
            warn!("Failed to update status for {}: {}", ctx.request_id(), e);
        }
    }
}

/// Publish a successful step's output under its store key
fn store_output(step: &Step, result: &OperationResult, ctx: &ExecutionContext) -> Result<(), ContextError> {
    if let (Some(key), true) = (step.output_key(), result.success) {
        ctx.shared().insert(key, result.data.clone().unwrap_or(Value::Null))?;
    }
    Ok(())
}

/// Record an outcome into the context and the run result; returns the error message of a failed step
fn fold_outcome(
    step_id: &str,
    outcome: StepOutcome,
    ctx: &mut ExecutionContext,
    result: &mut PipelineResult,
) -> Option<String> {
    match outcome {
        StepOutcome::Skipped => {
            result.record_skip(step_id);
            None
        }
        StepOutcome::Ran(step_result) => {
            let failure = (!step_result.success).then(|| step_result.error_message().to_string());
            ctx.record_result(step_id, step_result.clone());
            result.record(step_id, step_result);
            failure
        }
    }
}
