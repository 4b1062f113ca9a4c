//! Test utility functions for storyloom
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storyloom::core::config::StatusSettings;
use storyloom::core::{
    Complexity, ExecutionContext, Operation, OperationCategory, OperationDescriptor, OperationError,
    OperationResult, Pipeline, PipelineMetadata, PipelineResult, RunIdentity, Step,
};
use storyloom::execution::{ExecutionEngine, SchedulingStrategy};
use storyloom::status::{ChannelNotifier, ExecutionStatusTracker, ProgressEvent, ProgressEventType};
use tokio::sync::mpsc::UnboundedReceiver;

/// Shared log of operation start order
#[derive(Clone, Default)]
pub struct StartLog(Arc<Mutex<Vec<String>>>);

impl StartLog {
    pub fn record(&self, label: &str) {
        self.0.lock().unwrap().push(label.to_string());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Tracks how many operations run at the same time
#[derive(Clone, Default)]
pub struct ConcurrencyGauge {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

enum Behavior {
    Succeed,
    Fail(String),
    Panic,
    EchoInput,
}

/// Configurable operation for scenario tests
pub struct MockOperation {
    descriptor: OperationDescriptor,
    label: String,
    output: Value,
    cost: Option<f64>,
    delay: Option<Duration>,
    behavior: Behavior,
    log: Option<StartLog>,
    gauge: Option<ConcurrencyGauge>,
    required_field: Option<String>,
}

impl MockOperation {
    pub fn new(label: &str) -> Self {
        Self {
            descriptor: OperationDescriptor::new(label, OperationCategory::Utility, Complexity::Low),
            label: label.to_string(),
            output: json!(label),
            cost: None,
            delay: None,
            behavior: Behavior::Succeed,
            log: None,
            gauge: None,
            required_field: None,
        }
    }

    pub fn complexity(mut self, complexity: Complexity) -> Self {
        self.descriptor = OperationDescriptor::new(&self.label, OperationCategory::Utility, complexity);
        self
    }

    pub fn returning(mut self, output: Value) -> Self {
        self.output = output;
        self
    }

    pub fn echoing(mut self) -> Self {
        self.behavior = Behavior::EchoInput;
        self
    }

    pub fn costing(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn sleeping(mut self, millis: u64) -> Self {
        self.delay = Some(Duration::from_millis(millis));
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub fn logging(mut self, log: &StartLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn gauged(mut self, gauge: &ConcurrencyGauge) -> Self {
        self.gauge = Some(gauge.clone());
        self
    }

    pub fn requiring(mut self, field: &str) -> Self {
        self.required_field = Some(field.to_string());
        self
    }

    pub fn arc(self) -> Arc<dyn Operation> {
        Arc::new(self)
    }
}

#[async_trait]
impl Operation for MockOperation {
    fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    fn validate(&self, input: &Value, _ctx: &ExecutionContext) -> storyloom::core::ValidationResult {
        match &self.required_field {
            Some(field) if input.get(field).is_none() => {
                storyloom::core::ValidationResult::invalid(vec![format!("missing field '{}'", field)])
            }
            _ => storyloom::core::ValidationResult::valid(),
        }
    }

    async fn execute(&self, input: Value, _ctx: &ExecutionContext) -> Result<OperationResult, OperationError> {
        if let Some(log) = &self.log {
            log.record(&self.label);
        }
        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.exit();
        }

        let cost = self.cost.unwrap_or_else(|| self.descriptor.complexity.base_cost());
        match &self.behavior {
            Behavior::Succeed => Ok(OperationResult::success(self.output.clone()).with_cost(cost)),
            Behavior::EchoInput => Ok(OperationResult::success(input).with_cost(cost)),
            Behavior::Fail(message) => Err(OperationError::Provider(message.clone())),
            Behavior::Panic => panic!("{} exploded", self.label),
        }
    }
}

/// Build a pipeline from steps
pub fn pipeline(steps: Vec<Step>) -> Pipeline {
    Pipeline::new(
        "scenario",
        PipelineMetadata {
            name: "Scenario".to_string(),
            ..Default::default()
        },
        steps,
    )
}

/// Engine whose progress events land in the returned channel
pub fn engine_with_events(strategy: SchedulingStrategy) -> (ExecutionEngine, UnboundedReceiver<ProgressEvent>) {
    let (notifier, rx) = ChannelNotifier::channel();
    let tracker = ExecutionStatusTracker::in_memory(&StatusSettings::default(), Arc::new(notifier));
    (ExecutionEngine::new(strategy, Arc::new(tracker)), rx)
}

pub fn context(request_id: &str) -> ExecutionContext {
    ExecutionContext::new(RunIdentity::new("writer", "novel", request_id))
}

/// Run a pipeline once and return the result with the context it ran in
pub async fn run(strategy: SchedulingStrategy, pipeline: &Pipeline, input: Value) -> (PipelineResult, ExecutionContext) {
    let (engine, _events) = engine_with_events(strategy);
    let mut ctx = context("req-test");
    let result = engine.execute(pipeline, input, &mut ctx).await;
    (result, ctx)
}

/// Receive events up to and including the first terminal one
pub async fn collect_until_terminal(rx: &mut UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for progress events")
            .expect("event channel closed");
        let terminal = matches!(
            event.event_type,
            ProgressEventType::Completed | ProgressEventType::Error
        );
        events.push(event);
        if terminal {
            return events;
        }
    }
}

/// Assert pipeline completed successfully
pub fn assert_pipeline_completed(result: &PipelineResult) {
    assert!(result.success, "pipeline failed: {:?}", result.error);
    assert!(result.error.is_none());
}

/// Assert that every listed step ran and succeeded
pub fn assert_steps_succeeded(result: &PipelineResult, step_ids: &[&str]) {
    for id in step_ids {
        let step = result
            .step(id)
            .unwrap_or_else(|| panic!("step '{}' has no result", id));
        assert!(step.success, "step '{}' failed: {:?}", id, step.error);
    }
}

/// Position of a step in the execution order
pub fn position(result: &PipelineResult, step_id: &str) -> usize {
    result
        .execution_order
        .iter()
        .position(|s| s == step_id)
        .unwrap_or_else(|| panic!("step '{}' not in execution order", step_id))
}
