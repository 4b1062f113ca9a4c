//! Execution scheduler - determines which steps to run next

use crate::core::{Pipeline, Step};
use crate::execution::engine::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Strategy for scheduling step execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingStrategy {
    /// Execute steps in dependency order, one at a time
    #[default]
    Sequential,

    /// Execute every ready step concurrently, wavefront by wavefront
    Parallel,
}

/// Tracks which steps of one run have executed and hands out what comes next
pub struct ExecutionScheduler<'p> {
    pipeline: &'p Pipeline,
    executed: HashSet<String>,
}

impl<'p> ExecutionScheduler<'p> {
    pub fn new(pipeline: &'p Pipeline) -> Self {
        Self {
            pipeline,
            executed: HashSet::new(),
        }
    }

    /// Whole-pipeline order for the sequential strategy
    pub fn sequential_order(&self) -> Result<Vec<&'p Step>, EngineError> {
        let order = self
            .pipeline
            .topological_order()
            .map_err(|cycle| EngineError::CircularDependency { steps: cycle })?;

        order
            .iter()
            .map(|id| {
                self.pipeline
                    .step(id)
                    .ok_or_else(|| EngineError::Internal(format!("step '{}' vanished from pipeline", id)))
            })
            .collect()
    }

    /// Every not-yet-executed step whose dependencies have all executed, in declaration order
    ///
    /// An empty ready set while steps remain means the rest of the graph can
    /// never become ready; the error says whether that is a missing
    /// dependency or a cycle.
    pub fn next_wavefront(&self) -> Result<Vec<&'p Step>, EngineError> {
        let ready = self.pipeline.ready_steps(&self.executed);
        if !ready.is_empty() || self.is_complete() {
            return Ok(ready);
        }

        let remaining = self.remaining();
        for step in &remaining {
            for dep in step.dependencies() {
                if self.pipeline.step(dep).is_none() {
                    return Err(EngineError::MissingDependency {
                        step: step.id().to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Err(EngineError::CircularDependency {
            steps: remaining.iter().map(|s| s.id().to_string()).collect(),
        })
    }

    pub fn mark_executed(&mut self, step_id: &str) {
        self.executed.insert(step_id.to_string());
    }

    pub fn executed(&self) -> &HashSet<String> {
        &self.executed
    }

    /// Steps not yet executed, in declaration order
    pub fn remaining(&self) -> Vec<&'p Step> {
        self.pipeline
            .steps()
            .iter()
            .filter(|s| !self.executed.contains(s.id()))
            .collect()
    }

    /// Check if every step has executed
    pub fn is_complete(&self) -> bool {
        self.pipeline.steps().iter().all(|s| self.executed.contains(s.id()))
    }
}
