//! Pipeline domain model

use crate::core::{context::ExecutionContext, graph::DependencyGraph, step::Step};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Descriptive metadata of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A single structural problem found by [`Pipeline::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("Pipeline has no steps")]
    EmptyPipeline,

    #[error("Duplicate step ID: {0}")]
    DuplicateStepId(String),

    #[error("Step '{step}' depends on non-existent step '{dependency}'")]
    MissingDependency { step: String, dependency: String },

    #[error(
        "Circular dependency detected: {} (steps involved: {})",
        .cycle.join(" -> "),
        .members.join(", ")
    )]
    CircularDependency { cycle: Vec<String>, members: Vec<String> },

    #[error("Steps '{first}' and '{second}' both store their output as '{key}'")]
    DuplicateOutputKey {
        key: String,
        first: String,
        second: String,
    },
}

/// Aggregated validation report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl PipelineValidation {
    /// Step ids involved in any reported cycle
    pub fn cycle_members(&self) -> HashSet<&str> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                ValidationIssue::CircularDependency { cycle, members } => Some(cycle.iter().chain(members)),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

impl fmt::Display for PipelineValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid {
            return write!(f, "valid");
        }
        let messages: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// An immutable dependency graph of steps
///
/// Built once and reused across many executions.
#[derive(Debug, Clone)]
pub struct Pipeline {
    id: String,
    metadata: PipelineMetadata,
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(id: impl Into<String>, metadata: PipelineMetadata, steps: Vec<Step>) -> Self {
        Self {
            id: id.into(),
            metadata,
            steps,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn metadata(&self) -> &PipelineMetadata {
        &self.metadata
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id() == id)
    }

    /// Check the graph's structural integrity, reporting every problem found
    pub fn validate(&self) -> PipelineValidation {
        let mut errors = Vec::new();

        if self.steps.is_empty() {
            errors.push(ValidationIssue::EmptyPipeline);
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(step.id()) {
                errors.push(ValidationIssue::DuplicateStepId(step.id().to_string()));
            }
        }

        for step in &self.steps {
            for dep in step.dependencies() {
                if !seen_ids.contains(dep.as_str()) {
                    errors.push(ValidationIssue::MissingDependency {
                        step: step.id().to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let graph = DependencyGraph::from_steps(&self.steps);
        let components = graph.cyclic_components();
        for cycle in graph.find_cycles() {
            let members = cycle
                .first()
                .and_then(|start| components.iter().find(|c| c.contains(start)))
                .cloned()
                .unwrap_or_else(|| cycle.clone());
            errors.push(ValidationIssue::CircularDependency { cycle, members });
        }

        let mut output_keys: HashMap<&str, &str> = HashMap::new();
        for step in &self.steps {
            if let Some(key) = step.output_key() {
                if let Some(first) = output_keys.insert(key, step.id()) {
                    errors.push(ValidationIssue::DuplicateOutputKey {
                        key: key.to_string(),
                        first: first.to_string(),
                        second: step.id().to_string(),
                    });
                }
            }
        }

        PipelineValidation {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Deterministic execution order consistent with all dependency edges.
    ///
    /// Returns the offending cycle when the graph is not a DAG.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        DependencyGraph::from_steps(&self.steps).topological_order()
    }

    /// Steps not yet executed whose dependencies all are
    pub fn ready_steps(&self, executed: &HashSet<String>) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| !executed.contains(s.id()) && s.dependencies_met(executed))
            .collect()
    }

    /// Sum of per-step cost estimates
    pub fn estimate_cost(&self, input: &Value, ctx: &ExecutionContext) -> f64 {
        self.steps
            .iter()
            .map(|s| s.operation().estimate_cost(&s.resolve_input(input, ctx), ctx))
            .sum()
    }

    /// Worst-case serial time estimate; ignores any concurrency
    pub fn estimate_time(&self, input: &Value, ctx: &ExecutionContext) -> Duration {
        self.steps
            .iter()
            .map(|s| s.operation().estimate_time(&s.resolve_input(input, ctx), ctx))
            .sum()
    }
}
