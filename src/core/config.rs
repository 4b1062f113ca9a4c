//! Pipeline configuration from YAML

use crate::core::{
    condition::{ConditionPattern, InputTransform, StepCondition},
    pipeline::{Pipeline, PipelineMetadata},
    registry::OperationRegistry,
    step::Step,
};
use crate::execution::SchedulingStrategy;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline identifier (defaults to the name)
    #[serde(default)]
    pub id: Option<String>,

    /// Pipeline name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineSettings,

    /// Pipeline steps
    pub steps: Vec<StepConfig>,
}

/// How runs of this pipeline are executed and tracked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default)]
    pub strategy: SchedulingStrategy,

    #[serde(default)]
    pub status: StatusSettings,
}

/// Bounds for the in-memory status store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSettings {
    /// Maximum number of tracked requests
    #[serde(default = "default_status_capacity")]
    pub capacity: usize,

    /// Seconds a record is kept after its last update
    #[serde(default = "default_status_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_status_capacity() -> usize {
    1024
}

fn default_status_ttl_secs() -> u64 {
    3600
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            capacity: default_status_capacity(),
            ttl_secs: default_status_ttl_secs(),
        }
    }
}

impl StatusSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Registered operation name
    pub operation: String,

    /// Parameters handed to the operation factory
    #[serde(default)]
    pub params: Value,

    /// List of step IDs this step depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Guard deciding whether the step runs
    #[serde(default)]
    pub when: Option<ConditionConfig>,

    /// How the operation input is computed
    #[serde(default)]
    pub input: Option<TransformConfig>,

    /// Shared store key for the step's output
    #[serde(default)]
    pub store_as: Option<String>,
}

/// Declarative guard as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionConfig {
    Succeeded(String),
    Ran(String),
    Matches {
        step: String,
        #[serde(default)]
        pointer: Option<String>,
        pattern: String,
        /// Whether to use regex pattern matching
        #[serde(default)]
        use_regex: bool,
    },
    StoreHas(String),
    Not(Box<ConditionConfig>),
    All(Vec<ConditionConfig>),
    Any(Vec<ConditionConfig>),
    Named(String),
}

/// Input transform as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformConfig {
    Passthrough,
    FromStep(String),
    Pointer(String),
    FromStore(String),
    Merge {
        #[serde(default)]
        include_input: bool,
        steps: Vec<String>,
    },
    Named(String),
}

impl ConditionConfig {
    fn compile(&self, registry: &OperationRegistry) -> Result<StepCondition> {
        Ok(match self {
            ConditionConfig::Succeeded(step) => StepCondition::Succeeded(step.clone()),
            ConditionConfig::Ran(step) => StepCondition::Ran(step.clone()),
            ConditionConfig::Matches {
                step,
                pointer,
                pattern,
                use_regex,
            } => {
                let pattern = if *use_regex {
                    ConditionPattern::Regex(
                        Regex::new(pattern).with_context(|| format!("Invalid regex '{}'", pattern))?,
                    )
                } else {
                    ConditionPattern::Simple(pattern.clone())
                };
                StepCondition::OutputMatches {
                    step: step.clone(),
                    pointer: pointer.clone(),
                    pattern,
                }
            }
            ConditionConfig::StoreHas(key) => StepCondition::StoreHas(key.clone()),
            ConditionConfig::Not(inner) => StepCondition::Not(Box::new(inner.compile(registry)?)),
            ConditionConfig::All(items) => StepCondition::All(
                items
                    .iter()
                    .map(|c| c.compile(registry))
                    .collect::<Result<_>>()?,
            ),
            ConditionConfig::Any(items) => StepCondition::Any(
                items
                    .iter()
                    .map(|c| c.compile(registry))
                    .collect::<Result<_>>()?,
            ),
            ConditionConfig::Named(name) => StepCondition::Named(
                registry
                    .condition(name)
                    .with_context(|| format!("Unknown condition '{}'", name))?,
            ),
        })
    }
}

impl TransformConfig {
    fn compile(&self, registry: &OperationRegistry) -> Result<InputTransform> {
        Ok(match self {
            TransformConfig::Passthrough => InputTransform::PassThrough,
            TransformConfig::FromStep(step) => InputTransform::StepOutput(step.clone()),
            TransformConfig::Pointer(pointer) => InputTransform::Pointer(pointer.clone()),
            TransformConfig::FromStore(key) => InputTransform::FromStore(key.clone()),
            TransformConfig::Merge { include_input, steps } => InputTransform::Merge {
                include_input: *include_input,
                steps: steps.clone(),
            },
            TransformConfig::Named(name) => InputTransform::Named(
                registry
                    .transform(name)
                    .with_context(|| format!("Unknown transform '{}'", name))?,
            ),
        })
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Config-level checks. Graph checks (missing dependencies, cycles)
    /// belong to [`Pipeline::validate`] once the pipeline is built.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                anyhow::bail!("Step IDs must not be empty");
            }
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
            if step.operation.trim().is_empty() {
                anyhow::bail!("Step '{}' has no operation", step.id);
            }
        }

        if self.engine.status.capacity == 0 {
            anyhow::bail!("engine.status.capacity must be at least 1");
        }

        Ok(())
    }

    /// Identifier of the pipeline this config builds
    pub fn pipeline_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    /// Build the pipeline, resolving operations through `registry`
    pub fn to_pipeline(&self, registry: &OperationRegistry) -> Result<Pipeline> {
        let steps = self
            .steps
            .iter()
            .map(|config| Self::build_step(config, registry))
            .collect::<Result<Vec<_>>>()?;

        Ok(Pipeline::new(
            self.pipeline_id(),
            PipelineMetadata {
                name: self.name.clone(),
                description: self.description.clone(),
                version: self.version.clone(),
            },
            steps,
        ))
    }

    fn build_step(config: &StepConfig, registry: &OperationRegistry) -> Result<Step> {
        let operation = registry
            .create_operation(&config.operation, &config.params)
            .with_context(|| format!("Step '{}'", config.id))?;

        let mut step = Step::new(&config.id, operation).depends_on(config.depends_on.iter().cloned());
        if let Some(when) = &config.when {
            let condition = when
                .compile(registry)
                .with_context(|| format!("Step '{}' condition", config.id))?;
            step = step.when(condition);
        }
        if let Some(input) = &config.input {
            let transform = input
                .compile(registry)
                .with_context(|| format!("Step '{}' input", config.id))?;
            step = step.with_input(transform);
        }
        if let Some(key) = &config.store_as {
            step = step.store_as(key);
        }
        Ok(step)
    }
}
