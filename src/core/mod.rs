//! Core domain models for Pipeline
//!
//! This module defines the fundamental data structures that represent
//! operations, steps, pipelines and the per-run execution context.

pub mod condition;
pub mod config;
pub mod context;
pub(crate) mod graph;
pub mod operation;
pub mod pipeline;
pub mod registry;
pub mod result;
pub mod step;

pub use condition::{ConditionPattern, InputTransform, NamedCondition, NamedTransform, StepCondition};
pub use context::{ContextError, ExecutionContext, RunIdentity, SharedStore};
pub use operation::{
    ComplexityCostEstimator, ComposedOperation, Complexity, CostEstimator, FixedCostEstimator, Operation,
    OperationCategory, OperationDescriptor, OperationError, ResourceRequirements, ValidationResult, Work,
    WorkOutput,
};
pub use pipeline::{Pipeline, PipelineMetadata, PipelineValidation, ValidationIssue};
pub use registry::{OperationFactory, OperationRegistry};
pub use result::{OperationResult, PipelineResult, ResultMetadata, TokenUsage};
pub use step::Step;
