//! storyloom - dependency-ordered pipelines for structured creative writing

pub mod cli;
pub mod core;
pub mod execution;
pub mod operations;
pub mod status;

// Re-export commonly used types
pub use core::{
    ExecutionContext, Operation, OperationRegistry, OperationResult, Pipeline, PipelineResult, RunIdentity, Step,
};
pub use execution::{ExecutionEngine, SchedulingStrategy};
pub use status::{ExecutionStatus, ExecutionStatusTracker, ProgressNotifier};
