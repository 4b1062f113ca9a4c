//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{EngineError, ExecutionEngine};
pub use executor::{StepExecutor, StepOutcome};
pub use scheduler::{ExecutionScheduler, SchedulingStrategy};
