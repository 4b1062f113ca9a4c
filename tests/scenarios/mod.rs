//! Scenario-based tests for storyloom

mod conditions;
mod sequential_order;
mod status_tracking;
mod wavefront;
mod yaml_pipeline;
