//! Operation registry - named factories, conditions and transforms
//!
//! The registry is an ordinary value built at startup and handed to whatever
//! turns configuration into pipelines. Nothing is registered globally.

use crate::core::{
    condition::{NamedCondition, NamedTransform},
    operation::Operation,
};
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds an operation from its step parameters
pub trait OperationFactory: Send + Sync {
    fn create(&self, params: &Value) -> Result<Arc<dyn Operation>>;
}

impl<F> OperationFactory for F
where
    F: Fn(&Value) -> Result<Arc<dyn Operation>> + Send + Sync,
{
    fn create(&self, params: &Value) -> Result<Arc<dyn Operation>> {
        self(params)
    }
}

/// Registry of everything a pipeline config can reference by name
#[derive(Default, Clone)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn OperationFactory>>,
    conditions: HashMap<String, NamedCondition>,
    transforms: HashMap<String, NamedTransform>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation factory; a later registration replaces an earlier one
    pub fn register_operation<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: OperationFactory + 'static,
    {
        self.operations.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_condition(&mut self, condition: NamedCondition) -> &mut Self {
        self.conditions.insert(condition.name.to_string(), condition);
        self
    }

    pub fn register_transform(&mut self, transform: NamedTransform) -> &mut Self {
        self.transforms.insert(transform.name.to_string(), transform);
        self
    }

    /// Instantiate the operation registered under `name`
    pub fn create_operation(&self, name: &str, params: &Value) -> Result<Arc<dyn Operation>> {
        let factory = self
            .operations
            .get(name)
            .ok_or_else(|| anyhow!("Unknown operation '{}'", name))?;
        factory
            .create(params)
            .map_err(|e| anyhow!("Failed to create operation '{}': {}", name, e))
    }

    pub fn condition(&self, name: &str) -> Option<NamedCondition> {
        self.conditions.get(name).copied()
    }

    pub fn transform(&self, name: &str) -> Option<NamedTransform> {
        self.transforms.get(name).copied()
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered operation names, sorted
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.operation_names())
            .field("conditions", &self.conditions.keys().collect::<Vec<_>>())
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}
