//! Built-in operations for demos, smoke runs and tests

use crate::core::{
    ComposedOperation, Complexity, ExecutionContext, Operation, OperationCategory, OperationDescriptor,
    OperationError, Work, WorkOutput,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Optional `complexity` parameter shared by every built-in
fn complexity_param(params: &Value, default: Complexity) -> Result<Complexity> {
    match params.get("complexity") {
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| anyhow!("invalid complexity: {}", e)),
        None => Ok(default),
    }
}

fn compose<W: Work + 'static>(
    id: &str,
    category: OperationCategory,
    complexity: Complexity,
    work: W,
) -> Arc<dyn Operation> {
    Arc::new(ComposedOperation::new(
        OperationDescriptor::new(id, category, complexity),
        work,
    ))
}

/// Returns a fixed value
pub struct Constant {
    value: Value,
}

#[async_trait]
impl Work for Constant {
    async fn run(&self, _input: Value, _ctx: &ExecutionContext) -> Result<WorkOutput, OperationError> {
        Ok(WorkOutput::data(self.value.clone()))
    }
}

pub fn constant(params: &Value) -> Result<Arc<dyn Operation>> {
    let value = params
        .get("value")
        .cloned()
        .ok_or_else(|| anyhow!("'constant' requires a 'value' parameter"))?;
    Ok(compose(
        "constant",
        OperationCategory::Utility,
        complexity_param(params, Complexity::Low)?,
        Constant { value },
    ))
}

/// Returns its input unchanged
pub struct Echo;

#[async_trait]
impl Work for Echo {
    async fn run(&self, input: Value, _ctx: &ExecutionContext) -> Result<WorkOutput, OperationError> {
        Ok(WorkOutput::data(input))
    }
}

pub fn echo(params: &Value) -> Result<Arc<dyn Operation>> {
    Ok(compose(
        "echo",
        OperationCategory::Transformation,
        complexity_param(params, Complexity::Low)?,
        Echo,
    ))
}

/// Renders a `{{ placeholder }}` template against the input, prior step outputs and the shared store
pub struct Template {
    template: String,
    placeholder: Regex,
}

impl Template {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        Ok(Self {
            template: template.into(),
            placeholder: Regex::new(r"\{\{ ([^{}]+?) \}\}")?,
        })
    }

    fn variables(input: &Value, ctx: &ExecutionContext) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("input".to_string(), render_value(input));
        if let Value::Object(fields) = input {
            for (key, value) in fields {
                vars.insert(format!("input.{}", key), render_value(value));
            }
        }
        for (step_id, result) in ctx.prior_results() {
            if let Some(data) = &result.data {
                vars.insert(format!("steps.{}", step_id), render_value(data));
            }
        }
        for key in ctx.shared().keys() {
            if let Some(value) = ctx.shared().get(&key) {
                vars.insert(format!("store.{}", key), render_value(&value));
            }
        }
        vars
    }

    /// Replace variables in the form {{ variable_name }}
    ///
    /// Single pass over the template: substituted values are never rescanned,
    /// and unknown placeholders are left as written.
    pub fn render(&self, variables: &HashMap<String, String>) -> String {
        self.placeholder
            .replace_all(&self.template, |caps: &Captures| match variables.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Work for Template {
    async fn run(&self, input: Value, ctx: &ExecutionContext) -> Result<WorkOutput, OperationError> {
        let rendered = self.render(&Self::variables(&input, ctx));
        Ok(WorkOutput::data(Value::String(rendered)))
    }
}

pub fn template(params: &Value) -> Result<Arc<dyn Operation>> {
    let template = params
        .get("template")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("'template' requires a string 'template' parameter"))?;
    Ok(compose(
        "template",
        OperationCategory::Generation,
        complexity_param(params, Complexity::Medium)?,
        Template::new(template)?,
    ))
}

/// Sleeps, then returns its input
pub struct Delay {
    duration: Duration,
}

#[async_trait]
impl Work for Delay {
    async fn run(&self, input: Value, _ctx: &ExecutionContext) -> Result<WorkOutput, OperationError> {
        tokio::time::sleep(self.duration).await;
        Ok(WorkOutput::data(input)
            .with_explanation(format!("Waited {}ms", self.duration.as_millis())))
    }
}

pub fn delay(params: &Value) -> Result<Arc<dyn Operation>> {
    let millis = params
        .get("millis")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("'delay' requires an integer 'millis' parameter"))?;
    Ok(compose(
        "delay",
        OperationCategory::Utility,
        complexity_param(params, Complexity::Low)?,
        Delay {
            duration: Duration::from_millis(millis),
        },
    ))
}

/// Always fails
pub struct Fail {
    message: String,
}

#[async_trait]
impl Work for Fail {
    async fn run(&self, _input: Value, _ctx: &ExecutionContext) -> Result<WorkOutput, OperationError> {
        Err(OperationError::Provider(self.message.clone()))
    }
}

pub fn fail(params: &Value) -> Result<Arc<dyn Operation>> {
    let message = params
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("operation failed")
        .to_string();
    Ok(compose(
        "fail",
        OperationCategory::Utility,
        complexity_param(params, Complexity::Low)?,
        Fail { message },
    ))
}
