//! Declarative step guards and input transforms
//!
//! Both are plain data: they can be inspected, printed and built from config.
//! Custom logic goes through `Named` variants that hold a plain `fn`, so a
//! step never captures runtime state.

use crate::core::context::ExecutionContext;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

/// Pattern for matching step output (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Simple string contains match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text.contains(pattern),
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }
}

impl fmt::Display for ConditionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionPattern::Simple(s) => write!(f, "{:?}", s),
            ConditionPattern::Regex(r) => write!(f, "/{}/", r.as_str()),
        }
    }
}

/// A guard implemented as a named function
#[derive(Clone, Copy)]
pub struct NamedCondition {
    pub name: &'static str,
    pub func: fn(&ExecutionContext) -> bool,
}

impl fmt::Debug for NamedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedCondition({})", self.name)
    }
}

/// Guard deciding whether a step runs
#[derive(Debug, Clone)]
pub enum StepCondition {
    /// The step ran and succeeded
    Succeeded(String),
    /// The step ran (was not skipped)
    Ran(String),
    /// The step's output (optionally at a JSON pointer) matches a pattern
    OutputMatches {
        step: String,
        pointer: Option<String>,
        pattern: ConditionPattern,
    },
    /// The shared store holds the key
    StoreHas(String),
    Not(Box<StepCondition>),
    All(Vec<StepCondition>),
    Any(Vec<StepCondition>),
    Named(NamedCondition),
}

impl StepCondition {
    pub fn evaluate(&self, ctx: &ExecutionContext) -> bool {
        match self {
            StepCondition::Succeeded(step) => ctx.prior_result(step).is_some_and(|r| r.success),
            StepCondition::Ran(step) => ctx.prior_result(step).is_some(),
            StepCondition::OutputMatches { step, pointer, pattern } => {
                let Some(data) = ctx.step_output(step) else {
                    return false;
                };
                let value = match pointer {
                    Some(p) => match data.pointer(p) {
                        Some(v) => v,
                        None => return false,
                    },
                    None => data,
                };
                match value {
                    Value::String(s) => pattern.matches(s),
                    other => pattern.matches(&other.to_string()),
                }
            }
            StepCondition::StoreHas(key) => ctx.shared().contains(key),
            StepCondition::Not(inner) => !inner.evaluate(ctx),
            StepCondition::All(conditions) => conditions.iter().all(|c| c.evaluate(ctx)),
            StepCondition::Any(conditions) => conditions.iter().any(|c| c.evaluate(ctx)),
            StepCondition::Named(named) => (named.func)(ctx),
        }
    }
}

impl fmt::Display for StepCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepCondition::Succeeded(step) => write!(f, "succeeded({})", step),
            StepCondition::Ran(step) => write!(f, "ran({})", step),
            StepCondition::OutputMatches { step, pointer, pattern } => match pointer {
                Some(p) => write!(f, "{}{} ~ {}", step, p, pattern),
                None => write!(f, "{} ~ {}", step, pattern),
            },
            StepCondition::StoreHas(key) => write!(f, "store_has({})", key),
            StepCondition::Not(inner) => write!(f, "not({})", inner),
            StepCondition::All(items) => write_list(f, "all", items),
            StepCondition::Any(items) => write_list(f, "any", items),
            StepCondition::Named(named) => write!(f, "{}()", named.name),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, items: &[StepCondition]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, ")")
}

/// A transform implemented as a named function
#[derive(Clone, Copy)]
pub struct NamedTransform {
    pub name: &'static str,
    pub func: fn(&Value, &ExecutionContext) -> Value,
}

impl fmt::Debug for NamedTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamedTransform({})", self.name)
    }
}

/// Computes a step's operation input from the pipeline input and prior results
#[derive(Debug, Clone, Default)]
pub enum InputTransform {
    /// Reuse the pipeline's input unchanged
    #[default]
    PassThrough,
    /// The data payload of a prior step (null if absent)
    StepOutput(String),
    /// A value inside the pipeline input, by JSON pointer (null if absent)
    Pointer(String),
    /// A shared store entry (null if absent)
    FromStore(String),
    /// Object keyed by step id, optionally with the pipeline input under "input"
    Merge {
        include_input: bool,
        steps: Vec<String>,
    },
    Named(NamedTransform),
}

impl InputTransform {
    pub fn apply(&self, raw: &Value, ctx: &ExecutionContext) -> Value {
        match self {
            InputTransform::PassThrough => raw.clone(),
            InputTransform::StepOutput(step) => ctx.step_output(step).cloned().unwrap_or(Value::Null),
            InputTransform::Pointer(pointer) => raw.pointer(pointer).cloned().unwrap_or(Value::Null),
            InputTransform::FromStore(key) => ctx.shared().get(key).unwrap_or(Value::Null),
            InputTransform::Merge { include_input, steps } => {
                let mut merged = Map::new();
                if *include_input {
                    merged.insert("input".to_string(), raw.clone());
                }
                for step in steps {
                    let output = ctx.step_output(step).cloned().unwrap_or(Value::Null);
                    merged.insert(step.clone(), output);
                }
                Value::Object(merged)
            }
            InputTransform::Named(named) => (named.func)(raw, ctx),
        }
    }
}
