//! # Expressions
//!
//! Small projection language used for result shaping, id extraction, blocking
//! keys and similarity inputs. Evaluation is pure and never mutates its input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A pure transformation from one value to another
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// The input value itself
    #[default]
    Value,
    /// Top-level field of an object; missing fields evaluate to null
    Field(String),
    /// Object with one entry per `(name, expression)` mapping
    Object(Vec<(String, Expression)>),
    /// Array with one element per expression
    Array(Vec<Expression>),
    /// A constant, independent of the input
    Constant(Value),
}

impl Expression {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    /// Object creation from `(name, expression)` mappings
    pub fn object<I, K>(mappings: I) -> Self
    where
        I: IntoIterator<Item = (K, Expression)>,
        K: Into<String>,
    {
        Self::Object(
            mappings
                .into_iter()
                .map(|(name, expression)| (name.into(), expression))
                .collect(),
        )
    }

    /// Evaluate against `value`, counting one evaluation in `ctx`
    pub fn evaluate(&self, value: &Value, ctx: &EvaluationContext) -> Value {
        ctx.evaluations.fetch_add(1, Ordering::Relaxed);
        self.eval(value)
    }

    fn eval(&self, value: &Value) -> Value {
        match self {
            Self::Value => value.clone(),
            Self::Field(name) => value
                .as_object()
                .and_then(|object| object.get(name))
                .cloned()
                .unwrap_or(Value::Null),
            Self::Object(mappings) => {
                let object: Map<String, Value> = mappings
                    .iter()
                    .map(|(name, expression)| (name.clone(), expression.eval(value)))
                    .collect();
                Value::Object(object)
            }
            Self::Array(elements) => {
                Value::Array(elements.iter().map(|element| element.eval(value)).collect())
            }
            Self::Constant(constant) => constant.clone(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value => write!(f, "$"),
            Self::Field(name) => write!(f, "$.{name}"),
            Self::Object(mappings) => {
                write!(f, "{{")?;
                for (position, (name, expression)) in mappings.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {expression}")?;
                }
                write!(f, "}}")
            }
            Self::Array(elements) => {
                write!(f, "[")?;
                for (position, element) in elements.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Self::Constant(constant) => write!(f, "{constant}"),
        }
    }
}

/// Evaluation state shared by every expression evaluated during one run.
///
/// Passed explicitly so independent runs never share counters.
#[derive(Debug, Default)]
pub struct EvaluationContext {
    evaluations: AtomicU64,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level evaluations performed so far
    pub fn evaluation_count(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }
}
