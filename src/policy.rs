//! # Duplicate Policies
//!
//! A policy pairs a similarity function with a decision threshold. The same
//! policy value configures both the reference enumeration and the linkage
//! engine, so both sides score every pair identically.

use crate::compare::compare_values;
use crate::error::{OracleError, Result};
use crate::expression::{EvaluationContext, Expression};
use crate::model::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Similarity of two records, scored in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// 1 when the evaluated values are structurally equal
    Exact(Expression),
    /// Normalized Levenshtein similarity of string values
    Levenshtein(Expression),
    /// Normalized Damerau-Levenshtein similarity; transpositions cost one edit
    DamerauLevenshtein(Expression),
    /// Jaro-Winkler similarity of string values
    JaroWinkler(Expression),
    /// `1 - |a - b| / max_difference`, floored at 0
    NumericTolerance {
        expression: Expression,
        max_difference: f64,
    },
    /// Lowest score of all children
    Min(Vec<Similarity>),
    /// Arithmetic mean of all children
    Mean(Vec<Similarity>),
}

impl Similarity {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::NumericTolerance { max_difference, .. } => {
                if !max_difference.is_finite() || *max_difference <= 0.0 {
                    return Err(OracleError::InvalidPolicy(format!(
                        "numeric tolerance needs a positive max difference, got {max_difference}"
                    )));
                }
                Ok(())
            }
            Self::Min(children) | Self::Mean(children) => {
                if children.is_empty() {
                    return Err(OracleError::InvalidPolicy(
                        "aggregate similarity needs at least one child".to_string(),
                    ));
                }
                children.iter().try_for_each(Similarity::validate)
            }
            _ => Ok(()),
        }
    }

    /// Score `left` against `right`
    pub fn similarity(&self, left: &Record, right: &Record, ctx: &EvaluationContext) -> f64 {
        match self {
            Self::Exact(expression) => {
                let (a, b) = evaluate_both(expression, left, right, ctx);
                if compare_values(&a, &b) == Ordering::Equal {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Levenshtein(expression) => {
                string_similarity(expression, left, right, ctx, strsim::normalized_levenshtein)
            }
            Self::DamerauLevenshtein(expression) => string_similarity(
                expression,
                left,
                right,
                ctx,
                strsim::normalized_damerau_levenshtein,
            ),
            Self::JaroWinkler(expression) => {
                string_similarity(expression, left, right, ctx, strsim::jaro_winkler)
            }
            Self::NumericTolerance {
                expression,
                max_difference,
            } => {
                let (a, b) = evaluate_both(expression, left, right, ctx);
                match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => (1.0 - (x - y).abs() / max_difference).max(0.0),
                    _ => 0.0,
                }
            }
            Self::Min(children) => children
                .iter()
                .map(|child| child.similarity(left, right, ctx))
                .fold(1.0, f64::min),
            Self::Mean(children) => {
                if children.is_empty() {
                    return 0.0;
                }
                let total: f64 = children
                    .iter()
                    .map(|child| child.similarity(left, right, ctx))
                    .sum();
                total / children.len() as f64
            }
        }
    }
}

fn evaluate_both(
    expression: &Expression,
    left: &Record,
    right: &Record,
    ctx: &EvaluationContext,
) -> (Value, Value) {
    (
        expression.evaluate(left.value(), ctx),
        expression.evaluate(right.value(), ctx),
    )
}

fn string_similarity(
    expression: &Expression,
    left: &Record,
    right: &Record,
    ctx: &EvaluationContext,
    measure: fn(&str, &str) -> f64,
) -> f64 {
    let (a, b) = evaluate_both(expression, left, right, ctx);
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => measure(x, y),
        _ if compare_values(&a, &b) == Ordering::Equal => 1.0,
        _ => 0.0,
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(expression) => write!(f, "exact({expression})"),
            Self::Levenshtein(expression) => write!(f, "levenshtein({expression})"),
            Self::DamerauLevenshtein(expression) => {
                write!(f, "damerau_levenshtein({expression})")
            }
            Self::JaroWinkler(expression) => write!(f, "jaro_winkler({expression})"),
            Self::NumericTolerance {
                expression,
                max_difference,
            } => write!(f, "numeric({expression}, {max_difference})"),
            Self::Min(children) | Self::Mean(children) => {
                let name = if matches!(self, Self::Min(_)) { "min" } else { "mean" };
                write!(f, "{name}(")?;
                for (position, child) in children.iter().enumerate() {
                    if position > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Decides whether two records of one source are duplicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePolicy {
    pub similarity: Similarity,
    pub threshold: f64,
}

impl DuplicatePolicy {
    pub fn new(similarity: Similarity, threshold: f64) -> Self {
        Self {
            similarity,
            threshold,
        }
    }

    /// Reject thresholds outside `[0, 1]` and malformed similarity trees
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(OracleError::InvalidPolicy(format!(
                "threshold must lie in [0, 1], got {}",
                self.threshold
            )));
        }
        self.similarity.validate()
    }

    pub fn is_duplicate(&self, left: &Record, right: &Record, ctx: &EvaluationContext) -> bool {
        self.similarity.similarity(left, right, ctx) >= self.threshold
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >= {}", self.similarity, self.threshold)
    }
}
