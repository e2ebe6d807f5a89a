//! # Structural Comparison
//!
//! Total order over JSON values and records. Values of different kinds order by
//! kind (`null < bool < number < string < array < object`); values of the same
//! kind compare structurally. Objects compare entry by entry in key order, so the
//! result never depends on field insertion order.

use crate::model::Record;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Orders records for canonical pair representation.
pub trait RecordComparator: Send + Sync {
    fn compare(&self, left: &Record, right: &Record) -> Ordering;
}

/// Full structural comparison of record values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralComparator;

impl RecordComparator for StructuralComparator {
    fn compare(&self, left: &Record, right: &Record) -> Ordering {
        compare_values(left.value(), right.value())
    }
}

impl<F> RecordComparator for F
where
    F: Fn(&Record, &Record) -> Ordering + Send + Sync,
{
    fn compare(&self, left: &Record, right: &Record) -> Ordering {
        self(left, right)
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compare two values under the structural total order.
///
/// `Ordering::Equal` is returned only for values that are also `==`.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => compare_sequences(a, b),
        (Value::Object(a), Value::Object(b)) => compare_objects(a, b),
        _ => kind_rank(left).cmp(&kind_rank(right)),
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (integer_of(a), integer_of(b)) {
        return x.cmp(&y);
    }

    let x = a.as_f64().unwrap_or(f64::NAN);
    let y = b.as_f64().unwrap_or(f64::NAN);
    // Integers sort before floats of the same magnitude to keep Equal exact.
    x.total_cmp(&y)
        .then_with(|| integer_of(a).is_none().cmp(&integer_of(b).is_none()))
}

fn integer_of(number: &Number) -> Option<i128> {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
}

fn compare_sequences(a: &[Value], b: &[Value]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = compare_values(x, y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

fn compare_objects(a: &Map<String, Value>, b: &Map<String, Value>) -> Ordering {
    let mut left: Vec<_> = a.iter().collect();
    let mut right: Vec<_> = b.iter().collect();
    left.sort_by(|x, y| x.0.cmp(y.0));
    right.sort_by(|x, y| x.0.cmp(y.0));

    for ((key_a, value_a), (key_b, value_b)) in left.iter().zip(right.iter()) {
        let ordering = key_a
            .cmp(key_b)
            .then_with(|| compare_values(value_a, value_b));
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    left.len().cmp(&right.len())
}
