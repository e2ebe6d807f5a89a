//! # Canonical Pairs
//!
//! Unordered record pairs are represented as `[smaller, bigger]` under a record
//! comparator, then projected side by side. Both the reference oracle and the
//! linkage engine go through [`canonicalize`] and [`project_pair`], so a pair
//! serializes identically no matter which side discovered it first.

use crate::compare::{compare_values, RecordComparator};
use crate::error::{OracleError, Result};
use crate::expression::{EvaluationContext, Expression};
use crate::model::{Record, RecordIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Projection applied when none is configured
pub const IDENTITY: Expression = Expression::Value;

/// Two records labeled by the comparator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalPair<'a> {
    pub smaller: &'a Record,
    pub bigger: &'a Record,
}

/// Order two records so that `compare(bigger, smaller) >= 0`.
///
/// Ties keep the argument order; tied records are structurally equal under the
/// comparator, so either labeling projects to the same pair.
pub fn canonicalize<'a, C>(x: &'a Record, y: &'a Record, comparator: &C) -> CanonicalPair<'a>
where
    C: RecordComparator + ?Sized,
{
    if comparator.compare(y, x) == Ordering::Less {
        CanonicalPair {
            smaller: y,
            bigger: x,
        }
    } else {
        CanonicalPair {
            smaller: x,
            bigger: y,
        }
    }
}

/// Apply `projection` (identity when `None`) to one record
pub fn project(record: &Record, projection: Option<&Expression>, ctx: &EvaluationContext) -> Value {
    projection
        .unwrap_or(&IDENTITY)
        .evaluate(record.value(), ctx)
}

/// Project both sides of a canonical pair, smaller first
pub fn project_pair(
    pair: CanonicalPair<'_>,
    projection: Option<&Expression>,
    ctx: &EvaluationContext,
) -> ProjectedPair {
    ProjectedPair(
        project(pair.smaller, projection, ctx),
        project(pair.bigger, projection, ctx),
    )
}

/// Canonicalize, project and collect one duplicate pair.
///
/// A record paired with its own dataset slot is a caller error.
pub fn emit_candidate<C>(
    left: (RecordIndex, &Record),
    right: (RecordIndex, &Record),
    comparator: &C,
    projection: Option<&Expression>,
    ctx: &EvaluationContext,
    sink: &mut PairSet,
) -> Result<()>
where
    C: RecordComparator + ?Sized,
{
    if left.0 == right.0 {
        return Err(OracleError::SelfPair(left.0));
    }
    let pair = canonicalize(left.1, right.1, comparator);
    sink.insert(project_pair(pair, projection, ctx));
    Ok(())
}

/// A projected pair, serialized as the 2-element array `[smaller, bigger]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedPair(pub Value, pub Value);

impl ProjectedPair {
    pub fn new(smaller: Value, bigger: Value) -> Self {
        Self(smaller, bigger)
    }

    pub fn smaller(&self) -> &Value {
        &self.0
    }

    pub fn bigger(&self) -> &Value {
        &self.1
    }

    /// The same pair with its sides swapped
    pub fn reversed(&self) -> Self {
        Self(self.1.clone(), self.0.clone())
    }

    pub fn to_value(&self) -> Value {
        Value::Array(vec![self.0.clone(), self.1.clone()])
    }
}

impl Ord for ProjectedPair {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(&self.0, &other.0).then_with(|| compare_values(&self.1, &other.1))
    }
}

impl PartialOrd for ProjectedPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ProjectedPair {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ProjectedPair {}

impl fmt::Display for ProjectedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

/// Order-irrelevant collection of projected pairs.
///
/// Multiplicity is kept, so a pair reported twice differs from one reported once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairSet {
    pairs: BTreeMap<ProjectedPair, usize>,
    total: usize,
}

impl PairSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pair: ProjectedPair) {
        *self.pairs.entry(pair).or_insert(0) += 1;
        self.total += 1;
    }

    /// Number of pairs counting repeats
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn contains(&self, pair: &ProjectedPair) -> bool {
        self.pairs.contains_key(pair)
    }

    pub fn count(&self, pair: &ProjectedPair) -> usize {
        self.pairs.get(pair).copied().unwrap_or(0)
    }

    /// Pairs in canonical order, repeated by multiplicity
    pub fn iter(&self) -> impl Iterator<Item = &ProjectedPair> + '_ {
        self.pairs
            .iter()
            .flat_map(|(pair, count)| std::iter::repeat(pair).take(*count))
    }

    /// Differences of `actual` against `self` as the expected side
    pub fn diff(&self, actual: &PairSet) -> PairSetDiff {
        let mut missing = Vec::new();
        let mut unexpected = Vec::new();

        for (pair, &expected_count) in &self.pairs {
            let actual_count = actual.count(pair);
            for _ in actual_count..expected_count {
                missing.push(pair.clone());
            }
        }
        for (pair, &actual_count) in &actual.pairs {
            let expected_count = self.count(pair);
            for _ in expected_count..actual_count {
                unexpected.push(pair.clone());
            }
        }

        let mut misordered = Vec::new();
        unexpected.retain(|pair| {
            let reversed = pair.reversed();
            match missing.iter().position(|candidate| *candidate == reversed) {
                Some(position) => {
                    missing.swap_remove(position);
                    misordered.push(pair.clone());
                    false
                }
                None => true,
            }
        });
        missing.sort();

        PairSetDiff {
            expected_len: self.len(),
            actual_len: actual.len(),
            missing,
            unexpected,
            misordered,
        }
    }
}

impl FromIterator<ProjectedPair> for PairSet {
    fn from_iter<T: IntoIterator<Item = ProjectedPair>>(iter: T) -> Self {
        let mut set = Self::new();
        for pair in iter {
            set.insert(pair);
        }
        set
    }
}

impl Extend<ProjectedPair> for PairSet {
    fn extend<T: IntoIterator<Item = ProjectedPair>>(&mut self, iter: T) {
        for pair in iter {
            self.insert(pair);
        }
    }
}

/// Differences between an expected and an actual pair set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairSetDiff {
    pub expected_len: usize,
    pub actual_len: usize,
    /// Expected pairs the actual side did not report
    pub missing: Vec<ProjectedPair>,
    /// Reported pairs that were not expected
    pub unexpected: Vec<ProjectedPair>,
    /// Reported as `[bigger, smaller]` instead of `[smaller, bigger]`
    pub misordered: Vec<ProjectedPair>,
}

impl PairSetDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.misordered.is_empty()
    }
}

fn write_pairs(f: &mut fmt::Formatter<'_>, label: &str, pairs: &[ProjectedPair]) -> fmt::Result {
    if pairs.is_empty() {
        return Ok(());
    }
    write!(f, "; {label} {}:", pairs.len())?;
    for pair in pairs {
        write!(f, " {pair}")?;
    }
    Ok(())
}

impl fmt::Display for PairSetDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "expected {} pairs, got {}",
            self.expected_len, self.actual_len
        )?;
        write_pairs(f, "missing", &self.missing)?;
        write_pairs(f, "unexpected", &self.unexpected)?;
        write_pairs(f, "misordered", &self.misordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::StructuralComparator;
    use serde_json::json;

    fn person(id: u64, first: &str, age: u64) -> Record {
        Record::new(json!({"id": id, "first name": first, "age": age}))
    }

    #[test]
    fn test_canonicalize_is_commutative() {
        let a = person(2, "charles", 70);
        let b = person(7, "charles", 69);

        let forward = canonicalize(&a, &b, &StructuralComparator);
        let backward = canonicalize(&b, &a, &StructuralComparator);

        assert_eq!(forward, backward);
        assert_eq!(forward.smaller, &b);
        assert_eq!(forward.bigger, &a);
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let a = person(0, "albert", 80);
        let b = person(5, "albert", 80);

        let once = canonicalize(&b, &a, &StructuralComparator);
        let twice = canonicalize(once.smaller, once.bigger, &StructuralComparator);
        assert_eq!(once, twice);
        assert_ne!(
            StructuralComparator.compare(twice.bigger, twice.smaller),
            Ordering::Less
        );
    }

    #[test]
    fn test_canonicalize_ties_keep_argument_order() {
        let a = person(1, "berta", 70);
        let b = a.clone();
        let pair = canonicalize(&a, &b, &StructuralComparator);
        assert!(std::ptr::eq(pair.smaller, &a));
        assert!(std::ptr::eq(pair.bigger, &b));
    }

    #[test]
    fn test_emit_projects_each_side_once() {
        let a = person(4, "elma", 60);
        let b = person(8, "elmar", 60);
        let ctx = EvaluationContext::new();
        let mut sink = PairSet::new();
        let projection = Expression::field("id");

        emit_candidate(
            (RecordIndex(8), &b),
            (RecordIndex(4), &a),
            &StructuralComparator,
            Some(&projection),
            &ctx,
            &mut sink,
        )
        .unwrap();

        assert_eq!(ctx.evaluation_count(), 2);
        assert!(sink.contains(&ProjectedPair::new(json!(4), json!(8))));
    }

    #[test]
    fn test_emit_defaults_to_identity() {
        let a = person(0, "albert", 80);
        let b = person(5, "albert", 80);
        let ctx = EvaluationContext::new();
        let mut sink = PairSet::new();

        emit_candidate(
            (RecordIndex(0), &a),
            (RecordIndex(5), &b),
            &StructuralComparator,
            None,
            &ctx,
            &mut sink,
        )
        .unwrap();

        let expected = ProjectedPair::new(a.value().clone(), b.value().clone());
        assert_eq!(sink.iter().collect::<Vec<_>>(), vec![&expected]);
    }

    #[test]
    fn test_emit_rejects_self_pair() {
        let a = person(3, "dagmar", 75);
        let ctx = EvaluationContext::new();
        let mut sink = PairSet::new();

        let err = emit_candidate(
            (RecordIndex(3), &a),
            (RecordIndex(3), &a),
            &StructuralComparator,
            None,
            &ctx,
            &mut sink,
        )
        .unwrap_err();

        assert!(matches!(err, OracleError::SelfPair(RecordIndex(3))));
        assert!(err.is_configuration());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_pair_set_ignores_order_of_insertion() {
        let first = ProjectedPair::new(json!(0), json!(5));
        let second = ProjectedPair::new(json!(1), json!(6));

        let a: PairSet = vec![first.clone(), second.clone()].into_iter().collect();
        let b: PairSet = vec![second, first].into_iter().collect();
        assert_eq!(a, b);
        assert!(a.diff(&b).is_empty());
    }

    #[test]
    fn test_diff_classifies_differences() {
        let expected: PairSet = vec![
            ProjectedPair::new(json!(0), json!(5)),
            ProjectedPair::new(json!(1), json!(6)),
            ProjectedPair::new(json!(7), json!(2)),
        ]
        .into_iter()
        .collect();
        let actual: PairSet = vec![
            ProjectedPair::new(json!(0), json!(5)),
            ProjectedPair::new(json!(0), json!(5)),
            ProjectedPair::new(json!(2), json!(7)),
        ]
        .into_iter()
        .collect();

        let diff = expected.diff(&actual);
        assert_eq!(diff.missing, vec![ProjectedPair::new(json!(1), json!(6))]);
        assert_eq!(diff.unexpected, vec![ProjectedPair::new(json!(0), json!(5))]);
        assert_eq!(diff.misordered, vec![ProjectedPair::new(json!(2), json!(7))]);
        assert_eq!(
            diff.to_string(),
            "expected 3 pairs, got 3; missing 1: [1, 6]; unexpected 1: [0, 5]; misordered 1: [2, 7]"
        );
    }

    #[test]
    fn test_projected_pair_serializes_as_array() {
        let pair = ProjectedPair::new(json!({"id": 0}), json!({"id": 5}));
        assert_eq!(
            serde_json::to_string(&pair).unwrap(),
            r#"[{"id":0},{"id":5}]"#
        );
        assert_eq!(pair.to_value(), json!([{"id": 0}, {"id": 5}]));
    }
}
