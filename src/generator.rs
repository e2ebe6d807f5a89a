//! # Expected Pair Generators
//!
//! Reference enumerations of the pairs a linkage run must report. Each
//! generator is quadratic: it visits every distinct pair and decides
//! candidacy and duplication directly, without the indexing the linkage engine
//! relies on. Found pairs go through [`PairEmitter::emit`].

use crate::canonical::{emit_candidate, PairSet};
use crate::compare::{compare_values, RecordComparator};
use crate::error::Result;
use crate::expression::{EvaluationContext, Expression};
use crate::linkage::RecordLinkageAlgorithm;
use crate::model::{Dataset, Record, RecordIndex};
use crate::policy::DuplicatePolicy;
use serde_json::Value;

/// Collects expected pairs through the canonical orderer and projection
pub struct PairEmitter<'a> {
    comparator: &'a dyn RecordComparator,
    projection: Option<&'a Expression>,
    ctx: &'a EvaluationContext,
    expected: &'a mut PairSet,
}

impl<'a> PairEmitter<'a> {
    pub fn new(
        comparator: &'a dyn RecordComparator,
        projection: Option<&'a Expression>,
        ctx: &'a EvaluationContext,
        expected: &'a mut PairSet,
    ) -> Self {
        Self {
            comparator,
            projection,
            ctx,
            expected,
        }
    }

    /// Record `left` and `right` as an expected duplicate pair
    pub fn emit(&mut self, left: (RecordIndex, &Record), right: (RecordIndex, &Record)) -> Result<()> {
        emit_candidate(
            left,
            right,
            self.comparator,
            self.projection,
            self.ctx,
            self.expected,
        )
    }

    /// Context for policy evaluation during generation
    pub fn context(&self) -> &EvaluationContext {
        self.ctx
    }

    pub fn emitted(&self) -> usize {
        self.expected.len()
    }
}

/// Enumerates the expected duplicates of one dataset.
pub trait ExpectedPairGenerator {
    fn generate(&self, dataset: &Dataset, emitter: &mut PairEmitter<'_>) -> Result<()>;

    /// Policy the generator decides duplicates with, when it carries one
    fn policy(&self) -> Option<&DuplicatePolicy> {
        None
    }
}

impl<F> ExpectedPairGenerator for F
where
    F: Fn(&Dataset, &mut PairEmitter<'_>) -> Result<()>,
{
    fn generate(&self, dataset: &Dataset, emitter: &mut PairEmitter<'_>) -> Result<()> {
        self(dataset, emitter)
    }
}

/// Emit every distinct pair accepted by `is_candidate` and the policy
fn emit_matching<P>(
    dataset: &Dataset,
    policy: &DuplicatePolicy,
    emitter: &mut PairEmitter<'_>,
    mut is_candidate: P,
) -> Result<()>
where
    P: FnMut(RecordIndex, RecordIndex) -> bool,
{
    for (left, right) in dataset.distinct_pairs() {
        if !is_candidate(left, right) {
            continue;
        }
        let (Some(left_record), Some(right_record)) = (dataset.get(left), dataset.get(right))
        else {
            continue;
        };
        if policy.is_duplicate(left_record, right_record, emitter.context()) {
            emitter.emit((left, left_record), (right, right_record))?;
        }
    }
    Ok(())
}

/// Compares all distinct pairs against the policy
#[derive(Debug, Clone)]
pub struct NaiveGenerator {
    pub policy: DuplicatePolicy,
}

impl NaiveGenerator {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self { policy }
    }
}

impl ExpectedPairGenerator for NaiveGenerator {
    fn generate(&self, dataset: &Dataset, emitter: &mut PairEmitter<'_>) -> Result<()> {
        self.policy.validate()?;
        emit_matching(dataset, &self.policy, emitter, |_, _| true)
    }

    fn policy(&self) -> Option<&DuplicatePolicy> {
        Some(&self.policy)
    }
}

/// Pairs sharing the value of any blocking key
#[derive(Debug, Clone)]
pub struct BlockingGenerator {
    pub policy: DuplicatePolicy,
    pub keys: Vec<Expression>,
}

impl ExpectedPairGenerator for BlockingGenerator {
    fn generate(&self, dataset: &Dataset, emitter: &mut PairEmitter<'_>) -> Result<()> {
        self.policy.validate()?;
        let keys = key_values(dataset, &self.keys, emitter.context());
        emit_matching(dataset, &self.policy, emitter, |left, right| {
            keys.iter()
                .any(|values| compare_values(&values[left.0], &values[right.0]).is_eq())
        })
    }

    fn policy(&self) -> Option<&DuplicatePolicy> {
        Some(&self.policy)
    }
}

/// Pairs closer than `window` positions in any key's sort order
#[derive(Debug, Clone)]
pub struct SortedNeighborhoodGenerator {
    pub policy: DuplicatePolicy,
    pub keys: Vec<Expression>,
    pub window: usize,
}

impl ExpectedPairGenerator for SortedNeighborhoodGenerator {
    fn generate(&self, dataset: &Dataset, emitter: &mut PairEmitter<'_>) -> Result<()> {
        self.policy.validate()?;
        let ranks: Vec<Vec<usize>> = key_values(dataset, &self.keys, emitter.context())
            .iter()
            .map(|values| sort_ranks(values))
            .collect();
        emit_matching(dataset, &self.policy, emitter, |left, right| {
            ranks
                .iter()
                .any(|rank| rank[left.0].abs_diff(rank[right.0]) < self.window)
        })
    }

    fn policy(&self) -> Option<&DuplicatePolicy> {
        Some(&self.policy)
    }
}

/// One vector of key values per key, indexed by dataset slot
fn key_values(dataset: &Dataset, keys: &[Expression], ctx: &EvaluationContext) -> Vec<Vec<Value>> {
    keys.iter()
        .map(|key| {
            dataset
                .records()
                .iter()
                .map(|record| key.evaluate(record.value(), ctx))
                .collect()
        })
        .collect()
}

/// Position of each slot after a stable sort by value
fn sort_ranks(values: &[Value]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| compare_values(&values[*a], &values[*b]));
    let mut ranks = vec![0; values.len()];
    for (rank, slot) in order.into_iter().enumerate() {
        ranks[slot] = rank;
    }
    ranks
}

/// Reference generator matching the candidate selection of `algorithm`
pub fn reference_generator(
    algorithm: &RecordLinkageAlgorithm,
    policy: DuplicatePolicy,
) -> Box<dyn ExpectedPairGenerator> {
    match algorithm {
        RecordLinkageAlgorithm::Naive => Box::new(NaiveGenerator::new(policy)),
        RecordLinkageAlgorithm::Blocking { keys } => Box::new(BlockingGenerator {
            policy,
            keys: keys.clone(),
        }),
        RecordLinkageAlgorithm::SortedNeighborhood { keys, window } => {
            Box::new(SortedNeighborhoodGenerator {
                policy,
                keys: keys.clone(),
                window: *window,
            })
        }
    }
}
