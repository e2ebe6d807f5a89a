//! # Record Linkage Module
//!
//! Intra-source record linkage over a single dataset. Candidate pairs are chosen
//! by the configured algorithm, split into hash partitions, and scored against
//! the duplicate policy in parallel. Matches are reported as canonical projected
//! pairs.

use crate::canonical::{canonicalize, project_pair, ProjectedPair};
use crate::compare::{compare_values, RecordComparator, StructuralComparator};
use crate::config::default_partition_count;
use crate::error::OracleError;
use crate::expression::{EvaluationContext, Expression};
use crate::model::{Dataset, RecordIndex};
use crate::policy::DuplicatePolicy;
use anyhow::Result;
use rayon::prelude::*;
use rustc_hash::{FxHashSet, FxHasher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::hash::{Hash, Hasher};
use tracing::{debug, instrument};

/// How candidate pairs are selected before scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordLinkageAlgorithm {
    /// Every distinct pair is a candidate
    Naive,
    /// Records sharing the value of any key are candidates
    Blocking { keys: Vec<Expression> },
    /// Records within `window` positions of each other after sorting by a key
    SortedNeighborhood { keys: Vec<Expression>, window: usize },
}

impl RecordLinkageAlgorithm {
    pub fn blocking(key: Expression) -> Self {
        Self::Blocking { keys: vec![key] }
    }

    pub fn sorted_neighborhood(key: Expression, window: usize) -> Self {
        Self::SortedNeighborhood {
            keys: vec![key],
            window,
        }
    }

    pub fn validate(&self) -> Result<(), OracleError> {
        match self {
            Self::Naive => Ok(()),
            Self::Blocking { keys } if keys.is_empty() => Err(OracleError::InvalidAlgorithm(
                "blocking needs at least one key".to_string(),
            )),
            Self::Blocking { .. } => Ok(()),
            Self::SortedNeighborhood { keys, .. } if keys.is_empty() => {
                Err(OracleError::InvalidAlgorithm(
                    "sorted neighborhood needs at least one key".to_string(),
                ))
            }
            Self::SortedNeighborhood { window, .. } if *window < 2 => {
                Err(OracleError::InvalidAlgorithm(format!(
                    "sorted neighborhood window must cover two records, got {window}"
                )))
            }
            Self::SortedNeighborhood { .. } => Ok(()),
        }
    }
}

impl fmt::Display for RecordLinkageAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Naive => write!(f, "naive"),
            Self::Blocking { keys } => write!(f, "blocking({})", join(keys)),
            Self::SortedNeighborhood { keys, window } => {
                write!(f, "sorted_neighborhood({}; window={window})", join(keys))
            }
        }
    }
}

fn join(keys: &[Expression]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shaping of the linkage output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkageInput {
    /// Stable identifier of a record, reported instead of the full record
    pub id_projection: Option<Expression>,
    /// Explicit result shape, takes precedence over the id projection
    pub result_projection: Option<Expression>,
}

impl LinkageInput {
    pub fn set_id_projection(&mut self, projection: Expression) {
        self.id_projection = Some(projection);
    }

    pub fn set_result_projection(&mut self, projection: Expression) {
        self.result_projection = Some(projection);
    }

    /// Projection applied to each side of a reported pair; `None` means identity
    pub fn output_projection(&self) -> Option<&Expression> {
        self.result_projection
            .as_ref()
            .or(self.id_projection.as_ref())
    }
}

/// An implementation whose output the oracle can verify.
pub trait LinkageUnderTest {
    /// Identifies the implementation and its configuration in diagnostics
    fn describe(&self) -> String;

    /// Report every duplicate pair of `dataset` as `[smaller, bigger]`
    fn link(&self, dataset: Dataset, ctx: &EvaluationContext) -> Result<Vec<ProjectedPair>>;
}

/// Candidate pair of dataset slots, `left < right`
type Candidate = (usize, usize);

/// Parallel intra-source record linkage
#[derive(Clone)]
pub struct IntraSourceRecordLinkage {
    algorithm: RecordLinkageAlgorithm,
    policy: DuplicatePolicy,
    input: LinkageInput,
    partition_count: usize,
    comparator: Arc<dyn RecordComparator>,
}

impl IntraSourceRecordLinkage {
    pub fn new(algorithm: RecordLinkageAlgorithm, policy: DuplicatePolicy) -> Self {
        Self {
            algorithm,
            policy,
            input: LinkageInput::default(),
            partition_count: default_partition_count(),
            comparator: Arc::new(StructuralComparator),
        }
    }

    /// Order reported pairs with `comparator` instead of the structural order
    pub fn with_comparator(mut self, comparator: Arc<dyn RecordComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_input(mut self, input: LinkageInput) -> Self {
        self.input = input;
        self
    }

    pub fn with_partitions(mut self, partition_count: usize) -> Self {
        self.partition_count = partition_count.max(1);
        self
    }

    pub fn record_linkage_input(&self) -> &LinkageInput {
        &self.input
    }

    pub fn record_linkage_input_mut(&mut self) -> &mut LinkageInput {
        &mut self.input
    }

    pub fn algorithm(&self) -> &RecordLinkageAlgorithm {
        &self.algorithm
    }

    pub fn policy(&self) -> &DuplicatePolicy {
        &self.policy
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Run linkage on a dedicated pool sized to the partition count
    #[instrument(skip(self, dataset, ctx), fields(records = dataset.len()), level = "debug")]
    pub fn run(&self, dataset: &Dataset, ctx: &EvaluationContext) -> Result<Vec<ProjectedPair>> {
        self.policy.validate()?;
        self.algorithm.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.partition_count)
            .build()?;

        Ok(pool.install(|| {
            // Phase 1: candidate selection
            let candidates = self.candidates(dataset, ctx);

            // Phase 2: hash partitioning of candidates
            let partitioned = self.partition_candidates(candidates);

            // Phase 3: score partitions in parallel
            let matches: Vec<ProjectedPair> = partitioned
                .into_par_iter()
                .flat_map_iter(|batch| self.score_batch(dataset, batch, ctx))
                .collect();

            debug!(
                algorithm = %self.algorithm,
                matches = matches.len(),
                "linkage finished"
            );
            matches
        }))
    }

    fn candidates(&self, dataset: &Dataset, ctx: &EvaluationContext) -> Vec<Candidate> {
        let candidates: Vec<Candidate> = match &self.algorithm {
            RecordLinkageAlgorithm::Naive => dataset
                .distinct_pairs()
                .map(|(left, right)| (left.0, right.0))
                .collect(),
            RecordLinkageAlgorithm::Blocking { keys } => {
                let mut seen = FxHashSet::default();
                for key in keys {
                    let sorted = sort_by_key(dataset, key, ctx);
                    for block in sorted.chunk_by(|a, b| compare_values(&a.1, &b.1).is_eq()) {
                        for (position, left) in block.iter().enumerate() {
                            for right in &block[position + 1..] {
                                seen.insert(ordered(left.0, right.0));
                            }
                        }
                    }
                }
                seen.into_iter().collect()
            }
            RecordLinkageAlgorithm::SortedNeighborhood { keys, window } => {
                let mut seen = FxHashSet::default();
                for key in keys {
                    let sorted = sort_by_key(dataset, key, ctx);
                    for (position, left) in sorted.iter().enumerate() {
                        let end = position.saturating_add(*window).min(sorted.len());
                        for right in &sorted[position + 1..end] {
                            seen.insert(ordered(left.0, right.0));
                        }
                    }
                }
                seen.into_iter().collect()
            }
        };
        debug!(candidates = candidates.len(), "candidate selection finished");
        candidates
    }

    fn partition_candidates(&self, candidates: Vec<Candidate>) -> Vec<Vec<Candidate>> {
        let partition_count = self.partition_count.max(1);
        let mut partitions = vec![Vec::new(); partition_count];
        for candidate in candidates {
            let mut hasher = FxHasher::default();
            candidate.hash(&mut hasher);
            partitions[(hasher.finish() as usize) % partition_count].push(candidate);
        }
        partitions
    }

    fn score_batch<'a>(
        &'a self,
        dataset: &'a Dataset,
        batch: Vec<Candidate>,
        ctx: &'a EvaluationContext,
    ) -> impl Iterator<Item = ProjectedPair> + 'a {
        let projection = self.input.output_projection();
        batch.into_iter().filter_map(move |(left, right)| {
            let left = dataset.get(RecordIndex(left))?;
            let right = dataset.get(RecordIndex(right))?;
            if !self.policy.is_duplicate(left, right, ctx) {
                return None;
            }
            let pair = canonicalize(left, right, self.comparator.as_ref());
            Some(project_pair(pair, projection, ctx))
        })
    }
}

fn ordered(a: usize, b: usize) -> Candidate {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Slots paired with their key value, sorted by key then slot
fn sort_by_key(dataset: &Dataset, key: &Expression, ctx: &EvaluationContext) -> Vec<(usize, Value)> {
    let mut keyed: Vec<(usize, Value)> = dataset
        .records()
        .par_iter()
        .enumerate()
        .map(|(index, record)| (index, key.evaluate(record.value(), ctx)))
        .collect();
    keyed.sort_by(|a, b| compare_values(&a.1, &b.1).then(a.0.cmp(&b.0)));
    keyed
}

impl fmt::Debug for IntraSourceRecordLinkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntraSourceRecordLinkage")
            .field("algorithm", &self.algorithm)
            .field("policy", &self.policy)
            .field("input", &self.input)
            .field("partition_count", &self.partition_count)
            .finish_non_exhaustive()
    }
}

impl LinkageUnderTest for IntraSourceRecordLinkage {
    fn describe(&self) -> String {
        format!(
            "IntraSourceRecordLinkage[{}; {}; partitions={}]",
            self.algorithm, self.policy, self.partition_count
        )
    }

    fn link(&self, dataset: Dataset, ctx: &EvaluationContext) -> Result<Vec<ProjectedPair>> {
        self.run(&dataset, ctx)
    }
}
