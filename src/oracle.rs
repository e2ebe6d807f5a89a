//! # Oracle Module
//!
//! Verifies a record linkage implementation against a reference enumeration of
//! the same dataset. One verification walks
//! `Configuring -> FixtureBuilt -> ExpectedComputed -> UnderTestExecuted` and
//! ends in `Passed` or `Failed`. The expected side and the implementation under
//! test work on independent copies of the fixture and independent evaluation
//! contexts; only the final comparison reads both pair sets.

use crate::canonical::PairSet;
use crate::compare::{RecordComparator, StructuralComparator};
use crate::config::default_partition_count;
use crate::error::{OracleError, Result};
use crate::expression::{EvaluationContext, Expression};
use crate::fixture::{default_fixture, id_projection};
use crate::generator::{reference_generator, ExpectedPairGenerator, PairEmitter};
use crate::linkage::{IntraSourceRecordLinkage, LinkageInput, LinkageUnderTest, RecordLinkageAlgorithm};
use crate::model::Dataset;
use crate::policy::DuplicatePolicy;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// One test configuration: algorithm, policy and result shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleCase {
    pub name: String,
    pub algorithm: RecordLinkageAlgorithm,
    pub policy: DuplicatePolicy,
    /// Report the `id` field instead of full records
    pub use_id: bool,
    pub result_projection: Option<Expression>,
    pub partitions: usize,
}

impl OracleCase {
    pub fn new(
        name: impl Into<String>,
        algorithm: RecordLinkageAlgorithm,
        policy: DuplicatePolicy,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm,
            policy,
            use_id: false,
            result_projection: None,
            partitions: default_partition_count(),
        }
    }

    pub fn with_id(mut self, use_id: bool) -> Self {
        self.use_id = use_id;
        self
    }

    pub fn with_result_projection(mut self, projection: Option<Expression>) -> Self {
        self.result_projection = projection;
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    /// Input shaping handed to the linkage engine
    pub fn linkage_input(&self) -> LinkageInput {
        let mut input = LinkageInput::default();
        if self.use_id {
            input.set_id_projection(id_projection());
        }
        if let Some(projection) = &self.result_projection {
            input.set_result_projection(projection.clone());
        }
        input
    }

    /// Projection of expected pairs; always the one the engine reports with
    pub fn expected_projection(&self) -> Option<Expression> {
        self.linkage_input().output_projection().cloned()
    }

    /// The engine configured with this case's algorithm, policy and shaping
    pub fn system_under_test(&self) -> IntraSourceRecordLinkage {
        IntraSourceRecordLinkage::new(self.algorithm.clone(), self.policy.clone())
            .with_input(self.linkage_input())
            .with_partitions(self.partitions)
    }

    fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.algorithm.validate()
    }
}

impl fmt::Display for OracleCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[algorithm={}, policy={}, use_id={}, projection=",
            self.name, self.algorithm, self.policy, self.use_id
        )?;
        match &self.result_projection {
            Some(projection) => write!(f, "{projection}]"),
            None => write!(f, "$]"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleState {
    Configuring,
    FixtureBuilt,
    ExpectedComputed,
    UnderTestExecuted,
    Passed,
    Failed,
}

/// Outcome of a passing verification
#[derive(Debug, Clone)]
pub struct OracleReport {
    pub case: String,
    pub expected: PairSet,
    pub actual: PairSet,
    /// Expression evaluations spent on the expected side
    pub expected_evaluations: u64,
}

/// Reference oracle for intra-source record linkage.
pub struct IntraSourceOracle {
    case: OracleCase,
    generator: Box<dyn ExpectedPairGenerator>,
    comparator: Arc<dyn RecordComparator>,
    fixture: Option<Dataset>,
    state: OracleState,
}

impl IntraSourceOracle {
    pub fn new<G>(case: OracleCase, generator: G) -> Self
    where
        G: ExpectedPairGenerator + 'static,
    {
        Self {
            case,
            generator: Box::new(generator),
            comparator: Arc::new(StructuralComparator),
            fixture: None,
            state: OracleState::Configuring,
        }
    }

    /// Oracle using the reference generator of the case's algorithm
    pub fn reference(case: OracleCase) -> Self {
        let generator = reference_generator(&case.algorithm, case.policy.clone());
        Self {
            case,
            generator,
            comparator: Arc::new(StructuralComparator),
            fixture: None,
            state: OracleState::Configuring,
        }
    }

    /// Replace the default nine-record fixture
    pub fn with_fixture(mut self, fixture: Dataset) -> Self {
        self.fixture = Some(fixture);
        self
    }

    /// Canonical order for both the expected side and the engine built by
    /// [`verify`](Self::verify)
    pub fn with_comparator(mut self, comparator: Arc<dyn RecordComparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn case(&self) -> &OracleCase {
        &self.case
    }

    pub fn state(&self) -> OracleState {
        self.state
    }

    /// Verify the linkage engine configured from this case
    pub fn verify(&mut self) -> Result<OracleReport> {
        let under_test = self
            .case
            .system_under_test()
            .with_comparator(Arc::clone(&self.comparator));
        self.verify_against(&under_test)
    }

    /// Verify an arbitrary implementation against the reference enumeration
    #[instrument(skip(self, under_test), fields(case = %self.case.name))]
    pub fn verify_against(&mut self, under_test: &dyn LinkageUnderTest) -> Result<OracleReport> {
        let outcome = self.run(under_test);
        if outcome.is_err() {
            self.state = OracleState::Failed;
        }
        outcome
    }

    fn run(&mut self, under_test: &dyn LinkageUnderTest) -> Result<OracleReport> {
        self.state = OracleState::Configuring;
        self.case.validate()?;
        if let Some(policy) = self.generator.policy() {
            policy.validate()?;
            if policy != &self.case.policy {
                return Err(OracleError::InvalidPolicy(format!(
                    "expected pairs use `{policy}` but the case links with `{}`",
                    self.case.policy
                )));
            }
        }

        let fixture = self.fixture.clone().unwrap_or_else(default_fixture);
        self.state = OracleState::FixtureBuilt;
        debug!(records = fixture.len(), "fixture built");

        let ctx = EvaluationContext::new();
        let projection = self.case.expected_projection();
        let mut expected = PairSet::new();
        {
            let mut emitter =
                PairEmitter::new(self.comparator.as_ref(), projection.as_ref(), &ctx, &mut expected);
            self.generator.generate(&fixture, &mut emitter)?;
        }
        self.state = OracleState::ExpectedComputed;
        debug!(expected = expected.len(), "expected pairs computed");

        let under_test_ctx = EvaluationContext::new();
        let actual: PairSet = under_test
            .link(fixture.clone(), &under_test_ctx)
            .map_err(OracleError::UnderTest)?
            .into_iter()
            .collect();
        self.state = OracleState::UnderTestExecuted;
        debug!(actual = actual.len(), "implementation under test executed");

        let diff = expected.diff(&actual);
        if !diff.is_empty() {
            self.state = OracleState::Failed;
            let context = format!("{} against {}", self.case, under_test.describe());
            warn!(%context, %diff, "pair sets differ");
            return Err(OracleError::Mismatch { context, diff });
        }

        self.state = OracleState::Passed;
        info!(pairs = expected.len(), "pair sets match");
        Ok(OracleReport {
            case: self.case.to_string(),
            expected,
            actual,
            expected_evaluations: ctx.evaluation_count(),
        })
    }
}

impl fmt::Debug for IntraSourceOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntraSourceOracle")
            .field("case", &self.case)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
