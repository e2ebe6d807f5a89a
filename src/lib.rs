//! # Unilink
//!
//! A verification oracle for intra-source record linkage.
//!
//! The oracle enumerates the duplicate pairs a linkage run must report on a
//! dataset, puts every pair into a deterministic canonical order, shapes it with
//! the configured projection, and compares the result with what the
//! implementation under test reports. Any difference fails the run with the
//! offending configuration in the message.

pub mod canonical;
pub mod compare;
pub mod config;
pub mod error;
pub mod expression;
pub mod fixture;
pub mod generator;
pub mod linkage;
pub mod model;
pub mod oracle;
pub mod policy;

// Re-export main types for convenience
pub use canonical::{canonicalize, CanonicalPair, PairSet, PairSetDiff, ProjectedPair};
pub use compare::{compare_values, RecordComparator, StructuralComparator};
pub use config::{ConfigOverrides, OracleConfig, ProjectionChoice};
pub use error::{OracleError, Result};
pub use expression::{EvaluationContext, Expression};
pub use generator::{reference_generator, ExpectedPairGenerator, PairEmitter};
pub use linkage::{IntraSourceRecordLinkage, LinkageInput, LinkageUnderTest, RecordLinkageAlgorithm};
pub use model::{Dataset, Record, RecordIndex};
pub use oracle::{IntraSourceOracle, OracleCase, OracleReport, OracleState};
pub use policy::{DuplicatePolicy, Similarity};
