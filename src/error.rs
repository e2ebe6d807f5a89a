//! # Errors
//!
//! Failure taxonomy of an oracle run. Configuration problems are raised before
//! any work starts; mismatches carry the failing configuration; failures of the
//! implementation under test pass through untouched.

use crate::canonical::PairSetDiff;
use crate::model::RecordIndex;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum OracleError {
    #[error("invalid duplicate policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid linkage algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("record {0} cannot be paired with itself")]
    SelfPair(RecordIndex),

    #[error("For test {context}: {diff}")]
    Mismatch { context: String, diff: PairSetDiff },

    #[error(transparent)]
    UnderTest(anyhow::Error),
}

impl OracleError {
    /// True for errors raised before the oracle touched any data
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPolicy(_) | Self::InvalidAlgorithm(_) | Self::SelfPair(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
