//! Layered configuration for oracle runs.
//!
//! Configuration is loaded with precedence: overrides > Env vars > Config file > Defaults
//!
//! # Example config file (unilink.toml)
//! ```toml
//! use_id = true
//! projection = "aggregative"
//! partitions = 4
//! window = 3
//! ```

mod defaults;

pub use defaults::*;

use crate::expression::Expression;
use crate::fixture::{aggregative_projection, id_projection};
use crate::linkage::RecordLinkageAlgorithm;
use crate::oracle::OracleCase;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Run-shaping settings shared by every oracle case of one test session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Report stable `id` values instead of full records
    pub use_id: bool,
    /// Result projection applied to both sides of every pair
    pub projection: ProjectionChoice,
    /// Scoring partitions of the linkage engine
    pub partitions: usize,
    /// Window for sorted neighborhood cases
    pub window: usize,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            use_id: false,
            projection: ProjectionChoice::Value,
            partitions: default_partition_count(),
            window: DEFAULT_WINDOW,
        }
    }
}

impl OracleConfig {
    /// Load configuration with precedence: overrides > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - Explicit overrides to apply on top
    pub fn load(
        config_path: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(OracleConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with UNILINK_ prefix
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        // Layer 3: explicit overrides
        figment = figment.merge(Serialized::defaults(overrides));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment and optional config file only (no overrides)
    pub fn from_env(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(config_path, ConfigOverrides::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions == 0 {
            return Err(ConfigError::new("partitions must be at least 1"));
        }
        if self.window < 2 {
            return Err(ConfigError::new(format!(
                "window must cover two records, got {}",
                self.window
            )));
        }
        Ok(())
    }

    /// Copy the run-shaping settings into `case`
    pub fn apply(&self, mut case: OracleCase) -> OracleCase {
        case.use_id = self.use_id;
        case.result_projection = self.projection.expression();
        case.partitions = self.partitions;
        if let RecordLinkageAlgorithm::SortedNeighborhood { window, .. } = &mut case.algorithm {
            *window = self.window;
        }
        case
    }
}

/// Named result projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectionChoice {
    /// Full record value
    #[default]
    Value,
    /// The record's `id` field
    Id,
    /// Only first name (as `name`) and id
    Aggregative,
}

impl ProjectionChoice {
    /// Expression for this choice; `None` is the identity projection
    pub fn expression(self) -> Option<Expression> {
        match self {
            ProjectionChoice::Value => None,
            ProjectionChoice::Id => Some(id_projection()),
            ProjectionChoice::Aggregative => Some(aggregative_projection()),
        }
    }
}

/// Overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_id: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partitions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl ConfigError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DuplicatePolicy, Similarity};
    use std::io::Write;

    fn case() -> OracleCase {
        OracleCase::new(
            "sorted",
            RecordLinkageAlgorithm::sorted_neighborhood(Expression::field("age"), 5),
            DuplicatePolicy::new(Similarity::Exact(Expression::Value), 1.0),
        )
    }

    #[test]
    fn test_default_config() {
        let config = OracleConfig::default();
        assert!(!config.use_id);
        assert_eq!(config.projection, ProjectionChoice::Value);
        assert_eq!(config.window, DEFAULT_WINDOW);
        assert!(config.partitions >= 1);
    }

    #[test]
    fn test_projection_serde() {
        let json = serde_json::to_string(&ProjectionChoice::Aggregative).unwrap();
        assert_eq!(json, "\"aggregative\"");

        let choice: ProjectionChoice = serde_json::from_str("\"id\"").unwrap();
        assert_eq!(choice, ProjectionChoice::Id);
        assert_eq!(ProjectionChoice::Value.expression(), None);
    }

    #[test]
    fn test_file_then_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "use_id = true\nprojection = \"aggregative\"\npartitions = 2").unwrap();

        let from_file = OracleConfig::from_env(Some(file.path())).unwrap();
        assert!(from_file.use_id);
        assert_eq!(from_file.projection, ProjectionChoice::Aggregative);
        assert_eq!(from_file.partitions, 2);

        let overridden = OracleConfig::load(
            Some(file.path()),
            ConfigOverrides {
                partitions: Some(6),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(overridden.partitions, 6);
        assert!(overridden.use_id);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = OracleConfig::load(
            None,
            ConfigOverrides {
                window: Some(1),
                ..ConfigOverrides::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("window"));
    }

    #[test]
    fn test_apply_shapes_case() {
        let config = OracleConfig {
            use_id: true,
            projection: ProjectionChoice::Id,
            partitions: 3,
            window: 4,
        };
        let case = config.apply(case());
        assert!(case.use_id);
        assert_eq!(case.result_projection, Some(id_projection()));
        assert_eq!(case.partitions, 3);
        assert_eq!(
            case.algorithm,
            RecordLinkageAlgorithm::sorted_neighborhood(Expression::field("age"), 4)
        );
    }
}
