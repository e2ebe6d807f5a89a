//! Default constants for unilink configuration.
//!
//! All magic numbers are centralized here with documentation.

// =============================================================================
// Environment
// =============================================================================

/// Prefix of environment variables read by [`super::OracleConfig::load`]
pub const ENV_PREFIX: &str = "UNILINK_";

// =============================================================================
// Linkage Defaults
// =============================================================================

/// Default sorted neighborhood window (records compared with their next two neighbors)
pub const DEFAULT_WINDOW: usize = 3;

/// Default number of scoring partitions when not specified
/// Uses number of CPU cores for optimal parallelism.
pub fn default_partition_count() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
