//! Configuration objects for the clustering core.

use serde::Deserialize;
use thiserror::Error;

const fn default_max_match_distance() -> u32 {
    4
}

const fn default_max_candidate_records() -> usize {
    10_000
}

const fn default_identifier_batch_size() -> usize {
    100
}

const fn default_lock_ttl_secs() -> u64 {
    60 * 60
}

const fn default_max_clusters() -> usize {
    1_000
}

/// Configuration for a clustering run.
///
/// The defaults reproduce the production constants: four identifier hops, a
/// 10,000-record candidate pool cap, 100-identifier query batches, and a one
/// hour lock lease sized to cover worst-case clustering latency.
#[derive(Clone, Debug, Deserialize)]
pub struct ClusterConfig {
    /// Maximum number of identifier "hops" followed when matching records.
    #[serde(default = "default_max_match_distance")]
    pub max_match_distance: u32,
    /// Maximum number of records allowed in a candidate pool.
    ///
    /// Exceeding this limit fails the run rather than silently truncating,
    /// protecting the clustering step from pathological identifier fan-out.
    #[serde(default = "default_max_candidate_records")]
    pub max_candidate_records: usize,
    /// Number of identifiers sent per store query when matching candidates.
    #[serde(default = "default_identifier_batch_size")]
    pub identifier_batch_size: usize,
    /// Auto-release time of the per-record cluster lock, in seconds.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Hard cap on the number of clusters considered during K selection.
    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            max_match_distance: default_max_match_distance(),
            max_candidate_records: default_max_candidate_records(),
            identifier_batch_size: default_identifier_batch_size(),
            lock_ttl_secs: default_lock_ttl_secs(),
            max_clusters: default_max_clusters(),
        }
    }
}

/// Errors raised by configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_match_distance must be greater than zero")]
    MaxMatchDistanceZero,
    #[error("identifier_batch_size must be greater than zero")]
    IdentifierBatchSizeZero,
    #[error("max_candidate_records must be greater than zero")]
    MaxCandidateRecordsZero,
}

impl ClusterConfig {
    /// Validates clustering configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_match_distance == 0 {
            return Err(ValidationError::MaxMatchDistanceZero);
        }

        if self.identifier_batch_size == 0 {
            return Err(ValidationError::IdentifierBatchSizeZero);
        }

        if self.max_candidate_records == 0 {
            return Err(ValidationError::MaxCandidateRecordsZero);
        }

        Ok(())
    }
}
