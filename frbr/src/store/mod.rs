//! Relational store abstraction for records and the Work/Edition/Item graph.

pub mod memory;
pub mod postgres;

use std::future::Future;

use crate::error::FrbrResult;
use crate::types::{Record, RecordId, StaleWork, Work, WorkId};

/// Projection of a record returned by identifier matching during blocking.
///
/// Blocking only needs the title and identifier set of matched records, so
/// the full rows are not loaded until the candidate pool is final.
#[derive(Debug, Clone)]
pub struct MatchedRecord {
    pub id: RecordId,
    pub title: Option<String>,
    pub identifiers: Vec<String>,
}

/// Trait for the relational surface consumed by the clustering core.
///
/// Implementations must support set-overlap queries on identifier arrays,
/// batched `IN`-style lookups, and transactional persistence of a clustered
/// work. [`memory::MemoryStore`] provides a complete in-memory implementation
/// for tests and development; [`postgres::PgStore`] is the production store.
pub trait BibStore {
    /// Loads full records by their relational ids.
    fn get_records(
        &self,
        ids: &[RecordId],
    ) -> impl Future<Output = FrbrResult<Vec<Record>>> + Send;

    /// Returns records whose identifier set overlaps the given batch,
    /// excluding already-matched ids and records without a title.
    ///
    /// Callers batch identifiers (100 per query) to respect store limits.
    fn match_identifiers(
        &self,
        identifiers: &[String],
        exclude: &[RecordId],
    ) -> impl Future<Output = FrbrResult<Vec<MatchedRecord>>> + Send;

    /// Persists a built work and marks the contributing records as clustered,
    /// all within a single transaction.
    ///
    /// Identifiers are deduplicated by `(authority, value)` and links by
    /// exact URL against existing rows, whose ids are reused. Any existing
    /// work sharing at least one identifier triggers a merge: the oldest
    /// work's id, uuid, and creation timestamp are adopted by `work`, and
    /// every other match is returned as stale for deletion by the caller.
    ///
    /// On success `work.id` is populated and the contributing records carry
    /// `cluster_status = true`, `frbr_status = complete`, `state = clustered`.
    fn save_clustered_work(
        &self,
        work: &mut Work,
        record_ids: &[RecordId],
    ) -> impl Future<Output = FrbrResult<Vec<StaleWork>>> + Send;

    /// Deletes stale works in their own transaction.
    ///
    /// Runs separately from [`BibStore::save_clustered_work`] so that a crash
    /// mid-delete cannot corrupt the index update that follows.
    fn delete_works(&self, ids: &[WorkId]) -> impl Future<Output = FrbrResult<()>> + Send;
}
