//! End-to-end clustering orchestration.
//!
//! A run locks its seed record, finds the candidate pool, clusters it into
//! editions, builds the work aggregate, and persists it. The relational save
//! commits first; stale works from a merge are deleted in a second
//! transaction and search index maintenance runs last, with index failures
//! logged but never failing the run.

use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bail;
use crate::blocking::CandidateFinder;
use crate::build;
use crate::cluster::EditionClusterer;
use crate::config::ClusterConfig;
use crate::error::{ErrorKind, FrbrError, FrbrResult};
use crate::frbr_error;
use crate::index::{SearchIndex, WorkDocument};
use crate::lock::{LockService, cluster_lock_key};
use crate::store::BibStore;
use crate::types::{Record, RecordId, Work, WorkId};

/// Result of a clustering run.
#[derive(Debug, Clone)]
pub enum ClusterOutcome {
    /// The pool was clustered and persisted as this work.
    Clustered {
        work: Work,
        /// Every record in the processed candidate pool, for downstream
        /// notification.
        records: Vec<Record>,
    },
    /// Another run owns part of the neighborhood; retry later.
    Skipped,
}

/// Orchestrates clustering runs over a store, lock service, and search index.
pub struct ClusterPipeline<S, L, I> {
    store: S,
    locks: L,
    index: I,
    config: ClusterConfig,
}

impl<S, L, I> ClusterPipeline<S, L, I>
where
    S: BibStore,
    L: LockService,
    I: SearchIndex,
{
    pub fn new(store: S, locks: L, index: I, config: ClusterConfig) -> FrbrResult<Self> {
        config.validate().map_err(|err| {
            frbr_error!(
                ErrorKind::ConfigError,
                "Invalid clustering configuration",
                source: err
            )
        })?;

        Ok(Self {
            store,
            locks,
            index,
            config,
        })
    }

    /// Runs a full clustering pass seeded by one record.
    ///
    /// Returns [`ClusterOutcome::Skipped`] when the seed lock is held or an
    /// overlapping run is detected during blocking; both mean the record
    /// should be retried later.
    pub async fn cluster_record(&self, seed_id: RecordId) -> FrbrResult<ClusterOutcome> {
        let key = cluster_lock_key(seed_id);
        let ttl = Duration::from_secs(self.config.lock_ttl_secs);

        let Some(lease) = self.locks.try_acquire(&key, ttl).await? else {
            info!(seed_id, "seed record already locked, skipping run");
            return Ok(ClusterOutcome::Skipped);
        };

        let result = self.run(seed_id).await;

        if let Err(err) = self.locks.release(&lease).await {
            warn!(seed_id, %err, "failed to release clustering lock");
        }

        match result {
            Err(err) if err.kind() == ErrorKind::ConcurrentClustering => {
                info!(seed_id, "overlapping clustering run detected, skipping");
                Ok(ClusterOutcome::Skipped)
            }
            other => other,
        }
    }

    async fn run(&self, seed_id: RecordId) -> FrbrResult<ClusterOutcome> {
        let seed = self
            .store
            .get_records(&[seed_id])
            .await?
            .into_iter()
            .next();
        let Some(seed) = seed else {
            bail!(
                ErrorKind::MissingRecord,
                "Seed record not found in the store",
                seed_id.to_string()
            );
        };

        let finder = CandidateFinder::new(&self.store, &self.locks, &self.config);
        let candidate_ids = finder.find_candidates(&seed).await?;
        let records = self.store.get_records(&candidate_ids).await?;
        if records.len() != candidate_ids.len() {
            bail!(
                ErrorKind::MissingRecord,
                "Candidate pool records disappeared between blocking and load"
            );
        }

        let clusters = EditionClusterer::new(&self.config).cluster(&records)?;
        let mut work = build::build_work(&records, &clusters)?;

        let stale = self
            .store
            .save_clustered_work(&mut work, &candidate_ids)
            .await?;

        debug!(
            seed_id,
            pool = records.len(),
            editions = work.editions.len(),
            stale = stale.len(),
            "persisted clustered work"
        );

        if !stale.is_empty() {
            let stale_ids: Vec<WorkId> = stale.iter().map(|work| work.id).collect();
            self.store.delete_works(&stale_ids).await?;

            let stale_uuids: Vec<Uuid> = stale.iter().map(|work| work.uuid).collect();
            self.log_index_failure(self.index.delete_works(&stale_uuids).await);
        }

        let document = WorkDocument::from_work(&work);
        self.log_index_failure(self.index.index_work(&document).await);

        Ok(ClusterOutcome::Clustered { work, records })
    }

    /// Index maintenance never rolls back committed relational state.
    fn log_index_failure(&self, result: Result<(), FrbrError>) {
        if let Err(err) = result {
            warn!(%err, "search index update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::memory::MemoryIndex;
    use crate::lock::memory::MemoryLockService;
    use crate::store::memory::MemoryStore;
    use crate::types::Record;

    fn emma_record(source_id: &str, isbn: &str) -> Record {
        let mut record = Record::new("test", source_id);
        record.title = Some("Emma".to_string());
        record.identifiers = vec![format!("{isbn}|isbn")];
        record.publisher = vec!["Macmillan|||".to_string()];
        record.dates = vec!["1900|publication_date".to_string()];
        record
    }

    fn pipeline(
        store: &MemoryStore,
        locks: &MemoryLockService,
        index: &MemoryIndex,
    ) -> ClusterPipeline<MemoryStore, MemoryLockService, MemoryIndex> {
        ClusterPipeline::new(
            store.clone(),
            locks.clone(),
            index.clone(),
            ClusterConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn clusters_a_connected_pool_into_one_work() {
        let store = MemoryStore::new();
        let locks = MemoryLockService::new();
        let index = MemoryIndex::new();

        let seed = store.insert_record(emma_record("1", "9780000000001")).await;
        store.insert_record(emma_record("2", "9780000000001")).await;

        let outcome = pipeline(&store, &locks, &index)
            .cluster_record(seed.id.unwrap())
            .await
            .unwrap();

        let ClusterOutcome::Clustered { work, records } = outcome else {
            panic!("expected a clustered outcome");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(work.title, "Emma");
        assert_eq!(work.editions.len(), 1);
        assert_eq!(work.editions[0].dcdw_uuids.len(), 2);

        let stored = store.get_record(seed.id.unwrap()).await.unwrap();
        assert!(stored.cluster_status);

        assert_eq!(index.document_count().await, 1);
        assert!(index.get_document(work.uuid).await.is_some());
    }

    #[tokio::test]
    async fn skips_when_the_seed_is_locked() {
        let store = MemoryStore::new();
        let locks = MemoryLockService::new();
        let index = MemoryIndex::new();

        let seed = store.insert_record(emma_record("1", "9780000000001")).await;
        locks
            .try_acquire(
                &cluster_lock_key(seed.id.unwrap()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let outcome = pipeline(&store, &locks, &index)
            .cluster_record(seed.id.unwrap())
            .await
            .unwrap();

        assert!(matches!(outcome, ClusterOutcome::Skipped));
        assert_eq!(index.document_count().await, 0);
    }

    #[tokio::test]
    async fn skips_when_a_matched_record_is_locked() {
        let store = MemoryStore::new();
        let locks = MemoryLockService::new();
        let index = MemoryIndex::new();

        let seed = store.insert_record(emma_record("1", "9780000000001")).await;
        let other = store.insert_record(emma_record("2", "9780000000001")).await;
        locks
            .try_acquire(
                &cluster_lock_key(other.id.unwrap()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let outcome = pipeline(&store, &locks, &index)
            .cluster_record(seed.id.unwrap())
            .await
            .unwrap();

        assert!(matches!(outcome, ClusterOutcome::Skipped));
        let stored = store.get_record(seed.id.unwrap()).await.unwrap();
        assert!(!stored.cluster_status);
    }

    #[tokio::test]
    async fn releases_the_seed_lock_after_the_run() {
        let store = MemoryStore::new();
        let locks = MemoryLockService::new();
        let index = MemoryIndex::new();

        let seed = store.insert_record(emma_record("1", "9780000000001")).await;
        pipeline(&store, &locks, &index)
            .cluster_record(seed.id.unwrap())
            .await
            .unwrap();

        assert_eq!(locks.held_locks().await, 0);
    }

    #[tokio::test]
    async fn missing_seed_fails_with_missing_record() {
        let store = MemoryStore::new();
        let locks = MemoryLockService::new();
        let index = MemoryIndex::new();

        let err = pipeline(&store, &locks, &index)
            .cluster_record(42)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingRecord);
    }
}
