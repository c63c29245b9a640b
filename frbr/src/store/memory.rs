use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::FrbrResult;
use crate::store::{BibStore, MatchedRecord};
use crate::types::{
    FrbrStatus, Identifier, IdentifierId, Link, LinkId, Record, RecordId, RecordState, StaleWork,
    Work, WorkId,
};

/// Inner state of [`MemoryStore`].
#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<RecordId, Record>,
    works: BTreeMap<WorkId, Work>,
    /// Canonical identifier rows keyed by `(authority, value)`.
    identifiers: HashMap<(String, String), IdentifierId>,
    /// Canonical link rows keyed by exact URL.
    links: HashMap<String, LinkId>,
    next_record_id: RecordId,
    next_work_id: WorkId,
    next_identifier_id: IdentifierId,
    next_link_id: LinkId,
}

/// In-memory store for testing and development purposes.
///
/// [`MemoryStore`] implements the full [`BibStore`] contract, including
/// identifier/link deduplication and oldest-work merge semantics, so the
/// entire clustering pipeline can run without a database. All data is lost
/// when the process terminates.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists a record, assigning it a relational id, and returns the
    /// stored copy.
    pub async fn insert_record(&self, mut record: Record) -> Record {
        let mut inner = self.inner.lock().await;

        inner.next_record_id += 1;
        let id = inner.next_record_id;
        record.id = Some(id);
        inner.records.insert(id, record.clone());

        record
    }

    /// Inserts a pre-built work directly, assigning it a fresh id and
    /// registering its identifiers. Useful for seeding merge scenarios.
    pub async fn insert_work(&self, mut work: Work) -> Work {
        let mut inner = self.inner.lock().await;

        resolve_identifier_ids(&mut inner, &mut work);
        resolve_link_ids(&mut inner, &mut work);

        inner.next_work_id += 1;
        let id = inner.next_work_id;
        work.id = Some(id);
        inner.works.insert(id, work.clone());

        work
    }

    /// Returns a copy of a stored work, if present.
    pub async fn get_work(&self, id: WorkId) -> Option<Work> {
        let inner = self.inner.lock().await;
        inner.works.get(&id).cloned()
    }

    /// Returns copies of all stored works.
    pub async fn works(&self) -> Vec<Work> {
        let inner = self.inner.lock().await;
        inner.works.values().cloned().collect()
    }

    /// Returns a copy of a stored record, if present.
    pub async fn get_record(&self, id: RecordId) -> Option<Record> {
        let inner = self.inner.lock().await;
        inner.records.get(&id).cloned()
    }

    /// Number of canonical identifier rows.
    pub async fn identifier_rows(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.identifiers.len()
    }

    /// Number of canonical link rows.
    pub async fn link_rows(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.links.len()
    }
}

/// Assigns canonical ids to every identifier in the work, reusing existing
/// rows by `(authority, value)` and collapsing in-work duplicates.
fn resolve_identifier_ids(inner: &mut Inner, work: &mut Work) {
    dedupe_identifiers(inner, &mut work.identifiers);

    for edition in &mut work.editions {
        dedupe_identifiers(inner, &mut edition.identifiers);

        for item in &mut edition.items {
            dedupe_identifiers(inner, &mut item.identifiers);
        }
    }
}

fn dedupe_identifiers(inner: &mut Inner, identifiers: &mut Vec<Identifier>) {
    let mut seen: HashSet<(String, String)> = HashSet::new();

    identifiers.retain(|identifier| seen.insert(identifier.key()));

    for identifier in identifiers {
        let key = identifier.key();
        let id = match inner.identifiers.get(&key) {
            Some(id) => *id,
            None => {
                inner.next_identifier_id += 1;
                let id = inner.next_identifier_id;
                inner.identifiers.insert(key, id);
                id
            }
        };
        identifier.id = Some(id);
    }
}

/// Assigns canonical ids to every link in the work, reusing existing rows by
/// exact URL.
fn resolve_link_ids(inner: &mut Inner, work: &mut Work) {
    for edition in &mut work.editions {
        dedupe_links(inner, &mut edition.links);

        for item in &mut edition.items {
            dedupe_links(inner, &mut item.links);
        }
    }
}

fn dedupe_links(inner: &mut Inner, links: &mut [Link]) {
    for link in links {
        let id = match inner.links.get(&link.url) {
            Some(id) => *id,
            None => {
                inner.next_link_id += 1;
                let id = inner.next_link_id;
                inner.links.insert(link.url.clone(), id);
                id
            }
        };
        link.id = Some(id);
    }
}

fn identifier_id_set(work: &Work) -> HashSet<IdentifierId> {
    work.identifiers
        .iter()
        .chain(work.editions.iter().flat_map(|e| e.identifiers.iter()))
        .filter_map(|identifier| identifier.id)
        .collect()
}

impl BibStore for MemoryStore {
    async fn get_records(&self, ids: &[RecordId]) -> FrbrResult<Vec<Record>> {
        let inner = self.inner.lock().await;

        Ok(ids
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect())
    }

    async fn match_identifiers(
        &self,
        identifiers: &[String],
        exclude: &[RecordId],
    ) -> FrbrResult<Vec<MatchedRecord>> {
        let inner = self.inner.lock().await;

        let batch: HashSet<&str> = identifiers.iter().map(String::as_str).collect();
        let excluded: HashSet<RecordId> = exclude.iter().copied().collect();

        Ok(inner
            .records
            .values()
            .filter(|record| {
                record
                    .id
                    .map(|id| !excluded.contains(&id))
                    .unwrap_or(false)
                    && record.title.is_some()
                    && record
                        .identifiers
                        .iter()
                        .any(|id| batch.contains(id.as_str()))
            })
            .map(|record| MatchedRecord {
                id: record.id.expect("filtered on persisted records"),
                title: record.title.clone(),
                identifiers: record.identifiers.clone(),
            })
            .collect())
    }

    async fn save_clustered_work(
        &self,
        work: &mut Work,
        record_ids: &[RecordId],
    ) -> FrbrResult<Vec<StaleWork>> {
        let mut inner = self.inner.lock().await;

        resolve_identifier_ids(&mut inner, work);
        resolve_link_ids(&mut inner, work);

        // Merge: any stored work sharing an identifier competes for survivor;
        // the oldest creation timestamp wins and its identity is adopted.
        let own_identifiers = identifier_id_set(work);
        let mut matches: Vec<&Work> = inner
            .works
            .values()
            .filter(|candidate| {
                !identifier_id_set(candidate).is_disjoint(&own_identifiers)
            })
            .collect();
        matches.sort_by_key(|candidate| (candidate.date_created, candidate.id));

        let stale: Vec<StaleWork> = if let Some(survivor) = matches.first() {
            work.id = survivor.id;
            work.uuid = survivor.uuid;
            work.date_created = survivor.date_created;

            matches[1..]
                .iter()
                .map(|candidate| StaleWork {
                    id: candidate.id.expect("stored works have ids"),
                    uuid: candidate.uuid,
                })
                .collect()
        } else {
            inner.next_work_id += 1;
            work.id = Some(inner.next_work_id);
            Vec::new()
        };

        let work_id = work.id.expect("assigned above");
        inner.works.insert(work_id, work.clone());

        // Status update is part of the same "transaction": under the single
        // inner lock, mirroring the relational phase-1 commit.
        let now = Utc::now();
        for record_id in record_ids {
            if let Some(record) = inner.records.get_mut(record_id) {
                record.cluster_status = true;
                record.frbr_status = FrbrStatus::Complete;
                record.state = RecordState::Clustered;
                record.date_modified = now;
            }
        }

        Ok(stale)
    }

    async fn delete_works(&self, ids: &[WorkId]) -> FrbrResult<()> {
        let mut inner = self.inner.lock().await;

        for id in ids {
            inner.works.remove(id);
        }

        Ok(())
    }
}
