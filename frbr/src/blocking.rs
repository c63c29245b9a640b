//! Candidate retrieval by transitive identifier matching.
//!
//! Blocking walks the identifier graph outward from a seed record: each hop
//! queries the store for unchecked records sharing an identifier with the
//! frontier and feeds accepted records' unseen matchable identifiers into the
//! next hop. Records matched directly against the seed's identifiers are
//! accepted unconditionally; transitive hops additionally require title-token
//! overlap with the seed. The walk is bounded by the
//! configured hop distance and candidate pool size, and aborts when another
//! clustering run holds a lock on any matched record.

use std::collections::HashSet;
use tracing::debug;

use crate::bail;
use crate::config::ClusterConfig;
use crate::conversions::identifier;
use crate::error::{ErrorKind, FrbrResult};
use crate::lock::{LockService, cluster_lock_key};
use crate::store::{BibStore, MatchedRecord};
use crate::types::{Record, RecordId};

/// Tokens too common to count toward a title match.
const TITLE_STOP_WORDS: &[&str] = &["a", "an", "the", "of"];

/// Finds the candidate pool for a clustering run.
pub struct CandidateFinder<'a, S, L> {
    store: &'a S,
    locks: &'a L,
    config: &'a ClusterConfig,
}

impl<'a, S, L> CandidateFinder<'a, S, L>
where
    S: BibStore,
    L: LockService,
{
    pub fn new(store: &'a S, locks: &'a L, config: &'a ClusterConfig) -> Self {
        Self {
            store,
            locks,
            config,
        }
    }

    /// Walks the identifier graph outward from `seed` and returns the ids of
    /// every record in its match neighborhood, seed included.
    ///
    /// Fails with [`ErrorKind::CandidatePoolTooLarge`] when the pool exceeds
    /// the configured cap and with [`ErrorKind::ConcurrentClustering`] when
    /// any matched record is locked by another run.
    pub async fn find_candidates(&self, seed: &Record) -> FrbrResult<Vec<RecordId>> {
        let Some(seed_id) = seed.id else {
            bail!(ErrorKind::InvalidState, "Seed record has not been persisted");
        };

        let seed_tokens = tokenize_title(seed.title.as_deref().unwrap_or_default());

        let mut matched_ids: Vec<RecordId> = vec![seed_id];
        let mut checked_ids: HashSet<RecordId> = HashSet::from([seed_id]);
        let mut seen_identifiers: HashSet<String> = HashSet::new();

        let mut frontier = identifier::matchable(&seed.identifiers);
        seen_identifiers.extend(frontier.iter().cloned());

        for distance in 0..self.config.max_match_distance {
            if frontier.is_empty() {
                break;
            }

            let mut next_frontier: Vec<String> = Vec::new();

            for batch in frontier.chunks(self.config.identifier_batch_size) {
                let exclude: Vec<RecordId> = checked_ids.iter().copied().collect();
                let matches = self.store.match_identifiers(batch, &exclude).await?;

                self.ensure_unlocked(&matches).await?;

                for matched in matches {
                    checked_ids.insert(matched.id);

                    // Direct identifier matches with the seed are trusted;
                    // the title filter guards transitive hops only.
                    if distance > 0
                        && !titles_overlap(
                            &seed_tokens,
                            matched.title.as_deref().unwrap_or_default(),
                        )
                    {
                        continue;
                    }

                    matched_ids.push(matched.id);

                    if matched_ids.len() > self.config.max_candidate_records {
                        bail!(
                            ErrorKind::CandidatePoolTooLarge,
                            "Candidate pool exceeds the configured limit",
                            format!(
                                "{} > {}",
                                matched_ids.len(),
                                self.config.max_candidate_records
                            )
                        );
                    }

                    for id in identifier::matchable(&matched.identifiers) {
                        if seen_identifiers.insert(id.clone()) {
                            next_frontier.push(id);
                        }
                    }
                }
            }

            debug!(
                distance,
                matched = matched_ids.len(),
                frontier = next_frontier.len(),
                "completed blocking hop"
            );

            frontier = next_frontier;
        }

        Ok(matched_ids)
    }

    /// Aborts the run when any matched record is locked by an overlapping
    /// clustering run. Checked per batch so contention surfaces before the
    /// pool grows further.
    async fn ensure_unlocked(&self, matches: &[MatchedRecord]) -> FrbrResult<()> {
        if matches.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = matches
            .iter()
            .map(|matched| cluster_lock_key(matched.id))
            .collect();

        if self.locks.any_locked(&keys).await? {
            bail!(
                ErrorKind::ConcurrentClustering,
                "Matched record is locked by an overlapping clustering run"
            );
        }

        Ok(())
    }
}

/// Lowercased word tokens of a title, with stop words removed.
pub fn tokenize_title(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty() && !TITLE_STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Title-overlap rule applied to every matched record.
///
/// Single-token titles match on one shared token; anything longer requires
/// two. Records with an empty tokenized title never match.
pub fn titles_overlap(seed_tokens: &[String], candidate_title: &str) -> bool {
    let candidate_tokens = tokenize_title(candidate_title);
    if seed_tokens.is_empty() || candidate_tokens.is_empty() {
        return false;
    }

    let seed: HashSet<&str> = seed_tokens.iter().map(String::as_str).collect();
    let shared = candidate_tokens
        .iter()
        .filter(|token| seed.contains(token.as_str()))
        .collect::<HashSet<_>>()
        .len();

    if seed_tokens.len() == 1 || candidate_tokens.len() == 1 {
        shared >= 1
    } else {
        shared >= 2
    }
}
