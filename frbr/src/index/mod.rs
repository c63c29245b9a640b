//! Search index projection of clustered works.
//!
//! The index is updated after the relational phase commits and failures are
//! surfaced to the caller as [`crate::error::ErrorKind::IndexUpdateFailed`];
//! the orchestration layer logs them without rolling back relational state.

pub mod memory;

use serde::{Deserialize, Serialize};
use std::future::Future;
use uuid::Uuid;

use crate::error::FrbrResult;
use crate::types::Work;

/// Denormalized agent entry within a [`WorkDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDocument {
    pub name: String,
    pub roles: Vec<String>,
}

/// Denormalized identifier entry within a [`WorkDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierDocument {
    pub authority: String,
    pub value: String,
}

/// Denormalized edition entry within a [`WorkDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditionDocument {
    pub publication_date: Option<String>,
    pub publication_place: Option<String>,
    pub publishers: Vec<String>,
    pub languages: Vec<String>,
    pub item_count: usize,
}

/// The search-facing projection of a clustered work.
///
/// Keyed by work uuid so stale documents can be removed after a merge
/// without a relational lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkDocument {
    pub uuid: Uuid,
    pub title: String,
    pub sort_title: String,
    pub alt_titles: Vec<String>,
    /// Autocomplete inputs: the title plus every alternative title.
    pub suggest: Vec<String>,
    pub medium: Option<String>,
    pub agents: Vec<AgentDocument>,
    pub subjects: Vec<String>,
    pub languages: Vec<String>,
    pub identifiers: Vec<IdentifierDocument>,
    pub editions: Vec<EditionDocument>,
}

impl WorkDocument {
    pub fn from_work(work: &Work) -> Self {
        let mut suggest = vec![work.title.clone()];
        suggest.extend(work.alt_titles.iter().cloned());

        let agents = work
            .authors
            .iter()
            .chain(work.contributors.iter())
            .map(|agent| AgentDocument {
                name: agent.name.clone(),
                roles: agent.roles.clone(),
            })
            .collect();

        let identifiers = work
            .identifiers
            .iter()
            .chain(work.editions.iter().flat_map(|e| e.identifiers.iter()))
            .map(|identifier| IdentifierDocument {
                authority: identifier.authority.clone(),
                value: identifier.value.clone(),
            })
            .collect();

        let languages = work
            .languages
            .iter()
            .filter_map(|language| language.language.clone())
            .collect();

        let editions = work
            .editions
            .iter()
            .map(|edition| EditionDocument {
                publication_date: edition.publication_date.map(|date| date.to_string()),
                publication_place: edition.publication_place.clone(),
                publishers: edition
                    .publishers
                    .iter()
                    .map(|publisher| publisher.name.clone())
                    .collect(),
                languages: edition
                    .languages
                    .iter()
                    .filter_map(|language| language.language.clone())
                    .collect(),
                item_count: edition.items.len(),
            })
            .collect();

        Self {
            uuid: work.uuid,
            title: work.title.clone(),
            sort_title: work.sort_title.clone(),
            alt_titles: work.alt_titles.clone(),
            suggest,
            medium: work.medium.clone(),
            agents,
            subjects: work
                .subjects
                .iter()
                .map(|subject| subject.heading.clone())
                .collect(),
            languages,
            identifiers,
            editions,
        }
    }
}

/// Trait for the search index consumed by the clustering pipeline.
pub trait SearchIndex {
    /// Indexes or replaces the document for a work, keyed by uuid.
    fn index_work(&self, document: &WorkDocument) -> impl Future<Output = FrbrResult<()>> + Send;

    /// Removes documents for works deleted by a merge.
    fn delete_works(&self, uuids: &[Uuid]) -> impl Future<Output = FrbrResult<()>> + Send;
}
