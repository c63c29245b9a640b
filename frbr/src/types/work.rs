use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable relational identifier of a persisted work.
pub type WorkId = i64;

/// Stable relational identifier of a persisted identifier row.
pub type IdentifierId = i64;

/// Stable relational identifier of a persisted link row.
pub type LinkId = i64;

/// A typed `(authority, value)` identifier pair.
///
/// Within a work or edition no `(authority, value)` pair is stored twice;
/// the store resolves duplicates against existing rows and reuses their ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// Relational id, populated once deduplicated against the store.
    pub id: Option<IdentifierId>,
    pub authority: String,
    pub value: String,
}

impl Identifier {
    pub fn new(authority: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            authority: authority.into(),
            value: value.into(),
        }
    }

    /// The dedupe key used against the relational store.
    pub fn key(&self) -> (String, String) {
        (self.authority.clone(), self.value.clone())
    }
}

/// A URL attached to an item or edition, deduplicated by exact URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: Option<LinkId>,
    pub url: String,
    pub media_type: String,
    pub flags: serde_json::Value,
}

impl Link {
    pub fn new(
        url: impl Into<String>,
        media_type: impl Into<String>,
        flags: serde_json::Value,
    ) -> Self {
        Self {
            id: None,
            url: url.into(),
            media_type: media_type.into(),
            flags,
        }
    }
}

/// A named agent (person or corporate body) with authority ids and roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub viaf: String,
    pub lcnaf: String,
    pub roles: Vec<String>,
}

/// A subject heading with optional authority and control number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub heading: String,
    pub authority: String,
    pub control_number: String,
}

/// A normalized language entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub language: Option<String>,
    pub iso_2: Option<String>,
    pub iso_3: Option<String>,
}

/// A measurement or flag value, e.g. `government_document`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measurement {
    pub value: String,
    pub kind: String,
}

/// Physical holding location parsed from a record's coverage field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalLocation {
    pub code: String,
    pub name: String,
}

/// One source instance within an edition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub source: String,
    pub content_type: String,
    /// Primary identifier of the contributing record only.
    pub identifiers: Vec<Identifier>,
    pub contributors: Vec<Agent>,
    pub links: Vec<Link>,
    pub physical_location: Option<PhysicalLocation>,
    pub publisher_project_source: Option<String>,
}

/// One publication variant of a work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edition {
    /// Publication date, normalized and bounds-checked; out-of-range or
    /// unparsable dates are discarded rather than stored.
    pub publication_date: Option<NaiveDate>,
    pub publication_place: Option<String>,
    pub edition_statement: Option<String>,
    /// Edition number resolved from a leading ordinal in the statement.
    pub edition: Option<u32>,
    pub alt_titles: Vec<String>,
    pub volume_data: Vec<String>,
    pub publishers: Vec<Agent>,
    pub contributors: Vec<Agent>,
    pub languages: Vec<Language>,
    pub dates: Vec<String>,
    pub summary: Option<String>,
    pub table_of_contents: Option<String>,
    pub extent: Option<String>,
    pub measurements: Vec<Measurement>,
    pub identifiers: Vec<Identifier>,
    pub items: Vec<Item>,
    /// Edition-level links (cover images).
    pub links: Vec<Link>,
    /// Hex uuids of the records folded into this edition.
    pub dcdw_uuids: Vec<String>,
}

/// The canonical FRBR aggregate produced by a clustering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    /// Relational id, absent until saved; adopted from the oldest matching
    /// work during a merge.
    pub id: Option<WorkId>,
    pub uuid: Uuid,
    pub date_created: DateTime<Utc>,
    pub title: String,
    pub sort_title: String,
    pub alt_titles: Vec<String>,
    pub medium: Option<String>,
    pub series_data: Vec<String>,
    pub authors: Vec<Agent>,
    pub contributors: Vec<Agent>,
    pub subjects: Vec<Subject>,
    pub identifiers: Vec<Identifier>,
    pub languages: Vec<Language>,
    pub measurements: Vec<Measurement>,
    pub editions: Vec<Edition>,
}

/// A work made obsolete by a merge and scheduled for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleWork {
    pub id: WorkId,
    pub uuid: Uuid,
}
