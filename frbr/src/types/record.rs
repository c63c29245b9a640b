use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Stable relational identifier of a persisted record.
pub type RecordId = i64;

/// FRBRization progress of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrbrStatus {
    ToDo,
    InProgress,
    Complete,
}

impl FrbrStatus {
    /// Database representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            FrbrStatus::ToDo => "to_do",
            FrbrStatus::InProgress => "in_progress",
            FrbrStatus::Complete => "complete",
        }
    }
}

/// Lifecycle state of a record within the ingest pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Ingested,
    FilesSaved,
    Embellished,
    Clustered,
    Complete,
}

impl RecordState {
    /// Database representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordState::Ingested => "ingested",
            RecordState::FilesSaved => "files_saved",
            RecordState::Embellished => "embellished",
            RecordState::Clustered => "clustered",
            RecordState::Complete => "complete",
        }
    }
}

/// Capability flags attached to a file part, serialized as sparse JSON with
/// only the `true` flags present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileFlags {
    pub catalog: bool,
    pub reader: bool,
    pub embed: bool,
    pub download: bool,
    pub cover: bool,
    pub fulfill_limited_access: bool,
    pub nypl_login: bool,
}

impl FileFlags {
    /// Renders the flags as the sparse JSON object used in encoded part strings.
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        let flags: [(&str, bool); 7] = [
            ("catalog", self.catalog),
            ("reader", self.reader),
            ("embed", self.embed),
            ("download", self.download),
            ("cover", self.cover),
            ("fulfill_limited_access", self.fulfill_limited_access),
            ("nypl_login", self.nypl_login),
        ];
        for (name, value) in flags {
            if value {
                map.insert(name.to_string(), serde_json::Value::Bool(true));
            }
        }
        serde_json::Value::Object(map)
    }
}

/// One encoded file associated with a record.
///
/// Wire format is pipe-delimited with an optional leading index and optional
/// trailing source url: `index|url|source|media_type|flags_json[|source_url]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub index: Option<u32>,
    pub url: String,
    pub source: String,
    pub media_type: String,
    pub flags: String,
    pub source_url: Option<String>,
}

impl Part {
    /// Parses an encoded part string.
    ///
    /// Returns [`None`] when the string has fewer than the five mandatory
    /// fields or the index is present but not numeric.
    pub fn parse(raw: &str) -> Option<Part> {
        let fields: Vec<&str> = raw.split('|').collect();
        if fields.len() < 5 {
            return None;
        }

        let index = if fields[0].is_empty() {
            None
        } else {
            Some(fields[0].parse::<u32>().ok()?)
        };

        // Flags are JSON and may themselves contain pipes inside string
        // values; everything between media type and a trailing url field is
        // folded back together.
        let (flags, source_url) = if fields.len() > 5 && fields[fields.len() - 1].starts_with("http")
        {
            (
                fields[4..fields.len() - 1].join("|"),
                Some(fields[fields.len() - 1].to_string()),
            )
        } else {
            (fields[4..].join("|"), None)
        };

        Some(Part {
            index,
            url: fields[1].to_string(),
            source: fields[2].to_string(),
            media_type: fields[3].to_string(),
            flags,
            source_url,
        })
    }

    /// Decoded capability flags, defaulting to all-false on malformed JSON.
    pub fn file_flags(&self) -> FileFlags {
        serde_json::from_str(&self.flags).unwrap_or_default()
    }

    /// True when this part carries a cover image rather than item content.
    pub fn is_cover(&self) -> bool {
        self.index.is_none() && self.file_flags().cover
    }

    /// Raw flags parsed into a JSON value, defaulting to an empty object.
    pub fn flags_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.flags)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.index.map(|i| i.to_string()).unwrap_or_default(),
            self.url,
            self.source,
            self.media_type,
            self.flags
        )?;
        if let Some(source_url) = &self.source_url {
            write!(f, "|{source_url}")?;
        }
        Ok(())
    }
}

/// One source's description of a publication.
///
/// Composite fields keep the pipe-delimited wire convention used across the
/// pipeline (`value|authority` identifiers, `name|viaf|lcnaf|role` agents,
/// `date|type` dates, `locationCode|locationName|itemIndex` coverage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Relational id, absent until the record is persisted.
    pub id: Option<RecordId>,
    pub uuid: Uuid,
    pub source: String,
    pub source_id: String,
    pub title: Option<String>,
    pub alternative: Vec<String>,
    pub medium: Option<String>,
    /// Series and volume memberships, `label|position|kind`.
    pub is_part_of: Vec<String>,
    /// Edition statements, `statement[|editionNo]`.
    pub has_version: Vec<String>,
    /// Composite `value|authority` identifier strings, primary first.
    pub identifiers: Vec<String>,
    pub authors: Vec<String>,
    pub contributors: Vec<String>,
    pub publisher: Vec<String>,
    /// Place of publication.
    pub spatial: Option<String>,
    pub subjects: Vec<String>,
    /// Structured `date|type` strings.
    pub dates: Vec<String>,
    pub languages: Vec<String>,
    pub abstract_text: Option<String>,
    pub table_of_contents: Option<String>,
    pub extent: Option<String>,
    /// Measurement/flag fields, `value|kind`.
    pub requires: Vec<String>,
    /// Encoded part strings, see [`Part`].
    pub has_part: Vec<String>,
    /// Physical coverage strings, `locationCode|locationName|itemIndex`.
    pub coverage: Vec<String>,
    pub publisher_project_source: Option<String>,
    pub cluster_status: bool,
    pub frbr_status: FrbrStatus,
    pub state: RecordState,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl Record {
    /// Creates an empty unsaved record for the given source.
    pub fn new(source: impl Into<String>, source_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            source: source.into(),
            source_id: source_id.into(),
            title: None,
            alternative: Vec::new(),
            medium: None,
            is_part_of: Vec::new(),
            has_version: Vec::new(),
            identifiers: Vec::new(),
            authors: Vec::new(),
            contributors: Vec::new(),
            publisher: Vec::new(),
            spatial: None,
            subjects: Vec::new(),
            dates: Vec::new(),
            languages: Vec::new(),
            abstract_text: None,
            table_of_contents: None,
            extent: None,
            requires: Vec::new(),
            has_part: Vec::new(),
            coverage: Vec::new(),
            publisher_project_source: None,
            cluster_status: false,
            frbr_status: FrbrStatus::ToDo,
            state: RecordState::Ingested,
            date_created: now,
            date_modified: now,
        }
    }

    /// Parsed [`Part`]s for every well-formed `has_part` entry, keyed in the
    /// original order.
    pub fn parts(&self) -> Vec<Part> {
        self.has_part.iter().filter_map(|p| Part::parse(p)).collect()
    }

    /// Physical locations parsed from coverage strings, keyed by item index.
    pub fn coverage_locations(&self) -> BTreeMap<u32, (String, String)> {
        self.coverage
            .iter()
            .filter_map(|entry| {
                let mut fields = entry.split('|');
                let code = fields.next()?.to_string();
                let name = fields.next()?.to_string();
                let index = fields.next()?.parse::<u32>().ok()?;
                Some((index, (code, name)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_indexed_part() {
        let part = Part::parse("1|https://example.org/1.epub|gutenberg|application/epub+zip|{\"reader\": true}").unwrap();

        assert_eq!(part.index, Some(1));
        assert_eq!(part.url, "https://example.org/1.epub");
        assert_eq!(part.source, "gutenberg");
        assert_eq!(part.media_type, "application/epub+zip");
        assert!(part.file_flags().reader);
        assert!(!part.is_cover());
    }

    #[test]
    fn parses_indexless_cover_part() {
        let part = Part::parse("|https://example.org/cover.png|gutenberg|image/png|{\"cover\": true}").unwrap();

        assert_eq!(part.index, None);
        assert!(part.is_cover());
    }

    #[test]
    fn part_round_trips_through_display() {
        let raw = "2|https://example.org/2.pdf|hathitrust|application/pdf|{\"download\": true}";
        let part = Part::parse(raw).unwrap();

        assert_eq!(part.to_string(), raw);
    }

    #[test]
    fn rejects_truncated_part() {
        assert!(Part::parse("1|url|source").is_none());
    }

    #[test]
    fn file_flags_serialize_sparse() {
        let flags = FileFlags {
            reader: true,
            download: true,
            ..FileFlags::default()
        };

        assert_eq!(
            flags.to_json(),
            serde_json::json!({"reader": true, "download": true})
        );
    }

    #[test]
    fn coverage_locations_keyed_by_item_index() {
        let mut record = Record::new("test", "1");
        record.coverage = vec!["nypl|Research Library|1".to_string(), "bad".to_string()];

        let locations = record.coverage_locations();

        assert_eq!(
            locations.get(&1),
            Some(&("nypl".to_string(), "Research Library".to_string()))
        );
        assert_eq!(locations.len(), 1);
    }
}
