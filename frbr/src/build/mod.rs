//! Assembly of the Work/Edition/Item aggregate from a clustered pool.
//!
//! Each edition cluster becomes an [`Edition`]; work-level fields are chosen
//! by frequency across the pool, edition-level fields by frequency within the
//! cluster. Contributor roles route agents to the level they describe and
//! file parts split into edition-level cover links and per-item content
//! links.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::bail;
use crate::cluster::EditionCluster;
use crate::conversions::{agent, date, identifier, subject};
use crate::error::{ErrorKind, FrbrResult};
use crate::languages;
use crate::types::{
    Agent, Edition, Identifier, Item, Language, Link, Measurement, PhysicalLocation, Record, Work,
};

/// Roles that describe the work itself rather than a single edition.
const WORK_CONTRIBUTOR_ROLES: &[&str] = &["translator", "editor", "adapter", "compiler"];

/// Roles that describe the digital item a source delivers.
const ITEM_CONTRIBUTOR_ROLES: &[&str] = &["provider", "repository", "digitizer"];

/// Leading articles ignored when building the sort title.
const SORT_STOP_WORDS: &[&str] = &["a", "an", "the"];

/// Measurement kinds that apply to the whole work.
const WORK_MEASUREMENT_KINDS: &[&str] = &["government_doc", "government_document"];

/// Frequency counter with insertion-order tie-breaking.
#[derive(Debug, Clone)]
pub struct Counter<T> {
    counts: Vec<(T, usize)>,
}

impl<T: PartialEq> Counter<T> {
    pub fn new() -> Self {
        Self { counts: Vec::new() }
    }

    pub fn add(&mut self, value: T) {
        match self.counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((value, 1)),
        }
    }

    /// The most frequent value; earliest inserted wins ties.
    pub fn most_common(&self) -> Option<&T> {
        let mut best: Option<(&T, usize)> = None;
        for (value, count) in &self.counts {
            if best.map_or(true, |(_, best_count)| *count > best_count) {
                best = Some((value, *count));
            }
        }
        best.map(|(value, _)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl<T: PartialEq> Default for Counter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> FromIterator<T> for Counter<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut counter = Counter::new();
        for value in iter {
            counter.add(value);
        }
        counter
    }
}

/// Lowercased title with leading English articles removed.
pub fn sort_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let mut words = lowered.split_whitespace().peekable();

    if let Some(first) = words.peek()
        && SORT_STOP_WORDS.contains(first)
    {
        words.next();
    }

    let stripped = words.collect::<Vec<_>>().join(" ");
    if stripped.is_empty() { lowered } else { stripped }
}

/// Builds the [`Work`] aggregate for a clustered pool.
///
/// `clusters` must partition the pool; records referenced by no cluster fail
/// the build with [`ErrorKind::InvalidData`].
pub fn build_work(records: &[Record], clusters: &[EditionCluster]) -> FrbrResult<Work> {
    if records.is_empty() {
        bail!(ErrorKind::InvalidData, "Cannot build a work from no records");
    }

    let by_uuid: BTreeMap<Uuid, &Record> =
        records.iter().map(|record| (record.uuid, record)).collect();

    let title_counter: Counter<&String> =
        records.iter().filter_map(|record| record.title.as_ref()).collect();
    let Some(title) = title_counter.most_common() else {
        bail!(ErrorKind::InvalidData, "No record in the pool has a title");
    };
    let title = (*title).clone();

    let medium: Counter<&String> =
        records.iter().filter_map(|record| record.medium.as_ref()).collect();

    let mut alt_titles: Vec<String> = Vec::new();
    let mut series_data: Vec<String> = Vec::new();
    let mut author_strings: Vec<String> = Vec::new();
    let mut work_contributor_strings: Vec<String> = Vec::new();
    let mut subject_strings: Vec<String> = Vec::new();
    let mut work_identifiers: Vec<Identifier> = Vec::new();
    let mut work_languages: Vec<Language> = Vec::new();
    let mut work_measurements: Vec<Measurement> = Vec::new();

    for record in records {
        for alternative in &record.alternative {
            if *alternative != title && !alt_titles.contains(alternative) {
                alt_titles.push(alternative.clone());
            }
        }
        for series in &record.is_part_of {
            if !series_data.contains(series) {
                series_data.push(series.clone());
            }
        }

        author_strings.extend(record.authors.iter().cloned());
        subject_strings.extend(record.subjects.iter().cloned());

        for contributor in &record.contributors {
            if let Some(role) = agent::role_of(contributor)
                && WORK_CONTRIBUTOR_ROLES.contains(&role)
            {
                work_contributor_strings.push(contributor.clone());
            }
        }

        for raw in &record.identifiers {
            if let Some(parsed) = identifier::parse(raw)
                && !work_identifiers.contains(&parsed)
            {
                work_identifiers.push(parsed);
            }
        }

        for raw in &record.languages {
            let language = languages::normalize(raw);
            if !work_languages.contains(&language) {
                work_languages.push(language);
            }
        }

        for (value, kind) in measurements(record) {
            let measurement = Measurement { value, kind };
            if WORK_MEASUREMENT_KINDS.contains(&measurement.kind.as_str())
                && !work_measurements.contains(&measurement)
            {
                work_measurements.push(measurement);
            }
        }
    }

    let editions = clusters
        .iter()
        .map(|cluster| build_edition(cluster, &by_uuid))
        .collect::<FrbrResult<Vec<Edition>>>()?;

    // The article stop words are English; other languages keep their titles
    // intact, lower-cased.
    let english = work_languages.is_empty()
        || work_languages
            .iter()
            .any(|language| language.iso_3.as_deref() == Some("eng"));
    let sorted = if english {
        sort_title(&title)
    } else {
        title.to_lowercase()
    };

    Ok(Work {
        id: None,
        uuid: Uuid::new_v4(),
        date_created: chrono::Utc::now(),
        sort_title: sorted,
        title,
        alt_titles,
        medium: medium.most_common().map(|m| (*m).clone()),
        series_data,
        authors: agent::parse_agents(&author_strings),
        contributors: agent::parse_agents(&work_contributor_strings),
        subjects: subject::parse_subjects(&subject_strings),
        identifiers: work_identifiers,
        languages: work_languages,
        measurements: work_measurements,
        editions,
    })
}

fn build_edition(
    cluster: &EditionCluster,
    by_uuid: &BTreeMap<Uuid, &Record>,
) -> FrbrResult<Edition> {
    let mut members: Vec<&Record> = Vec::with_capacity(cluster.record_uuids.len());
    for uuid in &cluster.record_uuids {
        let Some(record) = by_uuid.get(uuid).copied() else {
            bail!(
                ErrorKind::InvalidData,
                "Edition cluster references a record outside the pool",
                uuid.to_string()
            );
        };
        members.push(record);
    }

    // Out-of-range or unparsable year labels null the date rather than
    // failing the build.
    let publication_date = cluster
        .year_label
        .as_deref()
        .and_then(date::check_publication_date);

    let place_counter: Counter<&String> =
        members.iter().filter_map(|record| record.spatial.as_ref()).collect();

    let statement_counter: Counter<String> = members
        .iter()
        .flat_map(|record| record.has_version.iter())
        .filter_map(|version| version.split('|').next())
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect();
    let edition_statement = statement_counter.most_common().cloned();
    let edition = edition_statement.as_deref().and_then(date::edition_number);

    let summary_counter: Counter<&String> = members
        .iter()
        .filter_map(|record| record.abstract_text.as_ref())
        .collect();
    let toc_counter: Counter<&String> = members
        .iter()
        .filter_map(|record| record.table_of_contents.as_ref())
        .collect();
    let extent_counter: Counter<&String> = members
        .iter()
        .filter_map(|record| record.extent.as_ref())
        .collect();

    let mut publisher_strings: Vec<String> = Vec::new();
    let mut contributor_strings: Vec<String> = Vec::new();
    let mut alt_titles: Vec<String> = Vec::new();
    let mut volume_data: Vec<String> = Vec::new();
    let mut edition_languages: Vec<Language> = Vec::new();
    let mut dates: Vec<String> = Vec::new();
    let mut measurements_list: Vec<Measurement> = Vec::new();
    let mut identifiers: Vec<Identifier> = Vec::new();
    let mut items: Vec<Item> = Vec::new();
    let mut links: Vec<Link> = Vec::new();
    let mut dcdw_uuids: Vec<String> = Vec::new();

    for record in &members {
        publisher_strings.extend(record.publisher.iter().cloned());
        for alternative in &record.alternative {
            if !alt_titles.contains(alternative) {
                alt_titles.push(alternative.clone());
            }
        }
        for entry in &record.is_part_of {
            if entry.ends_with("|volume") && !volume_data.contains(entry) {
                volume_data.push(entry.clone());
            }
        }

        for contributor in &record.contributors {
            let Some(role) = agent::role_of(contributor) else {
                continue;
            };
            if !WORK_CONTRIBUTOR_ROLES.contains(&role) && !ITEM_CONTRIBUTOR_ROLES.contains(&role) {
                contributor_strings.push(contributor.clone());
            }
        }

        for raw in &record.languages {
            let language = languages::normalize(raw);
            if !edition_languages.contains(&language) {
                edition_languages.push(language);
            }
        }

        for entry in date::normalize_dates(&record.dates) {
            if !dates.contains(&entry) {
                dates.push(entry);
            }
        }

        for (value, kind) in measurements(record) {
            let measurement = Measurement { value, kind };
            if !WORK_MEASUREMENT_KINDS.contains(&measurement.kind.as_str())
                && !measurements_list.contains(&measurement)
            {
                measurements_list.push(measurement);
            }
        }

        for raw in &record.identifiers {
            if let Some(parsed) = identifier::parse(raw)
                && !identifiers.contains(&parsed)
            {
                identifiers.push(parsed);
            }
        }

        let (record_items, cover_links) = build_items(record);
        items.extend(record_items);
        for link in cover_links {
            if !links.iter().any(|existing| existing.url == link.url) {
                links.push(link);
            }
        }

        dcdw_uuids.push(record.uuid.simple().to_string());
    }

    Ok(Edition {
        publication_date,
        publication_place: place_counter.most_common().map(|p| (*p).clone()),
        edition_statement,
        edition,
        alt_titles,
        volume_data,
        publishers: agent::parse_agents(&publisher_strings),
        contributors: agent::parse_agents(&contributor_strings),
        languages: edition_languages,
        dates,
        summary: summary_counter.most_common().map(|s| (*s).clone()),
        table_of_contents: toc_counter.most_common().map(|t| (*t).clone()),
        extent: extent_counter.most_common().map(|e| (*e).clone()),
        measurements: measurements_list,
        identifiers,
        items,
        links,
        dcdw_uuids,
    })
}

/// Splits a record's file parts into items and edition-level cover links.
///
/// Cover parts become edition links; content parts group by index into one
/// item each, carrying the record's primary identifier, provider-role
/// contributors, and the physical location matching the item index.
fn build_items(record: &Record) -> (Vec<Item>, Vec<Link>) {
    let mut covers: Vec<Link> = Vec::new();
    let mut grouped: BTreeMap<Option<u32>, Vec<Link>> = BTreeMap::new();

    for part in record.parts() {
        let link = Link::new(part.url.clone(), part.media_type.clone(), part.flags_json());

        if part.is_cover() {
            covers.push(link);
        } else {
            grouped.entry(part.index).or_default().push(link);
        }
    }

    let primary_identifier: Vec<Identifier> = record
        .identifiers
        .first()
        .and_then(|raw| identifier::parse(raw))
        .into_iter()
        .collect();

    let contributors: Vec<Agent> = agent::parse_agents(
        &record
            .contributors
            .iter()
            .filter(|contributor| {
                agent::role_of(contributor)
                    .map(|role| ITEM_CONTRIBUTOR_ROLES.contains(&role))
                    .unwrap_or(false)
            })
            .cloned()
            .collect::<Vec<String>>(),
    );

    let locations = record.coverage_locations();

    let items = grouped
        .into_iter()
        .map(|(index, links)| {
            let physical_location = index
                .and_then(|i| locations.get(&i))
                .map(|(code, name)| PhysicalLocation {
                    code: code.clone(),
                    name: name.clone(),
                });

            Item {
                source: record.source.clone(),
                content_type: "ebook".to_string(),
                identifiers: primary_identifier.clone(),
                contributors: contributors.clone(),
                links,
                physical_location,
                publisher_project_source: record.publisher_project_source.clone(),
            }
        })
        .collect();

    (items, covers)
}

/// Parses `value|kind` measurement strings from the record's requires field.
fn measurements(record: &Record) -> Vec<(String, String)> {
    record
        .requires
        .iter()
        .filter_map(|raw| {
            let (value, kind) = raw.split_once('|')?;
            if value.is_empty() || kind.is_empty() {
                return None;
            }
            Some((value.to_string(), kind.to_string()))
        })
        .collect()
}
