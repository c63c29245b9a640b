//! Feature extraction for edition clustering.
//!
//! Each record contributes up to four channels: publication place, publisher,
//! edition statement, and publication year digits. Text channels are encoded
//! as tf-idf over character n-grams taken within word boundaries, L2
//! normalized per channel; the year channel carries the raw digit values at a
//! fixed weight. A channel is only included when at least one record in the
//! pool has data for it.

use std::collections::{BTreeMap, HashMap};

use crate::conversions::date;
use crate::types::Record;

/// Weight applied to the publication year digit features.
const DATE_WEIGHT: f64 = 1.75;

/// Phrases catalogers use for unknown publishers and places; they carry no
/// clustering signal.
const FILLER_PHRASES: &[&str] = &[
    "publisher not identified",
    "place of publication not identified",
    "sine nomine",
    "sine loco",
];

/// Normalizes a text channel value before n-gram extraction.
pub fn normalize_text(raw: &str) -> String {
    let mut text = raw.to_lowercase().replace('&', " and ");

    // Abbreviated fillers must go before punctuation stripping splits them.
    text = text.replace("s.n.", " ").replace("s.l.", " ");
    for phrase in FILLER_PHRASES {
        text = text.replace(phrase, " ");
    }

    let mut cleaned: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    // "s.n." survives punctuation stripping as a bare token.
    cleaned = cleaned
        .split_whitespace()
        .filter(|token| *token != "sn" && *token != "sl")
        .collect::<Vec<_>>()
        .join(" ");

    cleaned
}

/// Character n-grams within word boundaries, each word padded with spaces.
///
/// Words shorter than `n` contribute their padded form once per size.
pub fn char_wb_ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let mut grams = Vec::new();

    for word in text.split_whitespace() {
        let padded: Vec<char> = format!(" {word} ").chars().collect();

        for n in min_n..=max_n {
            if padded.len() <= n {
                grams.push(padded.iter().collect::<String>());
                continue;
            }
            for window in padded.windows(n) {
                grams.push(window.iter().collect::<String>());
            }
        }
    }

    grams
}

/// One tf-idf encoded text channel: sparse per-record vectors plus the
/// channel dimensionality.
struct TextChannel {
    vectors: Vec<HashMap<usize, f64>>,
    dims: usize,
}

/// Encodes normalized texts as L2-normalized tf-idf vectors over character
/// n-grams, using smoothed idf.
fn tfidf_channel(texts: &[String], min_n: usize, max_n: usize) -> TextChannel {
    let n_docs = texts.len();
    let mut vocabulary: HashMap<String, usize> = HashMap::new();
    let mut doc_counts: Vec<HashMap<usize, f64>> = Vec::with_capacity(n_docs);
    let mut document_frequency: HashMap<usize, usize> = HashMap::new();

    for text in texts {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for gram in char_wb_ngrams(text, min_n, max_n) {
            let next_index = vocabulary.len();
            let index = *vocabulary.entry(gram).or_insert(next_index);
            *counts.entry(index).or_insert(0.0) += 1.0;
        }

        for index in counts.keys() {
            *document_frequency.entry(*index).or_insert(0) += 1;
        }
        doc_counts.push(counts);
    }

    let vectors = doc_counts
        .into_iter()
        .map(|counts| {
            let mut vector: HashMap<usize, f64> = counts
                .into_iter()
                .map(|(index, tf)| {
                    let df = document_frequency[&index] as f64;
                    let idf = ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0;
                    (index, tf * idf)
                })
                .collect();

            let norm = vector.values().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for value in vector.values_mut() {
                    *value /= norm;
                }
            }

            vector
        })
        .collect();

    TextChannel {
        vectors,
        dims: vocabulary.len(),
    }
}

fn place_text(record: &Record) -> String {
    normalize_text(record.spatial.as_deref().unwrap_or_default())
}

fn publisher_text(record: &Record) -> String {
    let names: Vec<&str> = record
        .publisher
        .iter()
        .map(|publisher| publisher.split('|').next().unwrap_or_default())
        .collect();

    normalize_text(&names.join(", "))
}

fn edition_text(record: &Record) -> String {
    let statements: Vec<&str> = record
        .has_version
        .iter()
        .map(|version| version.split('|').next().unwrap_or_default())
        .collect();

    normalize_text(&statements.join(", "))
}

/// Named year digit features for one record, or an empty map when no
/// publication year is known.
fn date_features(record: &Record) -> BTreeMap<String, f64> {
    date::publication_year_span(&record.dates)
        .map(|span| span.to_features())
        .unwrap_or_default()
}

/// Builds the dense feature matrix for a candidate pool.
///
/// The matrix always has at least one column: a pool where every channel is
/// empty degenerates to all-zero single-column vectors, which the clusterer
/// collapses into one edition.
pub fn feature_matrix(records: &[Record]) -> Vec<Vec<f64>> {
    let places: Vec<String> = records.iter().map(place_text).collect();
    let publishers: Vec<String> = records.iter().map(publisher_text).collect();
    let editions: Vec<String> = records.iter().map(edition_text).collect();
    let dates: Vec<BTreeMap<String, f64>> = records.iter().map(date_features).collect();

    let mut channels: Vec<TextChannel> = Vec::new();
    for (texts, min_n, max_n) in [(&places, 2, 4), (&publishers, 2, 4), (&editions, 1, 3)] {
        if texts.iter().any(|text| !text.is_empty()) {
            channels.push(tfidf_channel(texts, min_n, max_n));
        }
    }

    let mut date_keys: Vec<String> = dates
        .iter()
        .flat_map(|features| features.keys().cloned())
        .collect();
    date_keys.sort();
    date_keys.dedup();

    let text_dims: usize = channels.iter().map(|channel| channel.dims).sum();
    let total_dims = (text_dims + date_keys.len()).max(1);

    records
        .iter()
        .enumerate()
        .map(|(row, _)| {
            let mut vector = vec![0.0; total_dims];

            let mut offset = 0;
            for channel in &channels {
                for (index, value) in &channel.vectors[row] {
                    vector[offset + index] = *value;
                }
                offset += channel.dims;
            }

            for (column, key) in date_keys.iter().enumerate() {
                if let Some(value) = dates[row].get(key) {
                    vector[offset + column] = value * DATE_WEIGHT;
                }
            }

            vector
        })
        .collect()
}
