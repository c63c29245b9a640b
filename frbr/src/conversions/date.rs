//! Publication date and year normalization.
//!
//! Structured `date|type` strings are reduced to a [`YearSpan`] of
//! century/decade/unit digits. The digit representation feeds the clustering
//! date channel and converts back to a year label (`"1900"`, `"1900-1905"`,
//! `"19xx"`) used to group editions.

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Earliest publication year accepted for an edition (Gutenberg-era floor).
pub const MIN_PUBLICATION_YEAR: i32 = 1488;

/// Preferred date types, most authoritative first.
const DATE_TYPE_PREFERENCE: &[&str] = &["copyright_date", "publication_date", "issued"];

fn digit_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([\d\-\?]+)").expect("valid regex"))
}

fn normalized_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{4}(?:-\d{1,2}(?:-\d{1,2})?)?)").expect("valid regex"))
}

/// A publication year range decomposed into century, decade, and unit digits.
///
/// Each component holds `[start, end]`; missing digits (dashes or question
/// marks in the source string) stay [`None`] and render as `x` in labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearSpan {
    pub century: [Option<u8>; 2],
    pub decade: [Option<u8>; 2],
    pub unit: [Option<u8>; 2],
}

impl YearSpan {
    /// Builds a span from raw start/end year strings such as `"1900"`,
    /// `"190-"`, or `"19??"`.
    ///
    /// The start century must be parsable or the span is rejected; end
    /// components are only read when the end string is long enough.
    pub fn from_range(start: &str, end: &str) -> Option<YearSpan> {
        let start_chars: Vec<char> = start.chars().collect();
        if start_chars.len() < 4 {
            return None;
        }

        let mut span = YearSpan::default();

        let start_century: String = start_chars[..2].iter().collect();
        span.century[0] = Some(start_century.parse::<u8>().ok()?);
        span.decade[0] = digit_at(&start_chars, 2);
        span.unit[0] = digit_at(&start_chars, 3);

        let end_chars: Vec<char> = end.chars().collect();
        if end_chars.len() > 2 {
            let end_century: String = end_chars[..2].iter().collect();
            span.century[1] = end_century.parse::<u8>().ok();
            span.decade[1] = digit_at(&end_chars, 2);
            if end_chars.len() > 3 {
                span.unit[1] = digit_at(&end_chars, 3);
            }
        }

        Some(span)
    }

    /// Renders the span as sparse named features for the clustering date
    /// channel, one key per known digit.
    pub fn to_features(&self) -> BTreeMap<String, f64> {
        let mut features = BTreeMap::new();
        let components: [(&str, &[Option<u8>; 2]); 3] = [
            ("century", &self.century),
            ("decade", &self.decade),
            ("unit", &self.unit),
        ];

        for (name, values) in components {
            if let Some(start) = values[0] {
                features.insert(format!("{name}Start"), f64::from(start));
            }
            if let Some(end) = values[1] {
                features.insert(format!("{name}End"), f64::from(end));
            }
        }

        features
    }

    fn bound_label(&self, side: usize) -> String {
        let century = self.century[side]
            .map(|c| format!("{c}"))
            .unwrap_or_else(|| "xx".to_string());
        let decade = self.decade[side]
            .map(|d| d.to_string())
            .unwrap_or_else(|| "x".to_string());
        let unit = self.unit[side]
            .map(|u| u.to_string())
            .unwrap_or_else(|| "x".to_string());

        format!("{century}{decade}{unit}")
    }

    /// Converts the digit span back to a year label.
    ///
    /// A range renders as `"start-end"` when the bounds differ; unknown
    /// digits render as `x`.
    pub fn label(&self) -> String {
        let start = self.bound_label(0);
        let end = self.bound_label(1);

        if end != start {
            format!("{start}-{end}")
        } else {
            start
        }
    }
}

fn digit_at(chars: &[char], position: usize) -> Option<u8> {
    chars
        .get(position)
        .filter(|c| **c != '-' && **c != '?')
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
}

/// Reduces a record's structured `date|type` strings to the preferred year
/// span, following the copyright > publication > issued preference order.
///
/// Entries that are not exactly `date|type`, or whose date has no digit
/// sequence, are skipped.
pub fn publication_year_span(dates: &[String]) -> Option<YearSpan> {
    let mut spans: BTreeMap<String, YearSpan> = BTreeMap::new();

    for raw in dates {
        let fields: Vec<&str> = raw.split('|').collect();
        let [date, date_type] = fields[..] else {
            continue;
        };

        let Some(matched) = digit_span_re().captures(date) else {
            continue;
        };
        let date_str = matched.get(1).map(|m| m.as_str()).unwrap_or_default();

        let (start, end) = split_year_range(date_str);

        if let Some(span) = YearSpan::from_range(start, end) {
            spans.entry(date_type.to_string()).or_insert(span);
        }
    }

    DATE_TYPE_PREFERENCE
        .iter()
        .find_map(|preference| spans.get(*preference).cloned())
}

/// Splits a digit string into a (start, end) year pair.
///
/// `"1900-1905"` is a true range; `"1900-12-25"` and `"1900-12"` are a
/// single year; anything else bounds itself.
fn split_year_range(date_str: &str) -> (&str, &str) {
    let year_range = regex_cached(r"^(\d{4})-(\d{4})");
    let iso_date = regex_cached(r"^\d{4}-\d{2}-\d{2}");
    let year_month = regex_cached(r"^\d{4}-\d{2}");

    if let Some(captures) = year_range.captures(date_str) {
        let start = captures.get(1).map(|m| m.as_str()).unwrap_or(date_str);
        let end = captures.get(2).map(|m| m.as_str()).unwrap_or(date_str);
        (start, end)
    } else if iso_date.is_match(date_str) || year_month.is_match(date_str) {
        let year = &date_str[..4];
        (year, year)
    } else {
        (date_str, date_str)
    }
}

fn regex_cached(pattern: &'static str) -> &'static Regex {
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<&'static str, &'static Regex>>> =
        OnceLock::new();

    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()));
    let mut cache = cache.lock().expect("regex cache poisoned");
    *cache
        .entry(pattern)
        .or_insert_with(|| Box::leak(Box::new(Regex::new(pattern).expect("valid regex"))))
}

/// Validates a year label or date string against the accepted historical
/// range.
///
/// Accepts calendar points between [`MIN_PUBLICATION_YEAR`] and the current
/// date inclusive. Returns [`None`] for unparsable strings and out-of-range
/// values; the caller nulls the field rather than failing the run.
pub fn check_publication_date(raw: &str) -> Option<NaiveDate> {
    let date = parse_date(raw)?;

    let today = Utc::now().date_naive();
    if date.year() < MIN_PUBLICATION_YEAR || date > today {
        return None;
    }

    Some(date)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }

    if let Some(captures) = regex_cached(r"^(\d{4})-(\d{1,2})$").captures(trimmed) {
        let year = captures.get(1)?.as_str().parse::<i32>().ok()?;
        let month = captures.get(2)?.as_str().parse::<u32>().ok()?;
        return NaiveDate::from_ymd_opt(year, month, 1);
    }

    // Fall back to the first plain four-digit year, covering labels like
    // "1900" and free text like "December 1488".
    let captures = regex_cached(r"\b(\d{4})\b").captures(trimmed)?;
    let year = captures.get(1)?.as_str().parse::<i32>().ok()?;

    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Normalizes a record's `date|type` strings for edition aggregation.
///
/// Trailing punctuation is dropped and embedded year or year-month values are
/// extracted from free text: `"sometime 1900-12 [pub]|other"` becomes
/// `"1900-12|other"`. Entries without a recognizable date are kept trimmed.
pub fn normalize_dates(dates: &[String]) -> Vec<String> {
    dates
        .iter()
        .filter_map(|raw| {
            let (date, date_type) = raw.rsplit_once('|')?;

            let cleaned = match normalized_date_re().captures(date) {
                Some(captures) => captures.get(1)?.as_str().to_string(),
                None => date.trim().trim_end_matches('.').to_string(),
            };

            if cleaned.is_empty() {
                return None;
            }

            Some(format!("{cleaned}|{date_type}"))
        })
        .collect()
}

/// Resolves an edition number from a leading ordinal in an edition statement,
/// e.g. `"3rd ed."` yields 3.
pub fn edition_number(statement: &str) -> Option<u32> {
    let captures = regex_cached(r"^(\d+)(?:st|nd|rd|th)?\b").captures(statement.trim())?;
    captures.get(1)?.as_str().parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_range_round_trips_through_label() {
        let span = YearSpan::from_range("1900", "1905").unwrap();

        assert_eq!(span.label(), "1900-1905");
    }

    #[test]
    fn single_year_round_trips_through_label() {
        let span = YearSpan::from_range("1850", "1850").unwrap();

        assert_eq!(span.label(), "1850");
    }

    #[test]
    fn uncertain_digits_render_as_placeholders() {
        let span = YearSpan::from_range("190-", "190?").unwrap();

        assert_eq!(span.label(), "190x");
        assert_eq!(span.century, [Some(19), Some(19)]);
        assert_eq!(span.decade, [Some(0), Some(0)]);
        assert_eq!(span.unit, [None, None]);
    }

    #[test]
    fn features_only_include_known_digits() {
        let span = YearSpan::from_range("190-", "190-").unwrap();
        let features = span.to_features();

        assert_eq!(features.get("centuryStart"), Some(&19.0));
        assert_eq!(features.get("decadeStart"), Some(&0.0));
        assert!(!features.contains_key("unitStart"));
    }

    #[test]
    fn prefers_copyright_over_publication_date() {
        let dates = vec![
            "1901|publication_date".to_string(),
            "1900|copyright_date".to_string(),
        ];

        let span = publication_year_span(&dates).unwrap();

        assert_eq!(span.label(), "1900");
    }

    #[test]
    fn iso_dates_reduce_to_their_year() {
        let dates = vec!["1900-12-25|publication_date".to_string()];

        assert_eq!(publication_year_span(&dates).unwrap().label(), "1900");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dates = vec![
            "no digits here|publication_date".to_string(),
            "1920|extra|publication_date".to_string(),
        ];

        assert_eq!(publication_year_span(&dates), None);
    }

    #[test]
    fn publication_date_bounds() {
        assert!(check_publication_date("1300").is_none());
        assert!(check_publication_date("1488").is_some());
        assert!(check_publication_date("December 1488").is_some());

        let today = Utc::now().date_naive();
        assert_eq!(check_publication_date(&today.to_string()), Some(today));

        let tomorrow = today.succ_opt().unwrap();
        assert!(check_publication_date(&tomorrow.to_string()).is_none());
    }

    #[test]
    fn normalizes_punctuation_and_embedded_years() {
        let dates = vec![
            "1999.|test".to_string(),
            "2000|other".to_string(),
            "sometime 1900-12 [pub]|other".to_string(),
        ];

        assert_eq!(
            normalize_dates(&dates),
            vec!["1999|test", "2000|other", "1900-12|other"]
        );
    }

    #[test]
    fn resolves_ordinal_edition_numbers() {
        assert_eq!(edition_number("3rd ed."), Some(3));
        assert_eq!(edition_number("10th revised edition"), Some(10));
        assert_eq!(edition_number("New edition"), None);
    }
}
