//! Parsing of composite `value|authority` identifier strings.

use crate::types::Identifier;

/// Authorities reliable enough to be used as match keys during blocking.
///
/// Other authorities (internal ids, DOIs with inconsistent casing, etc.) are
/// kept on records but never drive candidate generation.
const MATCHABLE_AUTHORITIES: &[&str] = &["isbn", "issn", "oclc", "lccn", "owi"];

/// Parses a composite `value|authority` string into a typed [`Identifier`].
///
/// The authority is the segment after the last pipe; values containing pipes
/// are preserved intact. Returns [`None`] when either side is empty.
pub fn parse(raw: &str) -> Option<Identifier> {
    let (value, authority) = raw.rsplit_once('|')?;
    if value.is_empty() || authority.is_empty() {
        return None;
    }

    Some(Identifier::new(authority, value))
}

/// True when the composite identifier's authority is a reliable match key.
pub fn is_matchable(raw: &str) -> bool {
    raw.rsplit_once('|')
        .map(|(value, authority)| !value.is_empty() && MATCHABLE_AUTHORITIES.contains(&authority))
        .unwrap_or(false)
}

/// Filters a record's composite identifiers down to the matchable ones.
pub fn matchable(identifiers: &[String]) -> Vec<String> {
    identifiers
        .iter()
        .filter(|id| is_matchable(id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_value_and_authority() {
        let id = parse("9780140430721|isbn").unwrap();

        assert_eq!(id.value, "9780140430721");
        assert_eq!(id.authority, "isbn");
        assert_eq!(id.id, None);
    }

    #[test]
    fn keeps_pipes_inside_values() {
        let id = parse("odd|value|oclc").unwrap();

        assert_eq!(id.value, "odd|value");
        assert_eq!(id.authority, "oclc");
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(parse("|isbn").is_none());
        assert!(parse("12345|").is_none());
        assert!(parse("12345").is_none());
    }

    #[test]
    fn only_reliable_authorities_are_matchable() {
        assert!(is_matchable("12345|isbn"));
        assert!(is_matchable("12345|owi"));
        assert!(!is_matchable("12345|doab"));
        assert!(!is_matchable("12345"));
    }

    #[test]
    fn matchable_filters_in_order() {
        let ids = vec![
            "1|test".to_string(),
            "2|isbn".to_string(),
            "3|owi".to_string(),
        ];

        assert_eq!(matchable(&ids), vec!["2|isbn", "3|owi"]);
    }
}
