//! Parsing of composite subject heading strings.

use crate::types::Subject;

/// Parses `heading|authority|controlNo` subject strings.
///
/// Headings are trimmed of trailing periods and deduplicated
/// case-insensitively; the first-seen casing wins and later duplicates fill
/// in missing authority data. Strings with extra segments fold the leading
/// segments into the heading, comma-separated. Empty headings are dropped.
pub fn parse_subjects(raw: &[String]) -> Vec<Subject> {
    let mut subjects: Vec<Subject> = Vec::new();

    for entry in raw {
        let fields: Vec<&str> = entry.split('|').collect();

        let (heading, authority, control_number) = match fields.len() {
            0 => continue,
            1 => (fields[0].to_string(), "", ""),
            2 => (fields[0].to_string(), fields[1], ""),
            3 => (fields[0].to_string(), fields[1], fields[2]),
            n => (fields[..n - 2].join(","), fields[n - 2], fields[n - 1]),
        };

        let heading = heading.trim().trim_end_matches('.').to_string();
        if heading.is_empty() {
            continue;
        }

        match subjects
            .iter_mut()
            .find(|existing| existing.heading.eq_ignore_ascii_case(&heading))
        {
            Some(existing) => {
                if existing.authority.is_empty() {
                    existing.authority = authority.to_string();
                }
                if existing.control_number.is_empty() {
                    existing.control_number = control_number.to_string();
                }
            }
            None => subjects.push(Subject {
                heading,
                authority: authority.to_string(),
                control_number: control_number.to_string(),
            }),
        }
    }

    subjects
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_case_insensitive_duplicates_and_fills_authority() {
        let subjects = parse_subjects(&[
            "Test||".to_string(),
            "test.|auth|1234".to_string(),
            "|auth|56768".to_string(),
        ]);

        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].heading, "Test");
        assert_eq!(subjects[0].authority, "auth");
        assert_eq!(subjects[0].control_number, "1234");
    }

    #[test]
    fn folds_extra_segments_into_the_heading() {
        let subjects = parse_subjects(&["Test|Other|auth|1234".to_string()]);

        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0].heading, "Test,Other");
        assert_eq!(subjects[0].authority, "auth");
        assert_eq!(subjects[0].control_number, "1234");
    }

    #[test]
    fn plain_headings_parse_without_authority() {
        let subjects = parse_subjects(&["Ornithology".to_string()]);

        assert_eq!(subjects[0].heading, "Ornithology");
        assert_eq!(subjects[0].authority, "");
    }
}
