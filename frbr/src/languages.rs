//! ISO-639 language lookup table.
//!
//! Maps between English language names, 2-letter (639-1) and 3-letter (639-3)
//! codes, including the bibliographic 639-2/B aliases that differ from the
//! terminological codes (e.g. `ger` vs `deu`). Loaded once at first use.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::Language;

struct LanguageEntry {
    name: &'static str,
    iso_2: Option<&'static str>,
    iso_3: &'static str,
    /// ISO 639-2/B bibliographic alias when it differs from the 639-3 code.
    bibliographic: Option<&'static str>,
}

const LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry { name: "Arabic", iso_2: Some("ar"), iso_3: "ara", bibliographic: None },
    LanguageEntry { name: "Chinese", iso_2: Some("zh"), iso_3: "zho", bibliographic: Some("chi") },
    LanguageEntry { name: "Czech", iso_2: Some("cs"), iso_3: "ces", bibliographic: Some("cze") },
    LanguageEntry { name: "Danish", iso_2: Some("da"), iso_3: "dan", bibliographic: None },
    LanguageEntry { name: "Dutch", iso_2: Some("nl"), iso_3: "nld", bibliographic: Some("dut") },
    LanguageEntry { name: "English", iso_2: Some("en"), iso_3: "eng", bibliographic: None },
    LanguageEntry { name: "Finnish", iso_2: Some("fi"), iso_3: "fin", bibliographic: None },
    LanguageEntry { name: "French", iso_2: Some("fr"), iso_3: "fra", bibliographic: Some("fre") },
    LanguageEntry { name: "German", iso_2: Some("de"), iso_3: "deu", bibliographic: Some("ger") },
    LanguageEntry { name: "Greek", iso_2: Some("el"), iso_3: "ell", bibliographic: Some("gre") },
    LanguageEntry { name: "Hebrew", iso_2: Some("he"), iso_3: "heb", bibliographic: None },
    LanguageEntry { name: "Hindi", iso_2: Some("hi"), iso_3: "hin", bibliographic: None },
    LanguageEntry { name: "Hungarian", iso_2: Some("hu"), iso_3: "hun", bibliographic: None },
    LanguageEntry { name: "Icelandic", iso_2: Some("is"), iso_3: "isl", bibliographic: Some("ice") },
    LanguageEntry { name: "Italian", iso_2: Some("it"), iso_3: "ita", bibliographic: None },
    LanguageEntry { name: "Japanese", iso_2: Some("ja"), iso_3: "jpn", bibliographic: None },
    LanguageEntry { name: "Korean", iso_2: Some("ko"), iso_3: "kor", bibliographic: None },
    LanguageEntry { name: "Latin", iso_2: Some("la"), iso_3: "lat", bibliographic: None },
    LanguageEntry { name: "Norwegian", iso_2: Some("no"), iso_3: "nor", bibliographic: None },
    LanguageEntry { name: "Polish", iso_2: Some("pl"), iso_3: "pol", bibliographic: None },
    LanguageEntry { name: "Portuguese", iso_2: Some("pt"), iso_3: "por", bibliographic: None },
    LanguageEntry { name: "Romanian", iso_2: Some("ro"), iso_3: "ron", bibliographic: Some("rum") },
    LanguageEntry { name: "Russian", iso_2: Some("ru"), iso_3: "rus", bibliographic: None },
    LanguageEntry { name: "Spanish", iso_2: Some("es"), iso_3: "spa", bibliographic: None },
    LanguageEntry { name: "Swedish", iso_2: Some("sv"), iso_3: "swe", bibliographic: None },
    LanguageEntry { name: "Turkish", iso_2: Some("tr"), iso_3: "tur", bibliographic: None },
    LanguageEntry { name: "Ukrainian", iso_2: Some("uk"), iso_3: "ukr", bibliographic: None },
    LanguageEntry { name: "Welsh", iso_2: Some("cy"), iso_3: "cym", bibliographic: Some("wel") },
    LanguageEntry { name: "Yiddish", iso_2: Some("yi"), iso_3: "yid", bibliographic: None },
];

fn lookup_table() -> &'static HashMap<String, &'static LanguageEntry> {
    static TABLE: OnceLock<HashMap<String, &'static LanguageEntry>> = OnceLock::new();

    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for entry in LANGUAGES {
            table.insert(entry.name.to_lowercase(), entry);
            table.insert(entry.iso_3.to_string(), entry);
            if let Some(iso_2) = entry.iso_2 {
                table.insert(iso_2.to_string(), entry);
            }
            if let Some(bibliographic) = entry.bibliographic {
                table.insert(bibliographic.to_string(), entry);
            }
        }
        table
    })
}

/// Resolves a raw language value (name, 2-letter, 3-letter, or 639-2/B code)
/// to a normalized [`Language`].
///
/// Unknown values keep what was supplied: the raw value becomes the name for
/// long strings or the matching code field for 2/3-letter strings.
pub fn normalize(raw: &str) -> Language {
    let trimmed = raw.trim();
    let key = trimmed.to_lowercase();

    if let Some(entry) = lookup_table().get(&key) {
        return Language {
            language: Some(entry.name.to_string()),
            iso_2: entry.iso_2.map(str::to_string),
            iso_3: Some(entry.iso_3.to_string()),
        };
    }

    match trimmed.len() {
        2 => Language {
            language: None,
            iso_2: Some(key),
            iso_3: None,
        },
        3 => Language {
            language: None,
            iso_2: None,
            iso_3: Some(key),
        },
        _ => Language {
            language: Some(trimmed.to_string()),
            iso_2: None,
            iso_3: None,
        },
    }
}
