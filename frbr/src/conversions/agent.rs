//! Parsing and unification of composite agent strings.
//!
//! Agents arrive as `name|viaf|lcnaf|role` strings (shorter forms carry just
//! `name|role`). Variants of the same agent are unified: an authority-id
//! match always merges, and agents without overlapping ids merge when one
//! name is a subset of the other after stripping life-date suffixes.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::types::Agent;

fn life_dates_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)").expect("valid regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid regex"))
}

/// Parses and unifies a set of composite agent strings.
///
/// Entries with an empty name are dropped. Roles accumulate on the unified
/// agent; the first-seen name and any non-empty authority ids win.
pub fn parse_agents(raw: &[String]) -> Vec<Agent> {
    let mut agents: Vec<Agent> = Vec::new();

    for entry in raw {
        let Some(parsed) = parse_agent(entry) else {
            continue;
        };

        match agents.iter_mut().find(|existing| matches(existing, &parsed)) {
            Some(existing) => {
                if existing.viaf.is_empty() {
                    existing.viaf = parsed.viaf;
                }
                if existing.lcnaf.is_empty() {
                    existing.lcnaf = parsed.lcnaf;
                }
                for role in parsed.roles {
                    if !existing.roles.contains(&role) {
                        existing.roles.push(role);
                    }
                }
            }
            None => agents.push(parsed),
        }
    }

    agents
}

/// Parses a single composite agent string.
///
/// Four or more segments are read as `name|viaf|lcnaf|role`; shorter strings
/// treat the last segment as the role. Returns [`None`] for empty names.
pub fn parse_agent(raw: &str) -> Option<Agent> {
    let fields: Vec<&str> = raw.split('|').collect();

    let (name, viaf, lcnaf, role) = match fields.len() {
        0 => return None,
        1 => (fields[0], "", "", ""),
        2 | 3 => (fields[0], "", "", fields[fields.len() - 1]),
        _ => (fields[0], fields[1], fields[2], fields[3]),
    };

    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let roles = if role.is_empty() {
        Vec::new()
    } else {
        vec![role.to_string()]
    };

    Some(Agent {
        name: name.to_string(),
        viaf: viaf.to_string(),
        lcnaf: lcnaf.to_string(),
        roles,
    })
}

/// Returns the role segment of a composite agent string, if any.
pub fn role_of(raw: &str) -> Option<&str> {
    let role = raw.rsplit('|').next()?;
    if role.is_empty() { None } else { Some(role) }
}

fn matches(a: &Agent, b: &Agent) -> bool {
    if !a.viaf.is_empty() && a.viaf == b.viaf {
        return true;
    }
    if !a.lcnaf.is_empty() && a.lcnaf == b.lcnaf {
        return true;
    }

    names_overlap(&a.name, &b.name)
}

/// Conservative fuzzy name match: after stripping parenthesized life-date
/// suffixes, punctuation, and case, one token set must contain the other.
fn names_overlap(a: &str, b: &str) -> bool {
    let tokens_a = name_tokens(a);
    let tokens_b = name_tokens(b);

    if tokens_a.is_empty() || tokens_b.is_empty() {
        return false;
    }

    tokens_a.is_subset(&tokens_b) || tokens_b.is_subset(&tokens_a)
}

fn name_tokens(name: &str) -> HashSet<String> {
    let stripped = life_dates_re().replace_all(name, "");

    word_re()
        .find_iter(&stripped)
        .map(|token| token.as_str().to_lowercase())
        .collect()
}
