//! Company-name and state normalization.
//!
//! `company_key` produces the join key used to reconcile records across every
//! source; `resolve_state` canonicalizes free-text state fields to 2-letter
//! codes. Both are total: unknown input degrades to an empty string, never
//! an error.

/// Full state names (50 states + DC) to canonical codes.
pub const STATE_NAMES: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
    ("Washington DC", "DC"),
];

/// Derive the join key for a company display name.
///
/// Trims, replaces narrow no-break (U+202F) and no-break (U+00A0) spaces
/// with ASCII spaces, lowercases, and collapses whitespace runs to a single
/// space. An empty key means "no entity" and callers skip it.
pub fn company_key(name: &str) -> String {
    name.replace(['\u{202f}', '\u{a0}'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolve a state string (2-letter code or full name) to a canonical code.
///
/// Returns the empty string for anything unrecognized; "state unknown" is a
/// normal condition, not an error.
pub fn resolve_state(input: &str) -> String {
    let s = input.trim();
    if s.len() == 2 {
        let upper = s.to_ascii_uppercase();
        if STATE_NAMES.iter().any(|(_, code)| *code == upper) {
            return upper;
        }
    }
    STATE_NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(s))
        .map(|(_, code)| (*code).to_string())
        .unwrap_or_default()
}

/// Full state name for a canonical code, if known.
pub fn state_name(code: &str) -> Option<&'static str> {
    STATE_NAMES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}
