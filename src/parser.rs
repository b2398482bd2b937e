//! Field extraction from free-form WHOIS text.
//!
//! Registries disagree on field names (ARIN `OrgAbuseEmail`, RIPE
//! `abuse-mailbox`, ...), so each field is looked up through an ordered list
//! of candidate patterns. Order is significant: the first pattern that
//! yields a usable value wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Organization reported when no organization-like field is present.
pub const UNKNOWN_ORGANIZATION: &str = "Unknown";

const EMAIL: &str = r"([A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,})";

/// Abuse contact patterns, tried in order against each line.
static ABUSE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"(?i)abuse[^:\n]*e-?mail[^:\n]*:\s*{EMAIL}"),
        format!(r"(?i)OrgAbuseEmail:\s*{EMAIL}"),
        format!(r"(?i)RAbuseEmail:\s*{EMAIL}"),
        format!(r"(?i)abuse-mailbox:\s*{EMAIL}"),
        format!(r"(?i)Abuse contact for '[^']*' is '{EMAIL}'"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static ORGANIZATION_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| field_patterns(&["OrgName", "org-name", "Organization", "netname", "descr"]));

static NETWORK_RANGE_PATTERNS: Lazy<Vec<Regex>> =
    Lazy::new(|| field_patterns(&["NetRange", "inetnum", "CIDR"]));

static COUNTRY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*country:[ \t]*([a-z]{2})\b").unwrap());

/// `Field: value` at the start of a line, case-insensitive.
fn field_patterns(fields: &[&str]) -> Vec<Regex> {
    fields
        .iter()
        .map(|f| Regex::new(&format!(r"(?im)^[ \t]*{}:[ \t]*(.*)$", regex::escape(f))).unwrap())
        .collect()
}

/// Fields recovered from one WHOIS response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedWhois {
    pub abuse_contact: Option<String>,
    pub organization: String,
    pub network_range: Option<String>,
    pub country: Option<String>,
}

/// Parse raw WHOIS text. Each field is extracted independently; a field
/// that cannot be found falls back to absent (or "Unknown" for the
/// organization).
pub fn parse(raw: &str) -> ParsedWhois {
    ParsedWhois {
        abuse_contact: abuse_contact(raw),
        organization: first_field(raw, &ORGANIZATION_PATTERNS)
            .unwrap_or_else(|| UNKNOWN_ORGANIZATION.to_string()),
        network_range: first_field(raw, &NETWORK_RANGE_PATTERNS),
        country: country(raw),
    }
}

/// First abuse mailbox in document order; pattern order breaks ties within
/// a line.
pub fn abuse_contact(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        ABUSE_PATTERNS
            .iter()
            .find_map(|re| re.captures(line))
            .map(|cap| cap[1].to_ascii_lowercase())
    })
}

/// First non-empty value for the highest-priority field that has one.
fn first_field(raw: &str, patterns: &[Regex]) -> Option<String> {
    patterns.iter().find_map(|re| {
        re.captures_iter(raw)
            .map(|cap| cap[1].trim().to_string())
            .find(|v| !v.is_empty())
    })
}

pub fn country(raw: &str) -> Option<String> {
    COUNTRY_PATTERN
        .captures(raw)
        .map(|cap| cap[1].to_ascii_uppercase())
}
