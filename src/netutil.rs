/*!
Address extraction and classification.

This module centralizes:
- Scanning free-form log text for IPv4 / IPv6 literals
- Private / reserved range classification against a fixed rule table

Extraction is purely lexical: candidates are found with regular
expressions and IPv6 candidates are confirmed by the standard library's
literal parser. Nothing here touches the network.
*/

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Dotted quad with every octet bounded to 0..=255.
static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b",
    )
    .unwrap()
});

/// Maximal runs of characters that can appear in an IPv6 literal. Runs are
/// trimmed of surrounding punctuation and confirmed by `Ipv6Addr::from_str`.
static IPV6_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9A-Fa-f:.]+").unwrap());

/// Address family of an extracted literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

/// Private / public verdict for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Private,
    Public,
}

/// A syntactically valid IP literal found in a log line.
///
/// Equality, hashing and `Display` use the canonical form (lower-case,
/// zero-compressed for IPv6), so `2001:DB8::1` and `2001:db8:0::1` are the
/// same address.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct Address(IpAddr);

impl Address {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    pub fn ip(&self) -> IpAddr {
        self.0
    }

    pub fn family(&self) -> AddressFamily {
        match self.0 {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    pub fn is_public(&self) -> bool {
        classify(self) == Classification::Public
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for Address {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IpAddr::from_str(s.trim()).map(Address)
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

/// Extract every distinct IP literal from `line`.
///
/// IPv4 matches come first, then IPv6 matches, each family in order of
/// first appearance. A literal repeated within the line is reported once.
pub fn extract(line: &str) -> Vec<Address> {
    let mut found: Vec<Address> = Vec::new();

    for m in IPV4_RE.find_iter(line) {
        if let Ok(ip) = Ipv4Addr::from_str(m.as_str()) {
            push_unique(&mut found, Address(IpAddr::V4(ip)));
        }
    }

    for m in IPV6_RUN_RE.find_iter(line) {
        let Some(candidate) = ipv6_candidate(line, m.start(), m.end()) else {
            continue;
        };
        if let Ok(ip) = Ipv6Addr::from_str(candidate) {
            push_unique(&mut found, Address(IpAddr::V6(ip)));
        }
    }

    found
}

fn push_unique(found: &mut Vec<Address>, addr: Address) {
    if !found.contains(&addr) {
        found.push(addr);
    }
}

/// Narrow a run of IPv6 characters down to the literal it holds.
///
/// Trailing `.` and a trailing single `:` are sentence / field punctuation.
/// A hex-looking label glued on the left (`id:2001:db8::1`) is cut at its
/// colon, and a single leading `:` left over from `label:` is dropped; `::`
/// is always kept. Runs still glued to word characters on the right
/// (`std::vector`) are rejected.
fn ipv6_candidate(line: &str, start: usize, end: usize) -> Option<&str> {
    let mut start = start;
    let mut end = end;

    while line[start..end].ends_with('.') {
        end -= 1;
    }
    if line[start..end].ends_with(':') && !line[start..end].ends_with("::") {
        end -= 1;
    }

    if glued(line[..start].chars().next_back()) {
        start += line[start..end].find(':')?;
    }
    if line[start..end].starts_with(':') && !line[start..end].starts_with("::") {
        start += 1;
    }

    if glued(line[end..].chars().next()) {
        return None;
    }
    let candidate = &line[start..end];
    (candidate.matches(':').count() >= 2).then_some(candidate)
}

fn glued(c: Option<char>) -> bool {
    c.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Classify an address against the fixed private rule table.
pub fn classify(addr: &Address) -> Classification {
    if is_private(addr.ip()) {
        Classification::Private
    } else {
        Classification::Public
    }
}

/// IPv4 blocks treated as private: RFC1918, loopback, link-local, CGNAT and
/// the whole of `0.0.0.0/8`.
const PRIVATE_V4: [(Ipv4Addr, u8); 7] = [
    (Ipv4Addr::new(10, 0, 0, 0), 8),
    (Ipv4Addr::new(172, 16, 0, 0), 12),
    (Ipv4Addr::new(192, 168, 0, 0), 16),
    (Ipv4Addr::new(127, 0, 0, 0), 8),
    (Ipv4Addr::new(169, 254, 0, 0), 16),
    (Ipv4Addr::new(0, 0, 0, 0), 8),
    (Ipv4Addr::new(100, 64, 0, 0), 10),
];

/// IPv6 blocks treated as private: unspecified, loopback, link-local, ULA.
const PRIVATE_V6: [(Ipv6Addr, u8); 4] = [
    (Ipv6Addr::UNSPECIFIED, 128),
    (Ipv6Addr::LOCALHOST, 128),
    (Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10),
    (Ipv6Addr::new(0xfc00, 0, 0, 0, 0, 0, 0, 0), 7),
];

/// Return true if the address falls in one of the private / reserved blocks.
pub fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => PRIVATE_V4
            .iter()
            .any(|(net, len)| in_prefix_v4(v4, *net, *len)),
        IpAddr::V6(v6) => PRIVATE_V6
            .iter()
            .any(|(net, len)| in_prefix_v6(v6, *net, *len)),
    }
}

fn in_prefix_v4(ip: Ipv4Addr, net: Ipv4Addr, len: u8) -> bool {
    let mask = u32::MAX.checked_shl(32 - u32::from(len)).unwrap_or(0);
    (u32::from(ip) & mask) == (u32::from(net) & mask)
}

fn in_prefix_v6(ip: Ipv6Addr, net: Ipv6Addr, len: u8) -> bool {
    let mask = u128::MAX.checked_shl(128 - u32::from(len)).unwrap_or(0);
    (u128::from(ip) & mask) == (u128::from(net) & mask)
}
