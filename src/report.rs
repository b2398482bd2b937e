//! Turns contact groups into addressed abuse reports.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;

use crate::aggregate::{ContactGroup, UNRESOLVED_KEY};
use crate::log_index::LogIndex;
use crate::lookup::LookupRecord;
use crate::netutil::Address;
use crate::parser::UNKNOWN_ORGANIZATION;

pub const DEFAULT_SENDER_EMAIL: &str = "abuse-reports@localhost";
pub const DEFAULT_SENDER_NAME: &str = "Abuse Reporter";
pub const DEFAULT_MAX_LOG_LINES: usize = 10;

const RULE: &str = "----------------------------------------";

/// Inputs that shape the report text.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub sender_email: String,
    pub sender_name: String,
    /// Optional organization line in the signature (empty = omitted).
    pub sender_organization: String,
    /// Log lines quoted per address before truncation.
    pub max_log_lines: usize,
    /// Timestamp stamped on every report of a run.
    pub generated_at: DateTime<Utc>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            sender_email: DEFAULT_SENDER_EMAIL.to_string(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            sender_organization: String::new(),
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            generated_at: Utc::now(),
        }
    }
}

impl ReportOptions {
    /// `"Name" <email>` header value.
    pub fn sender(&self) -> String {
        format!("\"{}\" <{}>", self.sender_name, self.sender_email)
    }
}

/// One abuse report addressed to one contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct Report {
    pub recipient: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub addresses: Vec<Address>,
    pub generated_at: DateTime<Utc>,
}

/// Compose the report for one contact.
pub fn compose(
    contact: &str,
    records: &[LookupRecord],
    index: &LogIndex,
    options: &ReportOptions,
) -> Report {
    Report {
        recipient: contact.to_string(),
        sender: options.sender(),
        subject: subject(records),
        body: body(records, index, options),
        addresses: records.iter().map(|r| r.address).collect(),
        generated_at: options.generated_at,
    }
}

/// One report per resolved contact, in group order. The unresolved bucket
/// never produces a report.
pub fn compose_all(
    groups: &ContactGroup,
    index: &LogIndex,
    options: &ReportOptions,
) -> Vec<Report> {
    groups
        .resolved()
        .map(|(contact, records)| compose(contact, records, index, options))
        .collect()
}

fn subject(records: &[LookupRecord]) -> String {
    match records {
        [single] => format!("Abuse report: malicious activity from {}", single.address),
        _ => {
            let org = records
                .first()
                .map(|r| r.organization.as_str())
                .unwrap_or(UNKNOWN_ORGANIZATION);
            format!(
                "Abuse report: malicious activity from {} IP addresses ({org})",
                records.len()
            )
        }
    }
}

fn body(records: &[LookupRecord], index: &LogIndex, options: &ReportOptions) -> String {
    let mut out = String::new();
    out.push_str("Hello,\n\n");
    out.push_str(
        "We have observed abusive activity originating from the following IP \
         address(es), which appear to be under your administration.\n\n",
    );
    out.push_str(&format!(
        "Report generated: {}\n",
        options.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Addresses involved: {}\n\n", records.len()));

    for record in records {
        out.push_str(&format!("{RULE}\n"));
        let lines = index.lines_for(&record.address);
        address_block(&mut out, record, lines, options.max_log_lines);
    }
    out.push_str(&format!("{RULE}\n\n"));

    out.push_str(
        "Please investigate this activity and take appropriate action. \
         Timestamps in the log excerpts are as recorded by our systems.\n\n",
    );
    out.push_str("Regards,\n");
    out.push_str(&format!("{}\n", options.sender_name));
    let organization = options.sender_organization.trim();
    if !organization.is_empty() {
        out.push_str(&format!("{organization}\n"));
    }
    out.push_str(&format!("{}\n", options.sender_email));
    out
}

fn address_block(out: &mut String, record: &LookupRecord, lines: &[String], max_lines: usize) {
    out.push_str(&format!("IP address: {}\n", record.address));
    if let Some(range) = &record.network_range {
        out.push_str(&format!("Network range: {range}\n"));
    }
    if let Some(country) = &record.country {
        out.push_str(&format!("Country: {country}\n"));
    }
    if record.organization != UNKNOWN_ORGANIZATION {
        out.push_str(&format!("Organization: {}\n", record.organization));
    }

    out.push_str(&format!("Log entries ({}):\n", lines.len()));
    for line in lines.iter().take(max_lines) {
        out.push_str(&format!("  {line}\n"));
    }
    if lines.len() > max_lines {
        out.push_str(&format!(
            "  ... and {} more entries\n",
            lines.len() - max_lines
        ));
    }
}

/// Flat listing of the unresolved bucket, or `None` if it is empty/missing.
pub fn summarize_unresolved(groups: &ContactGroup) -> Option<String> {
    let records = groups.get(UNRESOLVED_KEY).filter(|rs| !rs.is_empty())?;

    let mut out = format!(
        "Unresolved addresses ({}): no abuse contact found\n\n",
        records.len()
    );
    for record in records {
        out.push_str(&record.address.to_string());
        if record.organization != UNKNOWN_ORGANIZATION {
            out.push_str(&format!(" ({})", record.organization));
        }
        if let Some(err) = &record.error {
            out.push_str(&format!(" - error: {err}"));
        }
        out.push('\n');
    }
    Some(out)
}
