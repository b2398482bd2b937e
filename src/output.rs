//! Output sinks for composed reports.
//!
//! Reports can be rendered as plain text or as a structured JSON batch on
//! stdout, or persisted as one file per report under a directory per
//! provider (the registrable domain of the contact address).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::ContactGroup;
use crate::errors::{IoResultExt, Result};
use crate::lookup::LookupRecord;
use crate::report::{Report, summarize_unresolved};

const SEPARATOR: &str = "========================================";

/// File written at the root of the output directory for the unresolved bucket.
pub const UNRESOLVED_FILE: &str = "unresolved.txt";

/// Everything one run produced, in serializable form.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct ReportBatch {
    /// Tool version and metadata
    pub metadata: BatchMetadata,

    /// One report per resolved abuse contact
    pub reports: Vec<Report>,

    /// Addresses for which no abuse contact was found
    pub unresolved: Vec<LookupRecord>,

    /// Human-readable listing of `unresolved`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved_summary: Option<String>,

    /// Counters for the run
    pub statistics: BatchStatistics,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct BatchMetadata {
    pub tool_name: String,
    pub version: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct BatchStatistics {
    /// Input lines read
    pub lines_read: usize,

    /// Distinct public addresses after filtering
    pub public_addresses: usize,

    /// Directory lookups actually issued (cache misses)
    pub lookups_issued: usize,

    /// Reports composed
    pub reports: usize,

    /// Addresses left without a contact
    pub unresolved: usize,

    /// Unresolved addresses whose lookup itself failed
    pub lookup_failures: usize,
}

impl ReportBatch {
    pub fn new(
        reports: Vec<Report>,
        groups: &ContactGroup,
        mut statistics: BatchStatistics,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let unresolved = groups.unresolved().map(<[_]>::to_vec).unwrap_or_default();
        statistics.reports = reports.len();
        statistics.unresolved = unresolved.len();
        statistics.lookup_failures = unresolved.iter().filter(|r| r.is_failure()).count();
        Self {
            metadata: BatchMetadata {
                tool_name: crate::NAME.to_string(),
                version: crate::VERSION.to_string(),
                generated_at,
            },
            reports,
            unresolved,
            unresolved_summary: summarize_unresolved(groups),
            statistics,
        }
    }

    /// Generate JSON schema for this output format
    pub fn generate_json_schema() -> Result<String> {
        let schema = schemars::schema_for!(ReportBatch);
        Ok(serde_json::to_string_pretty(&schema)?)
    }
}

/// Output formatter trait
pub trait OutputFormatter {
    /// Render a whole batch
    fn format_batch(&self, batch: &ReportBatch) -> Result<String>;

    /// Get the MIME type for this format
    fn mime_type(&self) -> &'static str;

    /// Get the file extension for this format
    fn file_extension(&self) -> &'static str;
}

/// Plain-text output: every report as a mail-like message, then the
/// unresolved listing.
pub struct TextFormatter;

impl OutputFormatter for TextFormatter {
    fn format_batch(&self, batch: &ReportBatch) -> Result<String> {
        let mut output = String::new();

        if batch.reports.is_empty() {
            output.push_str("No abuse reports generated: no abuse contact could be resolved\n");
        }
        for report in &batch.reports {
            output.push_str(&format!("{SEPARATOR}\n"));
            output.push_str(&render_report(report));
        }
        if !batch.reports.is_empty() {
            output.push_str(&format!("{SEPARATOR}\n"));
        }

        if let Some(summary) = &batch.unresolved_summary {
            output.push('\n');
            output.push_str(summary);
        }
        Ok(output)
    }

    fn mime_type(&self) -> &'static str {
        "text/plain"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

/// JSON output formatter
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_batch(&self, batch: &ReportBatch) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(batch)?
        } else {
            serde_json::to_string(batch)?
        };
        Ok(format!("{json}\n"))
    }

    fn mime_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}

/// Header block plus body of a single report.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: {}\n", report.sender));
    out.push_str(&format!("To: {}\n", report.recipient));
    out.push_str(&format!("Subject: {}\n", report.subject));
    out.push('\n');
    out.push_str(&report.body);
    out
}

/// Directory name for a contact: the registrable domain of its email
/// address, falling back to the full domain when the public suffix list
/// has no answer.
pub fn provider_dir(contact: &str) -> String {
    let domain = contact
        .rsplit_once('@')
        .map(|(_, d)| d)
        .unwrap_or(contact)
        .trim()
        .trim_end_matches('.')
        .to_lowercase();
    let registrable = psl::domain_str(&domain).unwrap_or(&domain);
    sanitize(registrable)
}

fn local_part(contact: &str) -> String {
    let local = contact.split_once('@').map(|(l, _)| l).unwrap_or(contact);
    sanitize(local)
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "unknown".to_string(),
        s => s.to_string(),
    }
}

/// Persist a batch under `dir`: `<provider>/<local-part>_<n>.txt` for each
/// report and `unresolved.txt` at the root when there is anything unresolved.
/// Returns the written paths in write order.
pub fn write_reports(dir: &Path, batch: &ReportBatch) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_path(dir.display().to_string(), "create directory")?;

    let text = TextFormatter;
    let mut written = Vec::new();
    let mut counters: HashMap<(String, String), usize> = HashMap::new();

    for report in &batch.reports {
        let provider = provider_dir(&report.recipient);
        let local = local_part(&report.recipient);
        let provider_path = dir.join(&provider);
        fs::create_dir_all(&provider_path)
            .with_path(provider_path.display().to_string(), "create directory")?;

        let n = counters.entry((provider, local.clone())).or_insert(0);
        *n += 1;
        let path = provider_path.join(format!("{local}_{n}.{}", text.file_extension()));
        fs::write(&path, render_report(report)).with_path(path.display().to_string(), "write")?;
        debug!(path = %path.display(), recipient = %report.recipient, "wrote report");
        written.push(path);
    }

    if let Some(summary) = &batch.unresolved_summary {
        let path = dir.join(UNRESOLVED_FILE);
        fs::write(&path, summary).with_path(path.display().to_string(), "write")?;
        written.push(path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::group;
    use crate::log_index::LogIndex;
    use crate::report::{ReportOptions, compose_all};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(ip: &str, contact: Option<&str>) -> LookupRecord {
        let mut r = LookupRecord::failed(ip.parse().unwrap(), "x");
        r.error = None;
        r.abuse_contact = contact.map(str::to_string);
        r
    }

    fn batch(records: Vec<LookupRecord>) -> ReportBatch {
        let when = Utc.with_ymd_and_hms(2024, 9, 17, 8, 0, 0).unwrap();
        let options = ReportOptions {
            generated_at: when,
            ..ReportOptions::default()
        };
        let groups = group(records);
        let reports = compose_all(&groups, &LogIndex::default(), &options);
        ReportBatch::new(reports, &groups, BatchStatistics::default(), when)
    }

    #[test]
    fn test_provider_dir_uses_registrable_domain() {
        assert_eq!(provider_dir("abuse@mail.example.co.uk"), "example.co.uk");
        assert_eq!(provider_dir("abuse@ripe.net"), "ripe.net");
        assert_eq!(provider_dir("Abuse@Support.Example.COM"), "example.com");
    }

    #[test]
    fn test_text_formatter_headers_and_summary() {
        let b = batch(vec![
            record("203.0.113.5", Some("abuse@a.net")),
            record("203.0.113.9", None),
        ]);
        let text = TextFormatter.format_batch(&b).unwrap();

        assert!(text.contains("To: abuse@a.net"));
        assert!(text.contains("From: \"Abuse Reporter\" <abuse-reports@localhost>"));
        assert!(text.contains("Subject: Abuse report: malicious activity from 203.0.113.5"));
        assert!(text.contains("Unresolved addresses (1)"));
    }

    #[test]
    fn test_text_formatter_without_reports() {
        let b = batch(vec![record("203.0.113.9", None)]);
        let text = TextFormatter.format_batch(&b).unwrap();
        assert!(text.starts_with("No abuse reports generated"));
        assert!(text.contains("203.0.113.9"));
    }

    #[test]
    fn test_json_batch_shape() {
        let b = batch(vec![
            record("203.0.113.5", Some("abuse@a.net")),
            record("203.0.113.9", None),
        ]);
        let json = JsonFormatter::new(true).format_batch(&b).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["tool_name"], crate::NAME);
        assert_eq!(value["reports"][0]["recipient"], "abuse@a.net");
        assert_eq!(value["reports"][0]["addresses"][0], "203.0.113.5");
        assert_eq!(value["unresolved"][0]["address"], "203.0.113.9");
        assert_eq!(value["statistics"]["reports"], 1);
        assert_eq!(value["statistics"]["unresolved"], 1);
        assert_eq!(value["statistics"]["lookup_failures"], 0);
    }

    #[test]
    fn test_json_carries_failure_category() {
        let failed = LookupRecord::from_error(
            "198.51.100.7".parse().unwrap(),
            &crate::errors::AbuseReportError::lookup_timeout("198.51.100.7", 30),
        );
        let b = batch(vec![record("203.0.113.9", None), failed]);
        assert_eq!(b.statistics.unresolved, 2);
        assert_eq!(b.statistics.lookup_failures, 1);

        let value: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(false).format_batch(&b).unwrap()).unwrap();
        assert_eq!(value["unresolved"][1]["error_category"], "network");
        assert!(value["unresolved"][0].get("error_category").is_none());
    }

    #[test]
    fn test_schema_generation() {
        let schema = ReportBatch::generate_json_schema().unwrap();
        assert!(schema.contains("ReportBatch"));
        assert!(schema.contains("unresolved"));
    }

    #[test]
    fn test_write_reports_layout() {
        let dir = TempDir::new().unwrap();
        let b = batch(vec![
            record("203.0.113.5", Some("abuse@mail.a.net")),
            record("198.51.100.1", Some("abuse@b.org")),
            record("203.0.113.9", None),
        ]);
        let written = write_reports(dir.path(), &b).unwrap();

        assert_eq!(written.len(), 3);
        let a = dir.path().join("a.net").join("abuse_1.txt");
        assert!(a.exists());
        assert!(dir.path().join("b.org").join("abuse_1.txt").exists());
        let content = fs::read_to_string(a).unwrap();
        assert!(content.starts_with("From: "));
        assert!(content.contains("To: abuse@mail.a.net"));
        let unresolved = fs::read_to_string(dir.path().join(UNRESOLVED_FILE)).unwrap();
        assert!(unresolved.contains("203.0.113.9"));
    }

    #[test]
    fn test_write_reports_numbers_same_mailbox() {
        let dir = TempDir::new().unwrap();
        let b = batch(vec![
            record("203.0.113.5", Some("abuse@a.net")),
            record("203.0.113.6", Some("abuse@noc.a.net")),
        ]);
        write_reports(dir.path(), &b).unwrap();

        assert!(dir.path().join("a.net").join("abuse_1.txt").exists());
        assert!(dir.path().join("a.net").join("abuse_2.txt").exists());
        assert!(!dir.path().join(UNRESOLVED_FILE).exists());
    }
}
