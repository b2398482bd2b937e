//! Configuration management for abusereport.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `ABUSEREPORT_*` environment variables, then command-line flags. Missing
//! or zero values fall back to defaults via [`Config::normalize`];
//! [`Config::validate`] rejects settings the pipeline cannot run with.

use std::fs;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::cli::Cli;
use crate::errors::{AbuseReportError, IoResultExt, Result};
use crate::lookup::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_MIN_INTERVAL, LookupSettings};
use crate::report::{
    DEFAULT_MAX_LOG_LINES, DEFAULT_SENDER_EMAIL, DEFAULT_SENDER_NAME, ReportOptions,
};
use crate::whois::{DirectoryLookup, SystemWhois, TcpWhois};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Who the reports come from
    pub sender: SenderConfig,

    /// Report body shaping and input filtering
    pub report: ReportConfig,

    /// Directory lookup settings
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub email: String,
    pub name: String,
    /// Printed under the name in the signature when non-empty
    pub organization: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Log lines quoted per address
    pub max_log_lines: usize,

    /// Addresses seen on fewer lines than this are ignored
    pub min_occurrences: usize,
}

/// Which directory client performs lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Spawn the system `whois` client
    #[default]
    System,
    /// Speak WHOIS over TCP 43 directly
    Tcp,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub backend: Backend,

    /// Executable used by the system backend
    pub command: String,

    /// First server asked by the TCP backend
    pub server: String,

    /// Maximum referral hops for the TCP backend
    pub max_referral_depth: usize,

    /// Upper bound for one lookup
    pub timeout_secs: u64,

    /// Minimum spacing between two lookups; may be raised, never lowered
    /// below one second
    pub min_interval_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            email: DEFAULT_SENDER_EMAIL.to_string(),
            name: DEFAULT_SENDER_NAME.to_string(),
            organization: String::new(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            min_occurrences: 1,
        }
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            backend: Backend::System,
            command: "whois".to_string(),
            server: "whois.iana.org".to_string(),
            max_referral_depth: 6,
            timeout_secs: DEFAULT_LOOKUP_TIMEOUT.as_secs(),
            min_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_path(path.display().to_string(), "read")?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `ABUSEREPORT_*` variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay environment-style variables from an arbitrary source.
    pub fn apply_env_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("ABUSEREPORT_SENDER_EMAIL") {
            self.sender.email = v;
        }
        if let Some(v) = get("ABUSEREPORT_SENDER_NAME") {
            self.sender.name = v;
        }
        if let Some(v) = get("ABUSEREPORT_SENDER_ORG") {
            self.sender.organization = v;
        }
        if let Some(n) = get("ABUSEREPORT_MAX_LINES").and_then(|v| v.parse().ok()) {
            self.report.max_log_lines = n;
        }
        if let Some(n) = get("ABUSEREPORT_MIN_OCCURRENCES").and_then(|v| v.parse().ok()) {
            self.report.min_occurrences = n;
        }
        if let Some(secs) = get("ABUSEREPORT_LOOKUP_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.lookup.timeout_secs = secs;
        }
        if let Some(v) = get("ABUSEREPORT_WHOIS_COMMAND") {
            self.lookup.command = v;
        }
        if let Some(v) = get("ABUSEREPORT_WHOIS_SERVER") {
            self.lookup.server = v;
        }
    }

    /// Merge with CLI arguments, giving CLI precedence
    pub fn merge_with_cli(&mut self, cli: &Cli) {
        if let Some(ref v) = cli.sender_email {
            self.sender.email = v.clone();
        }
        if let Some(ref v) = cli.sender_name {
            self.sender.name = v.clone();
        }
        if let Some(ref v) = cli.sender_org {
            self.sender.organization = v.clone();
        }
        if let Some(n) = cli.max_lines {
            self.report.max_log_lines = n;
        }
        if let Some(n) = cli.min_occurrences {
            self.report.min_occurrences = n;
        }
        if let Some(backend) = cli.backend {
            self.lookup.backend = backend;
        }
        if let Some(ref v) = cli.whois_command {
            self.lookup.command = v.clone();
        }
        if let Some(ref v) = cli.whois_server {
            self.lookup.server = v.clone();
        }
        if let Some(secs) = cli.timeout {
            self.lookup.timeout_secs = secs;
        }
    }

    /// Replace absent / zero values with defaults.
    pub fn normalize(&mut self) {
        if self.sender.email.trim().is_empty() {
            self.sender.email = DEFAULT_SENDER_EMAIL.to_string();
        }
        if self.sender.name.trim().is_empty() {
            self.sender.name = DEFAULT_SENDER_NAME.to_string();
        }
        if self.report.max_log_lines == 0 {
            self.report.max_log_lines = DEFAULT_MAX_LOG_LINES;
        }
        if self.report.min_occurrences == 0 {
            self.report.min_occurrences = 1;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.lookup.timeout_secs == 0 {
            return Err(AbuseReportError::configuration(
                "lookup.timeout_secs must be greater than 0",
            ));
        }
        if Duration::from_millis(self.lookup.min_interval_ms) < DEFAULT_MIN_INTERVAL {
            return Err(AbuseReportError::configuration(format!(
                "lookup.min_interval_ms must be at least {}",
                DEFAULT_MIN_INTERVAL.as_millis()
            )));
        }
        match self.lookup.backend {
            Backend::System if self.lookup.command.trim().is_empty() => Err(
                AbuseReportError::configuration("lookup.command must name a whois executable"),
            ),
            Backend::Tcp if self.lookup.server.trim().is_empty() => Err(
                AbuseReportError::configuration("lookup.server must name a WHOIS server"),
            ),
            _ => Ok(()),
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            sender_email: self.sender.email.clone(),
            sender_name: self.sender.name.clone(),
            sender_organization: self.sender.organization.clone(),
            max_log_lines: self.report.max_log_lines,
            ..ReportOptions::default()
        }
    }

    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            timeout: Duration::from_secs(self.lookup.timeout_secs),
            min_interval: Duration::from_millis(self.lookup.min_interval_ms),
        }
    }

    /// Directory client selected by `lookup.backend`.
    pub fn directory(&self) -> Box<dyn DirectoryLookup> {
        match self.lookup.backend {
            Backend::System => Box::new(SystemWhois::new(self.lookup.command.clone())),
            Backend::Tcp => Box::new(TcpWhois::new(
                self.lookup.server.clone(),
                self.lookup.max_referral_depth,
                Duration::from_secs(self.lookup.timeout_secs),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.report.max_log_lines, 10);
        assert_eq!(config.report.min_occurrences, 1);
        assert_eq!(config.lookup.timeout_secs, 30);
        assert_eq!(config.lookup.min_interval_ms, 1000);
        assert_eq!(config.lookup.backend, Backend::System);
        assert_eq!(config.sender.email, DEFAULT_SENDER_EMAIL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_overrides() {
        let config = Config::from_toml(
            r#"
            [sender]
            email = "soc@example.org"
            organization = "Example Org"

            [lookup]
            backend = "tcp"
            server = "whois.arin.net"
            "#,
        )
        .unwrap();
        assert_eq!(config.sender.email, "soc@example.org");
        assert_eq!(config.sender.name, DEFAULT_SENDER_NAME);
        assert_eq!(config.lookup.backend, Backend::Tcp);
        assert_eq!(config.lookup.server, "whois.arin.net");
        assert_eq!(config.lookup.timeout_secs, 30);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = Config::from_toml("[report]\nmax_log_lines = \"many\"").unwrap_err();
        assert!(matches!(err, AbuseReportError::ConfigParse { .. }));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("ABUSEREPORT_SENDER_EMAIL", "noc@example.net"),
            ("ABUSEREPORT_MAX_LINES", "25"),
            ("ABUSEREPORT_MIN_OCCURRENCES", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.sender.email, "noc@example.net");
        assert_eq!(config.report.max_log_lines, 25);
        assert_eq!(config.report.min_occurrences, 1);
    }

    #[test]
    fn test_cli_takes_precedence() {
        let mut config = Config::default();
        config.sender.email = "from-file@example.org".into();
        let cli = Cli::parse_from([
            "abusereport",
            "--sender-email",
            "cli@example.org",
            "--max-lines",
            "3",
            "--backend",
            "tcp",
        ]);
        config.merge_with_cli(&cli);

        assert_eq!(config.sender.email, "cli@example.org");
        assert_eq!(config.report.max_log_lines, 3);
        assert_eq!(config.lookup.backend, Backend::Tcp);
    }

    #[test]
    fn test_normalize_fallbacks() {
        let mut config = Config::default();
        config.sender.email = "  ".into();
        config.report.max_log_lines = 0;
        config.report.min_occurrences = 0;
        config.normalize();

        assert_eq!(config.sender.email, DEFAULT_SENDER_EMAIL);
        assert_eq!(config.report.max_log_lines, DEFAULT_MAX_LOG_LINES);
        assert_eq!(config.report.min_occurrences, 1);
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.lookup.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.lookup.command = String::new();
        assert!(config.validate().is_err());
        config.lookup.backend = Backend::Tcp;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lookup_spacing_cannot_drop_below_one_second() {
        let mut config = Config::from_toml("[lookup]\nmin_interval_ms = 0\n").unwrap();
        config.normalize();
        assert!(config.validate().is_err());

        config.lookup.min_interval_ms = 999;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_interval_ms"), "{err}");

        config.lookup.min_interval_ms = 1000;
        assert!(config.validate().is_ok());
        config.lookup.min_interval_ms = 5000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = Config::default();
        config.sender.organization = "Example Org".into();
        config.lookup.min_interval_ms = 2500;

        let opts = config.report_options();
        assert_eq!(opts.sender_organization, "Example Org");
        assert_eq!(opts.max_log_lines, 10);
        assert_eq!(
            config.lookup_settings().min_interval,
            Duration::from_millis(2500)
        );
        assert!(config.directory().describe().starts_with("whois"));
    }
}
