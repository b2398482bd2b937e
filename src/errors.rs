//! Unified error handling.
//!
//! A `thiserror`-based model with:
//!   * Typed variants for the failure domains of the pipeline
//!   * A coarse categorization layer (`ErrorCategory`), carried on failed
//!     lookup records and in the JSON batch
//!   * Helper constructors
//!   * `From` conversions for common lower-level errors
//!
//! Directory lookup failures never escape the lookup cache: they are
//! rendered through `Display` into `LookupRecord::error`. The remaining
//! variants surface from configuration loading and the report sink.
//!
//! Categories:
//!   - Input: user / configuration issues
//!   - Network: lookup process, socket or timeout problems
//!   - Parse: data-format decoding issues
//!   - Internal: I/O on the output side

use std::io;

use schemars::JsonSchema;
use serde::Serialize;
use thiserror::Error;

/// High-level classification for structured reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Input,
    Network,
    Parse,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Input => "input",
            ErrorCategory::Network => "network",
            ErrorCategory::Parse => "parse",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Primary application error type.
#[derive(Error, Debug)]
pub enum AbuseReportError {
    // ------------------------ Input / Validation ----------------------------
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("No public IP addresses found in input")]
    NothingToDo,

    // ---------------------------- Parsing -----------------------------------
    #[error("Failed to parse {format} configuration: {reason}")]
    ConfigParse { format: String, reason: String },

    #[error("Serialization failed: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    // ----------------------------- Network ----------------------------------
    #[error("lookup for {address} timed out after {seconds}s")]
    LookupTimeout { address: String, seconds: u64 },

    #[error("lookup command '{command}' for {address} failed: {reason}")]
    LookupProcess {
        command: String,
        address: String,
        reason: String,
    },

    #[error("WHOIS query '{query}' to server '{server}' failed: {reason}")]
    WhoisQuery {
        server: String,
        query: String,
        reason: String,
    },

    // ----------------------------- I/O / FS ---------------------------------
    #[error("I/O error during {operation} on {path}: {source}")]
    Io {
        path: String,
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl AbuseReportError {
    /// Categorize the error for structured output.
    pub fn category(&self) -> ErrorCategory {
        use AbuseReportError::*;
        match self {
            Configuration { .. } | NothingToDo => ErrorCategory::Input,

            ConfigParse { .. } | Serialization { .. } => ErrorCategory::Parse,

            LookupTimeout { .. } | LookupProcess { .. } | WhoisQuery { .. } => {
                ErrorCategory::Network
            }

            Io { .. } => ErrorCategory::Internal,
        }
    }

    // ---------------------------- Constructors -----------------------------

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn lookup_timeout(address: impl Into<String>, seconds: u64) -> Self {
        Self::LookupTimeout {
            address: address.into(),
            seconds,
        }
    }

    pub fn lookup_process(
        command: impl Into<String>,
        address: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::LookupProcess {
            command: command.into(),
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn whois_query(
        server: impl Into<String>,
        query: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::WhoisQuery {
            server: server.into(),
            query: query.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<String>, operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }
}

/// Public result alias.
pub type Result<T> = std::result::Result<T, AbuseReportError>;

/// Map standard IO errors into `Io` variant (generic context).
impl From<io::Error> for AbuseReportError {
    fn from(e: io::Error) -> Self {
        AbuseReportError::Io {
            path: "<unknown>".into(),
            operation: "unspecified".into(),
            source: e,
        }
    }
}

impl From<serde_json::Error> for AbuseReportError {
    fn from(e: serde_json::Error) -> Self {
        AbuseReportError::Serialization { source: e }
    }
}

impl From<toml::de::Error> for AbuseReportError {
    fn from(e: toml::de::Error) -> Self {
        AbuseReportError::ConfigParse {
            format: "TOML".into(),
            reason: e.to_string(),
        }
    }
}

/// Extension trait for enriching IO results with path + operation context.
pub trait IoResultExt<T> {
    fn with_path(self, path: impl Into<String>, operation: impl Into<String>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, io::Error> {
    fn with_path(self, path: impl Into<String>, operation: impl Into<String>) -> Result<T> {
        self.map_err(|e| AbuseReportError::io(path.into(), operation.into(), e))
    }
}
