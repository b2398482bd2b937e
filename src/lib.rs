//! AbuseReport Library
//!
//! Turns raw log text into abuse reports addressed to the parties
//! responsible for the offending networks:
//!
//! - Extract IPv4/IPv6 literals from log lines and drop private ranges
//! - Index which log lines mention each public address
//! - Look up each address in the WHOIS directory (cached, rate limited)
//! - Parse abuse contact, organization, network range and country
//! - Group addresses by abuse contact and compose one report per contact
//!
//! # Example
//!
//! ```rust,no_run
//! use abusereport::aggregate::group;
//! use abusereport::log_index::LogIndex;
//! use abusereport::lookup::{LookupCache, LookupSettings};
//! use abusereport::report::{ReportOptions, compose_all};
//! use abusereport::whois::SystemWhois;
//!
//! # async fn run() {
//! let index = LogIndex::build(["Failed password for root from 203.0.113.5 port 22"]);
//! let mut cache = LookupCache::new(SystemWhois::default(), LookupSettings::default());
//! let records = cache.resolve_all(&index.addresses(), |_, _, _| {}).await;
//! let reports = compose_all(&group(records), &index, &ReportOptions::default());
//! for report in reports {
//!     println!("{}: {}", report.recipient, report.subject);
//! }
//! # }
//! ```

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod errors;
pub mod log_index;
pub mod lookup;
pub mod netutil;
pub mod output;
pub mod parser;
pub mod report;
pub mod whois;

// Re-export commonly used types and functions for convenience
pub use aggregate::{ContactGroup, UNRESOLVED_KEY, group};
pub use errors::{AbuseReportError, Result};
pub use log_index::LogIndex;
pub use lookup::{LookupCache, LookupRecord, LookupSettings};
pub use netutil::{Address, classify, extract, is_private};
pub use report::{Report, ReportOptions, compose, compose_all, summarize_unresolved};
pub use whois::DirectoryLookup;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
