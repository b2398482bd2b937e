use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::config::Backend;

/// Command-line interface definition.
///
/// Log lines are read from standard input. Verbosity:
///   (none) - warnings and errors only
///   -v     - lookup progress
///   -vv    - debug (cache hits, rate-limit waits, referrals)
#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Extract public IP addresses from logs on stdin, look up their abuse contacts and compose per-provider abuse reports"
)]
pub struct Cli {
    /// Sender email address used in report headers and signature
    #[arg(long, value_name = "EMAIL")]
    pub sender_email: Option<String>,

    /// Sender display name
    #[arg(long, value_name = "NAME")]
    pub sender_name: Option<String>,

    /// Sender organization printed in the signature
    #[arg(long, value_name = "ORG")]
    pub sender_org: Option<String>,

    /// Maximum log lines quoted per address (default 10)
    #[arg(long, value_name = "N")]
    pub max_lines: Option<usize>,

    /// Ignore addresses seen on fewer lines than this (default 1)
    #[arg(long, value_name = "N")]
    pub min_occurrences: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Write reports into per-provider directories under DIR instead of stdout
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory lookup backend
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// whois executable used by the system backend
    #[arg(long, value_name = "PATH")]
    pub whois_command: Option<String>,

    /// First WHOIS server asked by the tcp backend
    #[arg(long, value_name = "HOST")]
    pub whois_server: Option<String>,

    /// Lookup timeout in seconds (default 30)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the JSON schema of the `--format json` output and exit
    #[arg(long)]
    pub generate_schema: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

/// Rendering of the final reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    /// Parse CLI arguments from process args.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Default tracing filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}
