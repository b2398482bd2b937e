use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::errors::{AbuseReportError, Result};
use crate::netutil::Address;

/// WHOIS TCP port.
const WHOIS_PORT: u16 = 43;

// "refer: whois.ripe.net" OR "ReferralServer: whois://whois.ripe.net"
static RE_REFER_PLAIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\s*refer:\s*([A-Z0-9._\-]+)\s*$").unwrap());
static RE_REFERRAL_SERVER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*ReferralServer:\s*(?:r?whois://)?([A-Z0-9._\-]+)(?::\d+)?/?\s*$")
        .unwrap()
});

/// External directory that maps one address to free-form registry text.
///
/// Implementations do not enforce an overall deadline; the lookup cache
/// wraps every call in its own timeout.
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn lookup(&self, addr: &Address) -> Result<String>;

    /// Short human-readable description used in logs.
    fn describe(&self) -> String;
}

/// Runs the system `whois` client (`<command> <address>`) and captures stdout.
#[derive(Debug, Clone)]
pub struct SystemWhois {
    command: String,
}

impl SystemWhois {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for SystemWhois {
    fn default() -> Self {
        Self::new("whois")
    }
}

#[async_trait]
impl DirectoryLookup for SystemWhois {
    async fn lookup(&self, addr: &Address) -> Result<String> {
        let target = addr.to_string();
        debug!(command = %self.command, %target, "spawning whois");

        let output = Command::new(&self.command)
            .arg(&target)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AbuseReportError::lookup_process(&self.command, &target, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let reason = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                format!("exited with {}: {stderr}", output.status)
            };
            return Err(AbuseReportError::lookup_process(&self.command, &target, reason));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn describe(&self) -> String {
        format!("{} <address>", self.command)
    }
}

/// Speaks the WHOIS protocol directly, starting at `server` and following
/// `refer:` / `ReferralServer:` hints up to `max_depth` hops.
#[derive(Debug, Clone)]
pub struct TcpWhois {
    server: String,
    max_depth: usize,
    io_timeout: Duration,
}

impl TcpWhois {
    pub fn new(server: impl Into<String>, max_depth: usize, io_timeout: Duration) -> Self {
        Self {
            server: server.into(),
            max_depth: max_depth.max(1),
            io_timeout,
        }
    }
}

#[async_trait]
impl DirectoryLookup for TcpWhois {
    async fn lookup(&self, addr: &Address) -> Result<String> {
        let query = addr.to_string();
        let mut server = self.server.clone();
        let mut last: Option<String> = None;

        for depth in 0..self.max_depth {
            debug!(depth, %server, %query, "WHOIS query");

            let resp = match simple_whois(&server, &query, self.io_timeout).await {
                Ok(r) => r,
                Err(e) => match last {
                    // Keep what the previous hop told us rather than nothing.
                    Some(prev) => {
                        warn!(%server, error = %e, "WHOIS referral failed");
                        return Ok(prev);
                    }
                    None => return Err(e),
                },
            };

            let next = referral(&resp);
            last = Some(resp);
            match next {
                Some(n) if !n.eq_ignore_ascii_case(&server) => {
                    debug!(from = %server, to = %n, "WHOIS referral");
                    server = n;
                }
                _ => break,
            }
        }

        last.ok_or_else(|| AbuseReportError::whois_query(&self.server, &query, "no response"))
    }

    fn describe(&self) -> String {
        format!("whois -h {}", self.server)
    }
}

/// Referral target announced by a WHOIS response (explicit `refer:` first).
pub fn referral(resp: &str) -> Option<String> {
    RE_REFER_PLAIN
        .captures(resp)
        .or_else(|| RE_REFERRAL_SERVER.captures(resp))
        .and_then(|c| c.get(1).map(|m| m.as_str().to_ascii_lowercase()))
}

/// Perform a basic WHOIS query (over TCP 43) with a per-step timeout.
///
/// Returns the raw textual response.
pub async fn simple_whois(server: &str, query: &str, to: Duration) -> Result<String> {
    let mut stream = match timeout(to, TcpStream::connect((server, WHOIS_PORT))).await {
        Ok(Ok(s)) => s,
        Ok(Err(e)) => {
            return Err(AbuseReportError::whois_query(
                server,
                query,
                format!("connect error: {e}"),
            ));
        }
        Err(_) => return Err(AbuseReportError::whois_query(server, query, "connect timeout")),
    };

    // Canonical WHOIS request: "<query>\r\n"
    let line = format!("{query}\r\n");
    match timeout(to, stream.write_all(line.as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(AbuseReportError::whois_query(server, query, e.to_string())),
        Err(_) => return Err(AbuseReportError::whois_query(server, query, "write timeout")),
    }

    let mut buf = Vec::new();
    match timeout(to, stream.read_to_end(&mut buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(AbuseReportError::whois_query(server, query, e.to_string())),
        Err(_) => return Err(AbuseReportError::whois_query(server, query, "read timeout")),
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}
