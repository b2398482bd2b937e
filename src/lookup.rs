//! Run-scoped lookup cache with a minimum spacing between directory queries.
//!
//! Every distinct address is queried at most once per run. Queries are
//! issued strictly one at a time, in input order, and each new query waits
//! until at least `min_interval` has passed since the previous one was
//! *issued*. Cache hits neither wait nor move the rate-limit clock.
//!
//! Failures (timeout, process error, socket error) are folded into the
//! returned [`LookupRecord`] and cached like successes; nothing here
//! returns an error to the caller.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use schemars::JsonSchema;
use serde::Serialize;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::errors::{AbuseReportError, ErrorCategory};
use crate::netutil::Address;
use crate::parser::{self, UNKNOWN_ORGANIZATION};
use crate::whois::DirectoryLookup;

/// Default upper bound for a single directory query.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default minimum spacing between two issued queries.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

/// Outcome of resolving one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct LookupRecord {
    pub address: Address,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub abuse_contact: Option<String>,

    pub organization: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_range: Option<String>,

    /// Two-letter, upper-case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Raw directory text, kept only for successful lookups.
    #[serde(skip)]
    pub raw: Option<String>,

    /// Set only when the lookup failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Coarse class of `error`, when it came from a typed failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl LookupRecord {
    /// Build a record from a successful directory response.
    pub fn from_response(address: Address, raw: String) -> Self {
        let parsed = parser::parse(&raw);
        Self {
            address,
            abuse_contact: parsed.abuse_contact,
            organization: parsed.organization,
            network_range: parsed.network_range,
            country: parsed.country,
            raw: Some(raw),
            error: None,
            error_category: None,
        }
    }

    /// Build a record for a failed lookup: defaults everywhere, error set.
    pub fn failed(address: Address, error: impl Into<String>) -> Self {
        Self {
            address,
            abuse_contact: None,
            organization: UNKNOWN_ORGANIZATION.to_string(),
            network_range: None,
            country: None,
            raw: None,
            error: Some(error.into()),
            error_category: None,
        }
    }

    /// Failed record carrying the message and category of `error`.
    pub fn from_error(address: Address, error: &AbuseReportError) -> Self {
        Self {
            error_category: Some(error.category()),
            ..Self::failed(address, error.to_string())
        }
    }

    /// Abuse contact if present and non-empty.
    pub fn contact(&self) -> Option<&str> {
        self.abuse_contact.as_deref().filter(|c| !c.trim().is_empty())
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Spacing policy for directory queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupSettings {
    pub timeout: Duration,
    pub min_interval: Duration,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

/// Enforces a minimum delay between successive query issues.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_issued: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_issued: None,
        }
    }

    /// Suspend until a new query may be issued, then stamp the issue time.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_issued {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(?wait, "rate limiter waiting before next lookup");
                sleep(wait).await;
            }
        }
        self.last_issued = Some(Instant::now());
    }
}

/// Deduplicating, rate-limited front for a [`DirectoryLookup`].
pub struct LookupCache {
    lookup: Box<dyn DirectoryLookup>,
    settings: LookupSettings,
    limiter: RateLimiter,
    cache: HashMap<Address, LookupRecord>,
    queries_issued: usize,
}

impl LookupCache {
    pub fn new<L: DirectoryLookup + 'static>(lookup: L, settings: LookupSettings) -> Self {
        Self::from_boxed(Box::new(lookup), settings)
    }

    pub fn from_boxed(lookup: Box<dyn DirectoryLookup>, settings: LookupSettings) -> Self {
        Self {
            lookup,
            settings,
            limiter: RateLimiter::new(settings.min_interval),
            cache: HashMap::new(),
            queries_issued: 0,
        }
    }

    /// Resolve one address, querying the directory only on a cache miss.
    pub async fn resolve(&mut self, addr: &Address) -> LookupRecord {
        if let Some(hit) = self.cache.get(addr) {
            debug!(%addr, "lookup cache hit");
            return hit.clone();
        }

        self.limiter.acquire().await;
        self.queries_issued += 1;
        info!(%addr, via = %self.lookup.describe(), "querying directory");

        let record = match timeout(self.settings.timeout, self.lookup.lookup(addr)).await {
            Ok(Ok(raw)) => LookupRecord::from_response(*addr, raw),
            Ok(Err(e)) => {
                warn!(%addr, category = %e.category(), error = %e, "lookup failed");
                LookupRecord::from_error(*addr, &e)
            }
            Err(_) => {
                let e = AbuseReportError::lookup_timeout(
                    addr.to_string(),
                    self.settings.timeout.as_secs(),
                );
                warn!(%addr, error = %e, "lookup timed out");
                LookupRecord::from_error(*addr, &e)
            }
        };

        self.cache.insert(*addr, record.clone());
        record
    }

    /// Resolve every address sequentially, in input order.
    ///
    /// `progress` is called with `(address, 1-based index, total)` after each
    /// address has been handled. The returned records follow input order,
    /// one per distinct address.
    pub async fn resolve_all<F>(&mut self, addrs: &[Address], mut progress: F) -> Vec<LookupRecord>
    where
        F: FnMut(&Address, usize, usize),
    {
        let total = addrs.len();
        let mut records: Vec<LookupRecord> = Vec::with_capacity(total);
        let mut seen = HashSet::with_capacity(total);
        for (i, addr) in addrs.iter().enumerate() {
            let record = self.resolve(addr).await;
            progress(addr, i + 1, total);
            if seen.insert(*addr) {
                records.push(record);
            }
        }
        records
    }

    /// Number of directory queries actually issued.
    pub fn queries_issued(&self) -> usize {
        self.queries_issued
    }
}
