//! Transport probing.
//!
//! Renderers publish their description document on vendor-specific ports and
//! paths. The prober walks a ranked candidate list strictly in order, one
//! bounded attempt at a time, and stops at the first body that looks like a
//! device description. Failed attempts are logged and swallowed; only
//! exhausting the list is reported.

use std::time::Duration;

use tracing::{debug, trace};

use crate::description::looks_like_description;
use crate::endpoint::{Endpoint, Scheme};
use crate::error::{DiscoveryError, Result};

/// Default per-attempt timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2500);

/// One (port, path) combination to try on a host
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeCandidate {
    pub port: u16,
    pub path: String,
    pub scheme: Scheme,
}

impl ProbeCandidate {
    pub fn http(port: u16, path: impl Into<String>) -> Self {
        Self {
            port,
            path: path.into(),
            scheme: Scheme::Http,
        }
    }

    fn endpoint(&self, host: &str) -> Endpoint {
        Endpoint::new(host, self.port).with_scheme(self.scheme)
    }
}

/// Well-known description locations, most common first
pub fn default_candidates() -> Vec<ProbeCandidate> {
    vec![
        ProbeCandidate::http(49152, "/description.xml"),
        ProbeCandidate::http(1400, "/xml/device_description.xml"),
        ProbeCandidate::http(49152, "/desc.xml"),
        ProbeCandidate::http(8080, "/description.xml"),
        ProbeCandidate::http(80, "/description.xml"),
        ProbeCandidate::http(49153, "/description.xml"),
        ProbeCandidate::http(49154, "/description.xml"),
    ]
}

/// Raw reply to a document fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub status: u16,
    pub body: String,
}

impl FetchedDocument {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches a document with a bounded timeout
pub trait DescriptionFetcher: Send + Sync {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedDocument>;
}

/// Blocking HTTP fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DEFAULT_PROBE_TIMEOUT)
            .build()
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl DescriptionFetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedDocument> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DiscoveryError::Timeout
                } else {
                    DiscoveryError::NetworkError(format!("Failed to fetch {}: {}", url, e))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to read response body: {}", e)))?;

        Ok(FetchedDocument { status, body })
    }
}

/// A located description document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHit {
    pub endpoint: Endpoint,
    /// Absolute URL the document was fetched from
    pub location: String,
    pub document: String,
}

/// Walks probe candidates in order until one yields a description
#[derive(Debug, Clone)]
pub struct TransportProber<F = HttpFetcher> {
    fetcher: F,
    timeout: Duration,
}

impl TransportProber<HttpFetcher> {
    /// Prober over HTTP with the default per-attempt timeout
    pub fn new() -> Result<Self> {
        Ok(Self::with_fetcher(HttpFetcher::new()?))
    }
}

impl<F: DescriptionFetcher> TransportProber<F> {
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Try each candidate on `host` in order.
    ///
    /// Each attempt resolves (reply, error or timeout) before the next one
    /// starts. Returns the first structurally valid description.
    pub fn probe(&self, host: &str, candidates: &[ProbeCandidate]) -> Result<ProbeHit> {
        for (attempt, candidate) in candidates.iter().enumerate() {
            let endpoint = candidate.endpoint(host);
            let location = endpoint.url_for(&candidate.path);
            trace!(%location, attempt, "probing for device description");

            match self.fetcher.fetch(&location, self.timeout) {
                Ok(doc) if doc.is_success() && looks_like_description(&doc.body) => {
                    debug!(%location, "device description found");
                    return Ok(ProbeHit {
                        endpoint,
                        location,
                        document: doc.body,
                    });
                }
                Ok(doc) => {
                    debug!(%location, status = doc.status, "candidate did not return a description");
                }
                Err(e) => {
                    debug!(%location, error = %e, "probe attempt failed");
                }
            }
        }

        Err(DiscoveryError::NotFound {
            host: host.to_string(),
            attempts: candidates.len(),
        })
    }
}
