//! Error types for the discovery system.

use std::fmt;

use crate::ServiceKind;

/// Error type for discovery operations.
///
/// Individual probe attempts never surface these to callers; only exhaustive
/// failure (no candidate answered with a description) or a document without
/// the requested service is reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    /// Network-related errors (connection refused, DNS, TLS, etc.)
    NetworkError(String),
    /// Parsing errors (XML, URL)
    ParseError(String),
    /// Operation timed out waiting for a response
    Timeout,
    /// No candidate produced a usable device description
    NotFound { host: String, attempts: usize },
    /// The description has no service block for the requested kind
    CapabilityMissing(ServiceKind),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DiscoveryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DiscoveryError::Timeout => write!(f, "Operation timed out"),
            DiscoveryError::NotFound { host, attempts } => write!(
                f,
                "No device description found on {} after {} attempt(s)",
                host, attempts
            ),
            DiscoveryError::CapabilityMissing(kind) => {
                write!(f, "Device has no {} service", kind.name())
            }
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
