//! Error types for the wire client

use thiserror::Error;

/// Errors that can occur while building or exchanging a control request
#[derive(Debug, Error)]
pub enum WireError {
    /// Connection, DNS or timeout failure before a status line was received
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// Non-success HTTP status without a structured fault in the body
    #[error("HTTP status {0}")]
    Http(u16),

    /// Response received but not parseable into the expected shape
    #[error("Response parsing error: {0}")]
    Parse(String),

    /// Structured error returned by the device (SOAP fault or JSON-RPC error object)
    #[error("Device fault: error code {code}{}", fault_suffix(.description))]
    Fault {
        code: i32,
        description: Option<String>,
    },

    /// The request could not be expressed as a well-formed envelope
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),
}

fn fault_suffix(description: &Option<String>) -> String {
    match description {
        Some(d) => format!(" ({})", d),
        None => String::new(),
    }
}

impl WireError {
    /// True when the failure happened before the device produced any reply
    pub fn is_unreachable(&self) -> bool {
        matches!(self, WireError::Network(_) | WireError::Http(_))
    }
}
