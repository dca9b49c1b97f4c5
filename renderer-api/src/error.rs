use renderer_discovery::DiscoveryError;
use thiserror::Error;
use wire_client::WireError;

/// Message shown to users whenever a control call fails
pub const USER_FACING_MESSAGE: &str = "control unavailable";

/// Failures surfaced by renderer control operations
///
/// Transport and parser specifics are folded into four outcomes a caller can
/// act on. Nothing here is retried; re-issuing a call is the caller's choice.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Connection, timeout or HTTP-level failure, or no description located
    #[error("Renderer unreachable: {0}")]
    Unreachable(String),

    /// A reply arrived but could not be read into the expected shape
    #[error("Malformed reply: {0}")]
    Malformed(String),

    /// The renderer does not offer the requested service or action
    #[error("Capability missing: {0}")]
    CapabilityMissing(String),

    /// The renderer returned a structured error for the request
    #[error("Rejected by renderer: error code {code}{}", describe(.description))]
    Rejected {
        code: i32,
        description: Option<String>,
    },

    /// The request could not be expressed (bad argument, channel name, profile)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

fn describe(description: &Option<String>) -> String {
    description
        .as_ref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

impl ControlError {
    /// The string shown to end users, whatever went wrong underneath
    pub fn user_message(&self) -> &'static str {
        USER_FACING_MESSAGE
    }

    /// Whether this failure counts against a cached control descriptor
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ControlError::Unreachable(_))
    }

    pub(crate) fn action_missing(service: &str, action: &str) -> Self {
        ControlError::CapabilityMissing(format!("{} does not list {}", service, action))
    }
}

/// Type alias for results that can return a ControlError
pub type Result<T> = std::result::Result<T, ControlError>;

impl From<WireError> for ControlError {
    fn from(error: WireError) -> Self {
        match error {
            WireError::Network(msg) => ControlError::Unreachable(msg),
            WireError::Http(status) => ControlError::Unreachable(format!("HTTP status {}", status)),
            WireError::Parse(msg) => ControlError::Malformed(msg),
            WireError::Fault { code, description } => ControlError::Rejected { code, description },
            WireError::InvalidEnvelope(msg) => ControlError::InvalidParameter(msg),
        }
    }
}

impl From<DiscoveryError> for ControlError {
    fn from(error: DiscoveryError) -> Self {
        match error {
            DiscoveryError::CapabilityMissing(kind) => {
                ControlError::CapabilityMissing(format!("no {} service", kind.name()))
            }
            DiscoveryError::ParseError(msg) => ControlError::Malformed(msg),
            other @ (DiscoveryError::NetworkError(_)
            | DiscoveryError::Timeout
            | DiscoveryError::NotFound { .. }) => ControlError::Unreachable(other.to_string()),
        }
    }
}

impl From<crate::operation::ValidationError> for ControlError {
    fn from(validation_error: crate::operation::ValidationError) -> Self {
        ControlError::InvalidParameter(validation_error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_discovery::ServiceKind;

    #[test]
    fn test_wire_error_conversion() {
        let err: ControlError = WireError::Network("connection refused".to_string()).into();
        assert!(matches!(err, ControlError::Unreachable(_)));

        let err: ControlError = WireError::Http(503).into();
        assert!(err.is_unreachable());

        let err: ControlError = WireError::Parse("invalid XML".to_string()).into();
        assert!(matches!(err, ControlError::Malformed(_)));

        let err: ControlError = WireError::Fault {
            code: 402,
            description: Some("Invalid Args".to_string()),
        }
        .into();
        assert!(matches!(err, ControlError::Rejected { code: 402, .. }));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn test_discovery_error_conversion() {
        let err: ControlError = DiscoveryError::NotFound {
            host: "10.0.0.4".to_string(),
            attempts: 7,
        }
        .into();
        assert!(err.is_unreachable());
        assert!(err.to_string().contains("10.0.0.4"));

        let err: ControlError = DiscoveryError::CapabilityMissing(ServiceKind::AVTransport).into();
        assert_eq!(err.to_string(), "Capability missing: no AVTransport service");
    }

    #[test]
    fn test_user_message_hides_details() {
        let errors = [
            ControlError::Unreachable("timed out".to_string()),
            ControlError::Malformed("bad".to_string()),
            ControlError::CapabilityMissing("x".to_string()),
            ControlError::Rejected {
                code: 501,
                description: None,
            },
        ];
        for err in errors {
            assert_eq!(err.user_message(), "control unavailable");
        }
    }

    #[test]
    fn test_rejected_display() {
        let err = ControlError::Rejected {
            code: 501,
            description: Some("Action Failed".to_string()),
        };
        assert_eq!(err.to_string(), "Rejected by renderer: error code 501 (Action Failed)");
    }
}
