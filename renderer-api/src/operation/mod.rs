//! Typed operation framework
//!
//! Each renderer action is a zero-sized operation type that knows its
//! service, its action name, how to turn a typed request into wire arguments
//! and how to read the typed response back out of the reply element. Most
//! operations are generated by the macros in [`macros`].

pub mod macros;

use renderer_discovery::ServiceKind;
use serde_json::Value;
use wire_client::ParamValue;
use xmltree::Element;

use crate::error::ControlError;

/// Wire arguments of a request, in the order the action declares them
pub type ActionParams = Vec<(&'static str, ParamValue)>;

/// Validation error types
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Parameter '{parameter}' value '{value}' is out of range ({min}..={max})")]
    RangeError {
        parameter: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Parameter '{parameter}' value '{value}' is invalid: {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Required parameter '{parameter}' is missing")]
    MissingParameter { parameter: String },
}

impl ValidationError {
    pub fn range_error(
        parameter: &str,
        min: impl std::fmt::Display,
        max: impl std::fmt::Display,
        value: impl std::fmt::Display,
    ) -> Self {
        Self::RangeError {
            parameter: parameter.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn invalid_value(parameter: &str, value: impl std::fmt::Display, reason: &str) -> Self {
        Self::InvalidValue {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Trait for requests that check their own arguments before hitting the wire
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Channel names go out as element text; reject anything that is not a
/// plain word so a bad profile cannot produce a surprising request
pub fn validate_channel(channel: &str) -> Result<(), ValidationError> {
    if channel.is_empty() {
        return Err(ValidationError::MissingParameter {
            parameter: "Channel".to_string(),
        });
    }
    if !channel.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::invalid_value("Channel", channel, "expected a channel name"));
    }
    Ok(())
}

/// A UPnP action on a renderer service
pub trait UPnPOperation {
    type Request: Validate;
    type Response;

    /// The service this action belongs to
    const SERVICE: ServiceKind;

    /// The SOAP action name
    const ACTION: &'static str;

    /// Validate the request and produce its wire arguments
    fn build_params(request: &Self::Request) -> Result<ActionParams, ValidationError>;

    /// Read the typed response from the `<{Action}Response>` element
    fn parse_response(xml: &Element) -> Result<Self::Response, ControlError>;
}

/// A JSON-RPC method on a renderer
pub trait RpcOperation {
    type Request: Validate;
    type Response;

    /// Fully qualified method name, e.g. `Application.SetVolume`
    const METHOD: &'static str;

    fn build_params(request: &Self::Request) -> Result<ActionParams, ValidationError>;

    fn parse_result(result: &Value) -> Result<Self::Response, ControlError>;
}

/// Conversion from the text of a response element
pub trait FromWireText: Sized {
    fn from_wire_text(text: &str) -> Option<Self>;
}

macro_rules! from_str_wire_text {
    ($($ty:ty),*) => {
        $(impl FromWireText for $ty {
            fn from_wire_text(text: &str) -> Option<Self> {
                text.trim().parse().ok()
            }
        })*
    };
}

from_str_wire_text!(f64, i64, u32, u16, String);

impl FromWireText for bool {
    fn from_wire_text(text: &str) -> Option<Self> {
        match text.trim() {
            "1" | "true" | "True" => Some(true),
            "0" | "false" | "False" => Some(false),
            _ => None,
        }
    }
}

/// Read and convert one response field
pub fn response_field<T: FromWireText>(xml: &Element, name: &str) -> Result<T, ControlError> {
    let text = wire_client::child_text(xml, name)
        .ok_or_else(|| ControlError::Malformed(format!("Missing {} element", name)))?;
    T::from_wire_text(&text)
        .ok_or_else(|| ControlError::Malformed(format!("Unreadable {} value '{}'", name, text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(xml: &str) -> Element {
        Element::parse(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_response_field_types() {
        let xml = element("<R><CurrentVolume>-20</CurrentVolume><CurrentMute>1</CurrentMute></R>");
        assert_eq!(response_field::<f64>(&xml, "CurrentVolume").unwrap(), -20.0);
        assert!(response_field::<bool>(&xml, "CurrentMute").unwrap());
    }

    #[test]
    fn test_response_field_errors() {
        let xml = element("<R><CurrentVolume>loud</CurrentVolume></R>");
        assert!(matches!(
            response_field::<f64>(&xml, "CurrentVolume"),
            Err(ControlError::Malformed(_))
        ));
        assert!(matches!(
            response_field::<f64>(&xml, "Missing"),
            Err(ControlError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_channel() {
        assert!(validate_channel("Master").is_ok());
        assert!(validate_channel("LF").is_ok());
        assert!(validate_channel("").is_err());
        assert!(validate_channel("Master<").is_err());
    }
}
