//! Request envelope construction
//!
//! Builds complete request bodies and the headers a device expects for a
//! named action, for both UPnP SOAP and JSON-RPC renderers. Everything here is
//! pure: no I/O and no hidden state, so envelopes can be built and inspected
//! without a device on the network.

use std::fmt;

use quick_xml::escape::escape;
use serde_json::{json, Map, Number, Value};

use crate::WireError;

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Wire protocol spoken by a control endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// UPnP SOAP over HTTP POST
    Soap,
    /// JSON-RPC 2.0 over HTTP POST
    JsonRpc,
}

/// A single action argument
///
/// SOAP renders every value as escaped element text; JSON-RPC keeps the
/// native JSON type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Bool(bool),
    List(Vec<String>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Integer(i) => write!(f, "{}", i),
            // Whole decimals go out without a fractional part ("-40", not "-40.0")
            ParamValue::Decimal(d) if d.fract() == 0.0 && d.is_finite() => write!(f, "{}", *d as i64),
            ParamValue::Decimal(d) => write!(f, "{}", d),
            // UPnP booleans are 0/1
            ParamValue::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            ParamValue::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl ParamValue {
    fn to_json(&self) -> Result<Value, WireError> {
        Ok(match self {
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Integer(i) => Value::Number((*i).into()),
            ParamValue::Decimal(d) => Number::from_f64(*d)
                .map(Value::Number)
                .ok_or_else(|| WireError::InvalidEnvelope(format!("non-finite number {}", d)))?,
            ParamValue::Bool(b) => Value::Bool(*b),
            ParamValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        })
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

macro_rules! integer_param {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::Integer(i64::from(value))
            }
        })*
    };
}

integer_param!(i8, i16, i32, i64, u8, u16, u32);

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Decimal(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

/// A fully built request: body plus the headers required to send it
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub protocol: Protocol,
    pub body: String,
    pub headers: Vec<(&'static str, String)>,
}

impl RequestEnvelope {
    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build an envelope for `action` in the given protocol
///
/// For SOAP `namespace` is the service type URN; for JSON-RPC it is the
/// method namespace (e.g. `Application`), joined to the action with a dot.
pub fn build(
    protocol: Protocol,
    namespace: &str,
    action: &str,
    params: &[(&str, ParamValue)],
) -> Result<RequestEnvelope, WireError> {
    match protocol {
        Protocol::Soap => soap_envelope(namespace, action, params),
        Protocol::JsonRpc => {
            let method = if namespace.is_empty() {
                action.to_string()
            } else {
                format!("{}.{}", namespace, action)
            };
            json_rpc_envelope(&method, params, 1)
        }
    }
}

/// Build a UPnP SOAP envelope
pub fn soap_envelope(
    service_uri: &str,
    action: &str,
    params: &[(&str, ParamValue)],
) -> Result<RequestEnvelope, WireError> {
    validate_name(action)?;
    if service_uri.trim().is_empty() {
        return Err(WireError::InvalidEnvelope("empty service type".to_string()));
    }

    let mut args = String::new();
    for (name, value) in params {
        validate_name(name)?;
        let text = value.to_string();
        args.push_str(&format!("<{name}>{}</{name}>", escape(text.as_str()), name = name));
    }

    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="{envelope_ns}" s:encodingStyle="{encoding_ns}"><s:Body><u:{action} xmlns:u="{service_uri}">{args}</u:{action}></s:Body></s:Envelope>"#,
        envelope_ns = SOAP_ENVELOPE_NS,
        encoding_ns = SOAP_ENCODING_NS,
        action = action,
        service_uri = escape(service_uri),
        args = args,
    );

    Ok(RequestEnvelope {
        protocol: Protocol::Soap,
        body,
        headers: vec![
            ("Content-Type", "text/xml; charset=\"utf-8\"".to_string()),
            ("SOAPACTION", format!("\"{}#{}\"", service_uri, action)),
        ],
    })
}

/// Build a JSON-RPC 2.0 request
pub fn json_rpc_envelope(
    method: &str,
    params: &[(&str, ParamValue)],
    id: u64,
) -> Result<RequestEnvelope, WireError> {
    for segment in method.split('.') {
        validate_name(segment)?;
    }

    let mut object = Map::new();
    for (name, value) in params {
        validate_name(name)?;
        object.insert((*name).to_string(), value.to_json()?);
    }

    let body = json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": Value::Object(object),
        "id": id,
    })
    .to_string();

    Ok(RequestEnvelope {
        protocol: Protocol::JsonRpc,
        body,
        headers: vec![("Content-Type", "application/json".to_string())],
    })
}

/// Action, method segment and argument names must be plain identifiers
fn validate_name(name: &str) -> Result<(), WireError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(WireError::InvalidEnvelope(format!("invalid name '{}'", name)))
    }
}
