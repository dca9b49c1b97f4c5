//! Private wire client for renderer control
//!
//! This crate builds request envelopes (UPnP SOAP and JSON-RPC) and exchanges
//! them with a device over HTTP with a bounded timeout. Replies are returned
//! as parsed documents, and device-side errors are surfaced as typed
//! [`WireError::Fault`] values rather than transport errors.

mod envelope;
mod error;

pub use envelope::{build, json_rpc_envelope, soap_envelope, ParamValue, Protocol, RequestEnvelope};
pub use error::WireError;

use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use xmltree::Element;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// A minimal client for renderer control requests
#[derive(Debug, Clone)]
pub struct WireClient {
    agent: ureq::Agent,
    timeout: Duration,
}

impl WireClient {
    /// Create a new client with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client whose requests are abandoned after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout(timeout)
                .build(),
            timeout,
        }
    }

    /// The timeout applied to every request
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a SOAP action and return the `<{action}Response>` element
    pub fn call_soap(
        &self,
        control_url: &str,
        service_uri: &str,
        action: &str,
        params: &[(&str, ParamValue)],
    ) -> Result<Element, WireError> {
        let envelope = soap_envelope(service_uri, action, params)?;
        let (status, text) = self.send(control_url, &envelope)?;

        // Devices report SOAP faults with a 500 status, so try the body first
        match Element::parse(text.as_bytes()) {
            Ok(xml) => match Self::extract_response(&xml, action) {
                Err(WireError::Parse(_)) if !is_success(status) => Err(WireError::Http(status)),
                other if is_success(status) || matches!(other, Err(WireError::Fault { .. })) => other,
                _ => Err(WireError::Http(status)),
            },
            Err(_) if !is_success(status) => Err(WireError::Http(status)),
            Err(e) => Err(WireError::Parse(e.to_string())),
        }
    }

    /// Send a JSON-RPC request and return its `result` member
    pub fn call_json_rpc(
        &self,
        url: &str,
        method: &str,
        params: &[(&str, ParamValue)],
    ) -> Result<Value, WireError> {
        let envelope = json_rpc_envelope(method, params, 1)?;
        let (status, text) = self.send(url, &envelope)?;

        match serde_json::from_str::<Value>(&text) {
            Ok(value) => match Self::extract_json_result(value) {
                Ok(_) if !is_success(status) => Err(WireError::Http(status)),
                other => other,
            },
            Err(_) if !is_success(status) => Err(WireError::Http(status)),
            Err(e) => Err(WireError::Parse(e.to_string())),
        }
    }

    /// POST an envelope, returning the status and body whatever the status
    fn send(&self, url: &str, envelope: &RequestEnvelope) -> Result<(u16, String), WireError> {
        let mut request = self.agent.post(url);
        for (name, value) in &envelope.headers {
            request = request.set(name, value);
        }

        debug!(url, protocol = ?envelope.protocol, "sending control request");

        match request.send_string(&envelope.body) {
            Ok(response) => {
                let status = response.status();
                let text = response
                    .into_string()
                    .map_err(|e| WireError::Network(e.to_string()))?;
                Ok((status, text))
            }
            Err(ureq::Error::Status(status, response)) => {
                // The body may still carry a structured fault
                let text = response.into_string().unwrap_or_default();
                Ok((status, text))
            }
            Err(ureq::Error::Transport(transport)) => Err(WireError::Network(transport.to_string())),
        }
    }

    fn extract_response(xml: &Element, action: &str) -> Result<Element, WireError> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| WireError::Parse("Missing SOAP Body".to_string()))?;

        // Check for SOAP fault first
        if let Some(fault) = body.get_child("Fault") {
            let upnp_error = fault
                .get_child("detail")
                .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")));
            let code = upnp_error
                .and_then(|e| child_text(e, "errorCode"))
                .and_then(|t| t.parse::<i32>().ok())
                .unwrap_or(500);
            let description = upnp_error
                .and_then(|e| child_text(e, "errorDescription"))
                .or_else(|| child_text(fault, "faultstring"));
            return Err(WireError::Fault { code, description });
        }

        let response_name = format!("{}Response", action);
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| WireError::Parse(format!("Missing {} element", response_name)))
    }

    fn extract_json_result(mut value: Value) -> Result<Value, WireError> {
        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            let code = error
                .get("code")
                .and_then(Value::as_i64)
                .and_then(|c| i32::try_from(c).ok())
                .unwrap_or(-32603);
            let description = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(WireError::Fault { code, description });
        }

        value
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| WireError::Parse("Missing JSON-RPC result".to_string()))
    }
}

impl Default for WireClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Trimmed text of the named child element, if present
pub fn child_text(element: &Element, name: &str) -> Option<String> {
    element
        .get_child(name)
        .and_then(|e| e.get_text())
        .map(|t| t.trim().to_string())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERING_CONTROL: &str = "urn:schemas-upnp-org:service:RenderingControl:1";

    #[test]
    fn test_wire_client_creation() {
        let client = WireClient::with_timeout(Duration::from_millis(2500));
        assert_eq!(client.timeout(), Duration::from_millis(2500));
        assert_eq!(WireClient::default().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_extract_response_with_valid_response() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1">
                        <CurrentVolume>-20</CurrentVolume>
                    </u:GetVolumeResponse>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        let response = WireClient::extract_response(&xml, "GetVolume").unwrap();

        assert_eq!(response.name, "GetVolumeResponse");
        assert_eq!(child_text(&response, "CurrentVolume").as_deref(), Some("-20"));
    }

    #[test]
    fn test_extract_response_with_soap_fault() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Client</faultcode>
                        <faultstring>UPnPError</faultstring>
                        <detail>
                            <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                                <errorCode>401</errorCode>
                                <errorDescription>Invalid Action</errorDescription>
                            </UPnPError>
                        </detail>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match WireClient::extract_response(&xml, "GetVolume").unwrap_err() {
            WireError::Fault { code, description } => {
                assert_eq!(code, 401);
                assert_eq!(description.as_deref(), Some("Invalid Action"));
            }
            other => panic!("Expected WireError::Fault, got {:?}", other),
        }
    }

    #[test]
    fn test_soap_fault_with_default_error_code() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Server</faultcode>
                        <faultstring>Internal Error</faultstring>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match WireClient::extract_response(&xml, "Play").unwrap_err() {
            WireError::Fault { code, description } => {
                assert_eq!(code, 500);
                assert_eq!(description.as_deref(), Some("Internal Error"));
            }
            other => panic!("Expected WireError::Fault, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_response_missing_body() {
        let xml_str = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"></s:Envelope>"#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match WireClient::extract_response(&xml, "Play").unwrap_err() {
            WireError::Parse(msg) => assert!(msg.contains("Missing SOAP Body")),
            other => panic!("Expected WireError::Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_response_missing_action_response() {
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                </s:Body>
            </s:Envelope>
        "#;

        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match WireClient::extract_response(&xml, "Play").unwrap_err() {
            WireError::Parse(msg) => assert!(msg.contains("Missing PlayResponse element")),
            other => panic!("Expected WireError::Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_json_result() {
        let value = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {"volume": 35}});
        let result = WireClient::extract_json_result(value).unwrap();
        assert_eq!(result["volume"], 35);

        let value = serde_json::json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32601, "message": "Method not found."}});
        match WireClient::extract_json_result(value).unwrap_err() {
            WireError::Fault { code, description } => {
                assert_eq!(code, -32601);
                assert_eq!(description.as_deref(), Some("Method not found."));
            }
            other => panic!("Expected WireError::Fault, got {:?}", other),
        }
    }

    #[test]
    fn test_call_soap_against_mock_device() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/upnp/control/rendercontrol1")
            .match_header("soapaction", "\"urn:schemas-upnp-org:service:RenderingControl:1#GetVolume\"")
            .match_body(mockito::Matcher::Regex("<Channel>Master</Channel>".to_string()))
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1"><CurrentVolume>35</CurrentVolume></u:GetVolumeResponse></s:Body></s:Envelope>"#,
            )
            .create();

        let client = WireClient::new();
        let url = format!("{}/upnp/control/rendercontrol1", server.url());
        let response = client
            .call_soap(
                &url,
                RENDERING_CONTROL,
                "GetVolume",
                &[("InstanceID", 0u32.into()), ("Channel", "Master".into())],
            )
            .unwrap();

        assert_eq!(child_text(&response, "CurrentVolume").as_deref(), Some("35"));
        mock.assert();
    }

    #[test]
    fn test_call_soap_fault_with_500_status() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/ctl")
            .with_status(500)
            .with_body(
                r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError xmlns="urn:schemas-upnp-org:control-1-0"><errorCode>501</errorCode><errorDescription>Action Failed</errorDescription></UPnPError></detail></s:Fault></s:Body></s:Envelope>"#,
            )
            .create();

        let client = WireClient::new();
        let err = client
            .call_soap(&format!("{}/ctl", server.url()), RENDERING_CONTROL, "SetVolume", &[])
            .unwrap_err();
        assert!(matches!(err, WireError::Fault { code: 501, .. }));
    }

    #[test]
    fn test_call_soap_plain_404() {
        let mut server = mockito::Server::new();
        server.mock("POST", "/ctl").with_status(404).with_body("not found").create();

        let client = WireClient::new();
        let err = client
            .call_soap(&format!("{}/ctl", server.url()), RENDERING_CONTROL, "GetVolume", &[])
            .unwrap_err();
        assert!(matches!(err, WireError::Http(404)));
    }

    #[test]
    fn test_call_soap_unreachable() {
        let client = WireClient::with_timeout(Duration::from_millis(500));
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let err = client
            .call_soap("http://127.0.0.1:9/ctl", RENDERING_CONTROL, "GetVolume", &[])
            .unwrap_err();
        assert!(matches!(err, WireError::Network(_)));
    }

    #[test]
    fn test_call_json_rpc() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/jsonrpc")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"id":1,"jsonrpc":"2.0","result":{"volume":64}}"#)
            .create();

        let client = WireClient::new();
        let result = client
            .call_json_rpc(
                &format!("{}/jsonrpc", server.url()),
                "Application.GetProperties",
                &[("properties", vec!["volume".to_string()].into())],
            )
            .unwrap();
        assert_eq!(result["volume"], 64);
    }
}
