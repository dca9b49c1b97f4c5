use std::time::Duration;

use renderer_discovery::ControlDescriptor;
use tracing::debug;
use wire_client::WireClient;

use crate::error::{ControlError, Result};
use crate::operation::{RpcOperation, UPnPOperation};

/// Executes typed operations against resolved renderer endpoints
///
/// This client bridges the stateless operation definitions and the wire
/// client. It checks that the descriptor belongs to the operation's service
/// and that the action is advertised before anything is sent.
#[derive(Debug, Clone, Default)]
pub struct RendererClient {
    wire: WireClient,
}

impl RendererClient {
    pub fn new() -> Self {
        Self {
            wire: WireClient::new(),
        }
    }

    /// Client whose control requests are abandoned after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            wire: WireClient::with_timeout(timeout),
        }
    }

    pub fn with_wire_client(wire: WireClient) -> Self {
        Self { wire }
    }

    /// Execute a UPnP operation through a control descriptor
    pub fn execute<Op: UPnPOperation>(
        &self,
        descriptor: &ControlDescriptor,
        request: &Op::Request,
    ) -> Result<Op::Response> {
        if descriptor.service_kind != Op::SERVICE {
            return Err(ControlError::InvalidParameter(format!(
                "{} belongs to {}, descriptor is for {}",
                Op::ACTION,
                Op::SERVICE.name(),
                descriptor.service_kind.name()
            )));
        }
        if !descriptor.capabilities.supports(Op::ACTION) {
            return Err(ControlError::action_missing(Op::SERVICE.name(), Op::ACTION));
        }

        let params = Op::build_params(request)?;
        let control_url = descriptor.control_url.url();
        debug!(%control_url, action = Op::ACTION, "executing operation");

        let xml = self
            .wire
            .call_soap(&control_url, &descriptor.service_type, Op::ACTION, &params)?;
        Op::parse_response(&xml)
    }

    /// Execute a JSON-RPC operation against `url`
    pub fn execute_rpc<Op: RpcOperation>(&self, url: &str, request: &Op::Request) -> Result<Op::Response> {
        let params = Op::build_params(request)?;
        debug!(url, method = Op::METHOD, "executing rpc operation");

        let result = self.wire.call_json_rpc(url, Op::METHOD, &params)?;
        Op::parse_result(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rendering_control::{GetVolumeOperation, GetVolumeOperationRequest};
    use renderer_discovery::{Capabilities, ControlUrl, Endpoint, ServiceKind};
    use std::collections::BTreeSet;

    fn descriptor(kind: ServiceKind, capabilities: Capabilities) -> ControlDescriptor {
        ControlDescriptor {
            // Nothing listens here; these tests must fail before the wire
            control_url: ControlUrl::new(Endpoint::new("127.0.0.1", 9), "/ctl"),
            service_kind: kind,
            service_type: kind.default_service_type().to_string(),
            capabilities,
        }
    }

    fn get_volume() -> GetVolumeOperationRequest {
        GetVolumeOperationRequest {
            channel: "Master".to_string(),
            instance_id: 0,
        }
    }

    #[test]
    fn test_unlisted_action_is_capability_missing() {
        let listed = Capabilities::Listed(BTreeSet::from(["SetVolume".to_string()]));
        let client = RendererClient::new();

        let result =
            client.execute::<GetVolumeOperation>(&descriptor(ServiceKind::RenderingControl, listed), &get_volume());
        assert!(matches!(result, Err(ControlError::CapabilityMissing(_))));
    }

    #[test]
    fn test_wrong_service_descriptor_rejected() {
        let client = RendererClient::new();
        let result = client.execute::<GetVolumeOperation>(
            &descriptor(ServiceKind::AVTransport, Capabilities::Unknown),
            &get_volume(),
        );
        assert!(matches!(result, Err(ControlError::InvalidParameter(_))));
    }

    #[test]
    fn test_execute_against_mock_renderer() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/upnp/control/rendercontrol1")
            .match_header(
                "soapaction",
                "\"urn:schemas-upnp-org:service:RenderingControl:1#GetVolume\"",
            )
            .with_status(200)
            .with_body(
                r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1"><CurrentVolume>37</CurrentVolume></u:GetVolumeResponse>
</s:Body></s:Envelope>"#,
            )
            .create();

        let host_with_port = server.host_with_port();
        let (host, port) = host_with_port.rsplit_once(':').unwrap();
        let descriptor = ControlDescriptor {
            control_url: ControlUrl::new(
                Endpoint::new(host, port.parse().unwrap()),
                "/upnp/control/rendercontrol1",
            ),
            ..descriptor(ServiceKind::RenderingControl, Capabilities::Unknown)
        };

        let response = RendererClient::new()
            .execute::<GetVolumeOperation>(&descriptor, &get_volume())
            .unwrap();
        assert_eq!(response.current_volume, 37.0);
        mock.assert();
    }
}
