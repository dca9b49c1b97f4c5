//! AVTransport service operations

use std::fmt;

use paste::paste;
use serde::Serialize;

use crate::operation::FromWireText;
use crate::{define_operation_with_response, define_upnp_operation};

/// Transport state as reported by `GetTransportInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransportState {
    Playing,
    PausedPlayback,
    Stopped,
    Transitioning,
    NoMediaPresent,
    /// Vendor-specific state, kept verbatim
    Other(String),
}

impl FromWireText for TransportState {
    fn from_wire_text(text: &str) -> Option<Self> {
        let state = match text.trim() {
            "" => return None,
            "PLAYING" => TransportState::Playing,
            "PAUSED_PLAYBACK" => TransportState::PausedPlayback,
            "STOPPED" => TransportState::Stopped,
            "TRANSITIONING" => TransportState::Transitioning,
            "NO_MEDIA_PRESENT" => TransportState::NoMediaPresent,
            other => TransportState::Other(other.to_string()),
        };
        Some(state)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportState::Playing => f.write_str("PLAYING"),
            TransportState::PausedPlayback => f.write_str("PAUSED_PLAYBACK"),
            TransportState::Stopped => f.write_str("STOPPED"),
            TransportState::Transitioning => f.write_str("TRANSITIONING"),
            TransportState::NoMediaPresent => f.write_str("NO_MEDIA_PRESENT"),
            TransportState::Other(s) => f.write_str(s),
        }
    }
}

define_upnp_operation! {
    operation: PlayOperation,
    action: "Play",
    service: AVTransport,
    request: {
        speed: String => "Speed",
    },
}

define_upnp_operation! {
    operation: PauseOperation,
    action: "Pause",
    service: AVTransport,
    request: {},
}

define_upnp_operation! {
    operation: StopOperation,
    action: "Stop",
    service: AVTransport,
    request: {},
}

define_operation_with_response! {
    operation: GetTransportInfoOperation,
    action: "GetTransportInfo",
    service: AVTransport,
    request: {},
    response: GetTransportInfoResponse {
        current_transport_state: TransportState => "CurrentTransportState",
        current_transport_status: String => "CurrentTransportStatus",
        current_speed: String => "CurrentSpeed",
    },
}
