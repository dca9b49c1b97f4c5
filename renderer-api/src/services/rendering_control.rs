//! RenderingControl service operations

use paste::paste;

use crate::operation::{validate_channel, ValidationError};
use crate::{define_operation_with_response, define_upnp_operation};

define_operation_with_response! {
    operation: GetVolumeOperation,
    action: "GetVolume",
    service: RenderingControl,
    request: {
        channel: String => "Channel",
    },
    response: GetVolumeResponse {
        current_volume: f64 => "CurrentVolume",
    },
    validate: |req| validate_channel(&req.channel),
}

define_upnp_operation! {
    operation: SetVolumeOperation,
    action: "SetVolume",
    service: RenderingControl,
    request: {
        channel: String => "Channel",
        desired_volume: f64 => "DesiredVolume",
    },
    validate: |req| {
        validate_channel(&req.channel)?;
        if !req.desired_volume.is_finite() {
            return Err(ValidationError::invalid_value(
                "DesiredVolume",
                req.desired_volume,
                "not a finite number",
            ));
        }
        Ok(())
    },
}

define_operation_with_response! {
    operation: GetMuteOperation,
    action: "GetMute",
    service: RenderingControl,
    request: {
        channel: String => "Channel",
    },
    response: GetMuteResponse {
        current_mute: bool => "CurrentMute",
    },
    validate: |req| validate_channel(&req.channel),
}

define_upnp_operation! {
    operation: SetMuteOperation,
    action: "SetMute",
    service: RenderingControl,
    request: {
        channel: String => "Channel",
        desired_mute: bool => "DesiredMute",
    },
    validate: |req| validate_channel(&req.channel),
}
