//! JSON-RPC `Application` namespace, as spoken by Kodi-compatible renderers
//!
//! These renderers report and accept volume as a linear percent.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ControlError;
use crate::operation::{ActionParams, RpcOperation, Validate, ValidationError};
use crate::ParamValue;

/// Subset of `Application.GetProperties` the control path reads
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApplicationProperties {
    pub volume: f64,
    #[serde(default)]
    pub muted: bool,
}

fn decode<T: for<'de> Deserialize<'de>>(method: &str, result: &Value) -> Result<T, ControlError> {
    T::deserialize(result)
        .map_err(|e| ControlError::Malformed(format!("unexpected {} result: {}", method, e)))
}

pub struct GetPropertiesOperation;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct GetPropertiesRequest;

impl Validate for GetPropertiesRequest {}

impl RpcOperation for GetPropertiesOperation {
    type Request = GetPropertiesRequest;
    type Response = ApplicationProperties;

    const METHOD: &'static str = "Application.GetProperties";

    fn build_params(_request: &Self::Request) -> Result<ActionParams, ValidationError> {
        Ok(vec![(
            "properties",
            ParamValue::List(vec!["volume".to_string(), "muted".to_string()]),
        )])
    }

    fn parse_result(result: &Value) -> Result<Self::Response, ControlError> {
        decode(Self::METHOD, result)
    }
}

pub struct SetVolumeRpcOperation;

#[derive(Clone, Debug, PartialEq)]
pub struct SetVolumeRpcRequest {
    pub volume: u8,
}

impl Validate for SetVolumeRpcRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.volume > 100 {
            return Err(ValidationError::range_error("volume", 0, 100, self.volume));
        }
        Ok(())
    }
}

impl RpcOperation for SetVolumeRpcOperation {
    type Request = SetVolumeRpcRequest;
    /// The volume the renderer settled on
    type Response = f64;

    const METHOD: &'static str = "Application.SetVolume";

    fn build_params(request: &Self::Request) -> Result<ActionParams, ValidationError> {
        request.validate()?;
        Ok(vec![("volume", ParamValue::from(request.volume))])
    }

    fn parse_result(result: &Value) -> Result<Self::Response, ControlError> {
        decode(Self::METHOD, result)
    }
}

pub struct SetMuteRpcOperation;

#[derive(Clone, Debug, PartialEq)]
pub struct SetMuteRpcRequest {
    pub mute: bool,
}

impl Validate for SetMuteRpcRequest {}

impl RpcOperation for SetMuteRpcOperation {
    type Request = SetMuteRpcRequest;
    type Response = bool;

    const METHOD: &'static str = "Application.SetMute";

    fn build_params(request: &Self::Request) -> Result<ActionParams, ValidationError> {
        Ok(vec![("mute", ParamValue::from(request.mute))])
    }

    fn parse_result(result: &Value) -> Result<Self::Response, ControlError> {
        decode(Self::METHOD, result)
    }
}
