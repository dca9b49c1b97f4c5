//! High-level renderer controller
//!
//! Ties the pieces together: descriptors are resolved on first contact and
//! cached, typed operations go out through [`RendererClient`], and raw volume
//! readings are normalized against the caller's [`DeviceProfile`].

use renderer_discovery::{
    ControlDescriptor, DescriptionFetcher, DescriptorResolver, Endpoint, HttpFetcher, ServiceKind,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::DescriptorCache;
use crate::client::RendererClient;
use crate::error::{ControlError, Result};
use crate::operation::UPnPOperation;
use crate::profile::{ControlProtocol, DeviceProfile};
use crate::services::application::{
    GetPropertiesOperation, GetPropertiesRequest, SetMuteRpcOperation, SetMuteRpcRequest, SetVolumeRpcOperation,
    SetVolumeRpcRequest,
};
use crate::services::av_transport::{
    GetTransportInfoOperation, GetTransportInfoOperationRequest, GetTransportInfoResponse, PauseOperation,
    PauseOperationRequest, PlayOperation, PlayOperationRequest, StopOperation, StopOperationRequest,
};
use crate::services::rendering_control::{
    GetMuteOperation, GetMuteOperationRequest, GetVolumeOperation, GetVolumeOperationRequest, SetMuteOperation,
    SetMuteOperationRequest, SetVolumeOperation, SetVolumeOperationRequest,
};
use crate::volume::{
    percent_to_decibel, percent_to_stepped, CanonicalVolume, DecibelRange, RawVolumeReading, VolumeEncoding,
    VolumeScale,
};

/// A volume as the caller sees it plus what the renderer actually holds
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeReport {
    pub percent: CanonicalVolume,
    pub raw: RawVolumeReading,
}

impl VolumeReport {
    fn new(scale: VolumeScale, value: f64) -> Self {
        let raw = scale.reading(value);
        Self {
            percent: raw.to_canonical(),
            raw,
        }
    }
}

/// Work out how a reading is encoded when the profile does not say.
///
/// A remembered encoding wins while the value is consistent with it, so a
/// decibel renderer at full volume (0 dB) is not mistaken for 0 %.
pub fn infer_encoding(
    value: f64,
    remembered: Option<VolumeEncoding>,
    range: DecibelRange,
) -> Result<VolumeEncoding> {
    if !value.is_finite() {
        return Err(ControlError::Malformed(format!("volume reading {} is not a number", value)));
    }
    match remembered {
        Some(VolumeEncoding::Decibel) if value <= range.ceiling => return Ok(VolumeEncoding::Decibel),
        Some(VolumeEncoding::LinearPercent) if (0.0..=100.0).contains(&value) => {
            return Ok(VolumeEncoding::LinearPercent)
        }
        _ => {}
    }

    if value < 0.0 {
        Ok(VolumeEncoding::Decibel)
    } else if value <= 100.0 {
        Ok(VolumeEncoding::LinearPercent)
    } else {
        Err(ControlError::Malformed(format!(
            "volume reading {} fits no known encoding",
            value
        )))
    }
}

/// Raw value to send for `percent`; renderers take whole decibels
fn wire_value(scale: VolumeScale, percent: CanonicalVolume) -> f64 {
    match scale {
        VolumeScale::LinearPercent => f64::from(percent.value()),
        VolumeScale::Decibel(range) => percent_to_decibel(percent, range).round(),
        VolumeScale::SteppedIndex(range) => percent_to_stepped(percent, range),
    }
}

/// Controls renderers addressed by host and port
///
/// Safe to share between threads. The only state is the descriptor cache;
/// every call is bounded by the client's and prober's timeouts.
#[derive(Debug)]
pub struct RendererController<F = HttpFetcher> {
    client: RendererClient,
    resolver: DescriptorResolver<F>,
    cache: DescriptorCache,
}

impl RendererController<HttpFetcher> {
    pub fn new() -> Result<Self> {
        Ok(Self::with_parts(RendererClient::new(), DescriptorResolver::new()?))
    }
}

impl<F: DescriptionFetcher> RendererController<F> {
    pub fn with_parts(client: RendererClient, resolver: DescriptorResolver<F>) -> Self {
        Self {
            client,
            resolver,
            cache: DescriptorCache::new(),
        }
    }

    pub fn with_cache(mut self, cache: DescriptorCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    pub fn resolver(&self) -> &DescriptorResolver<F> {
        &self.resolver
    }

    /// Cached descriptor for `kind`, probing the renderer on first contact
    pub fn descriptor(
        &self,
        host: &str,
        port: u16,
        kind: ServiceKind,
        profile: &DeviceProfile,
    ) -> Result<ControlDescriptor> {
        if let Some(descriptor) = self.cache.get(host, port, kind) {
            return Ok(descriptor);
        }

        let candidates = profile.candidates_for(port);
        debug!(host, port, candidates = candidates.len(), service = kind.name(), "resolving control descriptor");
        let descriptor = self.resolver.resolve(host, &candidates, kind)?;
        self.cache.insert(host, port, descriptor.clone());
        Ok(descriptor)
    }

    /// Current volume as a canonical percent plus the raw reading
    pub fn get_volume(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<VolumeReport> {
        if profile.protocol == ControlProtocol::JsonRpc {
            let url = self.rpc_url(host, port, profile)?;
            let properties = self
                .client
                .execute_rpc::<GetPropertiesOperation>(&url, &GetPropertiesRequest)
                .inspect_err(|e| warn!(host, port, error = %e, "volume read failed"))?;
            return Ok(VolumeReport::new(VolumeScale::LinearPercent, properties.volume));
        }

        let request = GetVolumeOperationRequest {
            channel: profile.channel.clone(),
            instance_id: profile.instance_id,
        };
        let value = self.call::<GetVolumeOperation>(host, port, profile, &request)?.current_volume;
        let scale = self.reading_scale(host, port, profile, value)?;

        let report = VolumeReport::new(scale, value);
        debug!(host, port, raw = value, percent = report.percent.value(), "volume read");
        Ok(report)
    }

    /// Set the volume; `hint` overrides the encoding the profile or cache gives
    pub fn set_volume(
        &self,
        host: &str,
        port: u16,
        percent: CanonicalVolume,
        hint: Option<VolumeEncoding>,
        profile: &DeviceProfile,
    ) -> Result<VolumeReport> {
        if profile.protocol == ControlProtocol::JsonRpc {
            let url = self.rpc_url(host, port, profile)?;
            let request = SetVolumeRpcRequest {
                volume: percent.value(),
            };
            let settled = self
                .client
                .execute_rpc::<SetVolumeRpcOperation>(&url, &request)
                .inspect_err(|e| warn!(host, port, error = %e, "volume write failed"))?;
            info!(host, port, percent = percent.value(), "volume set");
            return Ok(VolumeReport::new(VolumeScale::LinearPercent, settled));
        }

        let scale = self.write_scale(host, port, hint, profile)?;
        let raw = wire_value(scale, percent);
        let request = SetVolumeOperationRequest {
            channel: profile.channel.clone(),
            desired_volume: raw,
            instance_id: profile.instance_id,
        };
        self.call::<SetVolumeOperation>(host, port, profile, &request)?;

        info!(host, port, percent = percent.value(), raw, "volume set");
        Ok(VolumeReport::new(scale, raw))
    }

    /// Step the volume by a signed percent delta, clamped to `0..=100`
    pub fn adjust_volume(&self, host: &str, port: u16, delta: i16, profile: &DeviceProfile) -> Result<VolumeReport> {
        let current = self.get_volume(host, port, profile)?;
        let target = current.percent.offset(delta);
        if target == current.percent {
            return Ok(current);
        }
        self.set_volume(host, port, target, Some(current.raw.encoding), profile)
    }

    pub fn get_mute(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<bool> {
        if profile.protocol == ControlProtocol::JsonRpc {
            let url = self.rpc_url(host, port, profile)?;
            let properties = self
                .client
                .execute_rpc::<GetPropertiesOperation>(&url, &GetPropertiesRequest)?;
            return Ok(properties.muted);
        }

        let request = GetMuteOperationRequest {
            channel: profile.channel.clone(),
            instance_id: profile.instance_id,
        };
        Ok(self.call::<GetMuteOperation>(host, port, profile, &request)?.current_mute)
    }

    pub fn set_mute(&self, host: &str, port: u16, mute: bool, profile: &DeviceProfile) -> Result<()> {
        if profile.protocol == ControlProtocol::JsonRpc {
            let url = self.rpc_url(host, port, profile)?;
            self.client
                .execute_rpc::<SetMuteRpcOperation>(&url, &SetMuteRpcRequest { mute })?;
            return Ok(());
        }

        let request = SetMuteOperationRequest {
            channel: profile.channel.clone(),
            desired_mute: mute,
            instance_id: profile.instance_id,
        };
        self.call::<SetMuteOperation>(host, port, profile, &request)
    }

    pub fn play(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<()> {
        let request = PlayOperationRequest {
            speed: "1".to_string(),
            instance_id: profile.instance_id,
        };
        self.call::<PlayOperation>(host, port, profile, &request)
    }

    pub fn pause(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<()> {
        let request = PauseOperationRequest {
            instance_id: profile.instance_id,
        };
        self.call::<PauseOperation>(host, port, profile, &request)
    }

    pub fn stop(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<()> {
        let request = StopOperationRequest {
            instance_id: profile.instance_id,
        };
        self.call::<StopOperation>(host, port, profile, &request)
    }

    pub fn transport_info(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<GetTransportInfoResponse> {
        let request = GetTransportInfoOperationRequest {
            instance_id: profile.instance_id,
        };
        self.call::<GetTransportInfoOperation>(host, port, profile, &request)
    }

    /// Run a UPnP operation through the cached descriptor, keeping the
    /// descriptor's failure count in step with the outcome
    fn call<Op: UPnPOperation>(
        &self,
        host: &str,
        port: u16,
        profile: &DeviceProfile,
        request: &Op::Request,
    ) -> Result<Op::Response> {
        profile.validate()?;
        if profile.protocol == ControlProtocol::JsonRpc {
            return Err(ControlError::CapabilityMissing(format!(
                "{} is not available over JSON-RPC",
                Op::ACTION
            )));
        }

        let descriptor = self.descriptor(host, port, Op::SERVICE, profile)?;
        match self.client.execute::<Op>(&descriptor, request) {
            Ok(response) => {
                self.cache.record_success(host, port, Op::SERVICE);
                Ok(response)
            }
            Err(e) => {
                warn!(host, port, action = Op::ACTION, error = %e, "control call failed");
                match &e {
                    ControlError::Unreachable(_) => {
                        self.cache.record_failure(host, port, Op::SERVICE);
                    }
                    // The renderer answered, so the descriptor is good
                    ControlError::Malformed(_) | ControlError::Rejected { .. } => {
                        self.cache.record_success(host, port, Op::SERVICE);
                    }
                    ControlError::CapabilityMissing(_) | ControlError::InvalidParameter(_) => {}
                }
                Err(e)
            }
        }
    }

    fn rpc_url(&self, host: &str, port: u16, profile: &DeviceProfile) -> Result<String> {
        profile.validate()?;
        Ok(Endpoint::new(host, port).url_for(&profile.json_rpc_path))
    }

    fn reading_scale(&self, host: &str, port: u16, profile: &DeviceProfile, value: f64) -> Result<VolumeScale> {
        if let Some(scale) = profile.declared_scale() {
            return Ok(scale);
        }

        let remembered = self.cache.remembered_encoding(host, port);
        let encoding = infer_encoding(value, remembered, profile.decibel)?;
        if remembered != Some(encoding) {
            debug!(host, port, ?encoding, "volume encoding inferred");
            self.cache.remember_encoding(host, port, encoding);
        }
        profile.scale_for(encoding)
    }

    fn write_scale(
        &self,
        host: &str,
        port: u16,
        hint: Option<VolumeEncoding>,
        profile: &DeviceProfile,
    ) -> Result<VolumeScale> {
        if let Some(encoding) = hint {
            return profile.scale_for(encoding);
        }
        if let Some(scale) = profile.declared_scale() {
            return Ok(scale);
        }
        if let Some(encoding) = self.cache.remembered_encoding(host, port) {
            return profile.scale_for(encoding);
        }

        // Nothing known yet: one read teaches us the encoding
        Ok(self.get_volume(host, port, profile)?.raw.scale())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_encoding() {
        let range = DecibelRange::default();
        assert_eq!(infer_encoding(-20.0, None, range).unwrap(), VolumeEncoding::Decibel);
        assert_eq!(infer_encoding(42.0, None, range).unwrap(), VolumeEncoding::LinearPercent);
        assert_eq!(infer_encoding(0.0, None, range).unwrap(), VolumeEncoding::LinearPercent);
        assert!(matches!(infer_encoding(250.0, None, range), Err(ControlError::Malformed(_))));
        assert!(matches!(infer_encoding(f64::NAN, None, range), Err(ControlError::Malformed(_))));
    }

    #[test]
    fn test_remembered_decibel_keeps_zero_at_full_volume() {
        let range = DecibelRange::default();
        assert_eq!(
            infer_encoding(0.0, Some(VolumeEncoding::Decibel), range).unwrap(),
            VolumeEncoding::Decibel
        );
        // A remembered linear encoding yields to an unmistakable dB reading
        assert_eq!(
            infer_encoding(-12.0, Some(VolumeEncoding::LinearPercent), range).unwrap(),
            VolumeEncoding::Decibel
        );
    }

    #[test]
    fn test_wire_value_midpoint_is_minus_forty() {
        let percent = CanonicalVolume::new(50).unwrap();
        assert_eq!(wire_value(VolumeScale::Decibel(DecibelRange::default()), percent), -40.0);
        assert_eq!(wire_value(VolumeScale::LinearPercent, percent), 50.0);
    }

    #[test]
    fn test_wire_value_rounds_decibels() {
        let percent = CanonicalVolume::new(33).unwrap();
        // 33 % of 80 dB above -80 is -53.6
        assert_eq!(wire_value(VolumeScale::Decibel(DecibelRange::default()), percent), -54.0);
    }
}
