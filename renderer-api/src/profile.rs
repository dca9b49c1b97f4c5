//! Per-device control profiles.

use renderer_discovery::{default_candidates, ProbeCandidate, Scheme};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::volume::{DecibelRange, StepRange, VolumeEncoding, VolumeScale};

/// Description paths tried on the caller's port before the well-known list
const PORT_LOCAL_PATHS: [&str; 3] = ["/description.xml", "/xml/device_description.xml", "/desc.xml"];

/// Volume encoding a profile declares
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodingPreference {
    /// Infer from the first reading
    #[default]
    Auto,
    Linear,
    Decibel,
    Stepped { min: f64, max: f64, step: f64 },
}

/// Wire protocol a renderer is driven through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlProtocol {
    #[default]
    Soap,
    JsonRpc,
}

/// A serializable probe location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub port: u16,
    pub path: String,
    #[serde(default)]
    pub https: bool,
}

impl From<&CandidateSpec> for ProbeCandidate {
    fn from(spec: &CandidateSpec) -> Self {
        ProbeCandidate {
            port: spec.port,
            path: spec.path.clone(),
            scheme: if spec.https { Scheme::Https } else { Scheme::Http },
        }
    }
}

/// How to talk to one family of renderers
///
/// Every field has a default, so `{}` is a valid profile for a UPnP renderer
/// on the usual -80..0 dB window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub decibel: DecibelRange,
    pub encoding: EncodingPreference,
    pub channel: String,
    pub instance_id: u32,
    pub protocol: ControlProtocol,
    pub json_rpc_path: String,
    /// Empty means: common paths on the caller's port, then the well-known list
    pub probe_candidates: Vec<CandidateSpec>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            decibel: DecibelRange::default(),
            encoding: EncodingPreference::Auto,
            channel: "Master".to_string(),
            instance_id: 0,
            protocol: ControlProtocol::Soap,
            json_rpc_path: "/jsonrpc".to_string(),
            probe_candidates: Vec::new(),
        }
    }
}

impl DeviceProfile {
    /// Profile for a JSON-RPC renderer such as Kodi
    pub fn json_rpc() -> Self {
        Self {
            protocol: ControlProtocol::JsonRpc,
            encoding: EncodingPreference::Linear,
            ..Self::default()
        }
    }

    pub fn with_decibel_range(mut self, range: DecibelRange) -> Self {
        self.decibel = range;
        self
    }

    pub fn with_encoding(mut self, encoding: EncodingPreference) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<CandidateSpec>) -> Self {
        self.probe_candidates = candidates;
        self
    }

    /// Parse a profile from JSON and check it
    pub fn from_json(json: &str) -> Result<Self> {
        let profile: Self = serde_json::from_str(json)
            .map_err(|e| ControlError::InvalidParameter(format!("invalid device profile: {}", e)))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        self.decibel.validate()?;
        if let EncodingPreference::Stepped { min, max, step } = self.encoding {
            StepRange::new(min, max, step)?;
        }
        if self.channel.trim().is_empty() {
            return Err(ControlError::InvalidParameter("channel must not be empty".to_string()));
        }
        if !self.json_rpc_path.starts_with('/') {
            return Err(ControlError::InvalidParameter(format!(
                "json_rpc_path '{}' must start with '/'",
                self.json_rpc_path
            )));
        }
        Ok(())
    }

    /// The scale the profile pins, or `None` when it must be inferred
    pub fn declared_scale(&self) -> Option<VolumeScale> {
        match self.encoding {
            EncodingPreference::Auto => None,
            EncodingPreference::Linear => Some(VolumeScale::LinearPercent),
            EncodingPreference::Decibel => Some(VolumeScale::Decibel(self.decibel)),
            EncodingPreference::Stepped { min, max, step } => {
                Some(VolumeScale::SteppedIndex(StepRange { min, max, step }))
            }
        }
    }

    /// Scale for an explicit encoding hint, using this profile's ranges
    pub fn scale_for(&self, encoding: VolumeEncoding) -> Result<VolumeScale> {
        match (encoding, self.encoding) {
            (VolumeEncoding::LinearPercent, _) => Ok(VolumeScale::LinearPercent),
            (VolumeEncoding::Decibel, _) => Ok(VolumeScale::Decibel(self.decibel)),
            (VolumeEncoding::SteppedIndex, EncodingPreference::Stepped { min, max, step }) => {
                Ok(VolumeScale::SteppedIndex(StepRange { min, max, step }))
            }
            (VolumeEncoding::SteppedIndex, _) => Err(ControlError::InvalidParameter(
                "stepped encoding requested but the profile has no step range".to_string(),
            )),
        }
    }

    /// Ranked probe list for a renderer addressed as `port`
    pub fn candidates_for(&self, port: u16) -> Vec<ProbeCandidate> {
        if !self.probe_candidates.is_empty() {
            return self.probe_candidates.iter().map(ProbeCandidate::from).collect();
        }

        let mut candidates: Vec<ProbeCandidate> = PORT_LOCAL_PATHS
            .iter()
            .map(|path| ProbeCandidate::http(port, *path))
            .collect();
        for candidate in default_candidates() {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default_profile() {
        let profile = DeviceProfile::from_json("{}").unwrap();
        assert_eq!(profile, DeviceProfile::default());
        assert_eq!(profile.decibel.floor, -80.0);
        assert_eq!(profile.channel, "Master");
        assert_eq!(profile.declared_scale(), None);
    }

    #[test]
    fn test_profile_from_json() {
        let json = r#"{
            "decibel": { "floor": -60.0, "ceiling": 0.0 },
            "encoding": { "kind": "decibel" },
            "probe_candidates": [ { "port": 49152, "path": "/description.xml" } ]
        }"#;
        let profile = DeviceProfile::from_json(json).unwrap();

        assert_eq!(
            profile.declared_scale(),
            Some(VolumeScale::Decibel(DecibelRange::new(-60.0, 0.0).unwrap()))
        );
        assert_eq!(profile.candidates_for(1400), vec![ProbeCandidate::http(49152, "/description.xml")]);
    }

    #[test]
    fn test_stepped_profile() {
        let json = r#"{ "encoding": { "kind": "stepped", "min": 0, "max": 30, "step": 1 } }"#;
        let profile = DeviceProfile::from_json(json).unwrap();
        assert!(matches!(profile.declared_scale(), Some(VolumeScale::SteppedIndex(_))));
        assert!(profile.scale_for(VolumeEncoding::SteppedIndex).is_ok());
    }

    #[test]
    fn test_invalid_profiles_rejected() {
        assert!(DeviceProfile::from_json(r#"{ "decibel": { "floor": 0, "ceiling": -80 } }"#).is_err());
        assert!(DeviceProfile::from_json(r#"{ "channel": "" }"#).is_err());
        assert!(DeviceProfile::from_json(r#"{ "json_rpc_path": "jsonrpc" }"#).is_err());
        assert!(DeviceProfile::from_json(r#"{ "protocol": "carrier_pigeon" }"#).is_err());
        assert!(DeviceProfile::default().scale_for(VolumeEncoding::SteppedIndex).is_err());
    }

    #[test]
    fn test_candidates_try_callers_port_first() {
        let candidates = DeviceProfile::default().candidates_for(8200);
        assert_eq!(candidates[0], ProbeCandidate::http(8200, "/description.xml"));
        assert_eq!(candidates[2], ProbeCandidate::http(8200, "/desc.xml"));
        assert_eq!(candidates[3], ProbeCandidate::http(49152, "/description.xml"));
    }

    #[test]
    fn test_candidates_are_not_repeated() {
        let candidates = DeviceProfile::default().candidates_for(49152);
        let hits = candidates
            .iter()
            .filter(|c| **c == ProbeCandidate::http(49152, "/description.xml"))
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn test_json_rpc_profile() {
        let profile = DeviceProfile::json_rpc();
        assert_eq!(profile.protocol, ControlProtocol::JsonRpc);
        assert_eq!(profile.json_rpc_path, "/jsonrpc");
    }
}
