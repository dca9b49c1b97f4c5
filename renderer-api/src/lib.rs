//! High-level renderer control API
//!
//! This crate provides a type-safe API for reading and setting the volume of
//! heterogeneous network audio renderers (UPnP SOAP devices and JSON-RPC
//! players), plus basic transport and mute control. It uses the private
//! `wire-client` crate for request framing and `renderer-discovery` to locate
//! control endpoints.
//!
//! Volume is always surfaced as a [`CanonicalVolume`] percent. How a given
//! renderer encodes it on the wire (linear, decibel, stepped) comes from its
//! [`DeviceProfile`] or is inferred from the first reading.
//!
//! ```rust,ignore
//! use renderer_api::{CanonicalVolume, DeviceProfile, RendererController};
//!
//! let controller = RendererController::new()?;
//! let profile = DeviceProfile::default();
//!
//! let report = controller.get_volume("192.168.1.60", 49152, &profile)?;
//! println!("volume is {}", report.percent);
//!
//! controller.set_volume("192.168.1.60", 49152, CanonicalVolume::new(40)?, None, &profile)?;
//! ```

pub mod cache;
pub mod client;
pub mod controller;
pub mod error;
pub mod operation;
pub mod profile;
pub mod services;
pub mod volume;

pub use cache::DescriptorCache;
pub use client::RendererClient;
pub use controller::{infer_encoding, RendererController, VolumeReport};
pub use error::{ControlError, Result};
pub use operation::{RpcOperation, UPnPOperation};
pub use profile::{CandidateSpec, ControlProtocol, DeviceProfile, EncodingPreference};
pub use renderer_discovery::ServiceKind;
pub use services::TransportState;
pub use volume::{
    decibel_to_percent, percent_to_decibel, percent_to_stepped, stepped_to_percent, CanonicalVolume, DecibelRange,
    RawVolumeReading, StepRange, VolumeEncoding, VolumeRange, VolumeScale,
};
pub use wire_client::ParamValue;
