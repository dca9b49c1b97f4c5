//! Renderer description discovery
//!
//! This crate locates the device description of a network audio renderer
//! and extracts the control endpoint for a requested service.
//!
//! # Quick Start
//!
//! ```no_run
//! use renderer_discovery::{default_candidates, DescriptorResolver, ServiceKind};
//!
//! let resolver = DescriptorResolver::new()?;
//! let descriptor = resolver.resolve("192.168.1.40", &default_candidates(), ServiceKind::RenderingControl)?;
//! println!("control at {}", descriptor.control_url);
//! # Ok::<(), renderer_discovery::DiscoveryError>(())
//! ```
//!
//! # Pieces
//!
//! * [`TransportProber`] tries ranked (port, path) candidates in order and
//!   returns the first body that looks like a device description.
//! * [`DeviceDescription`] pulls service blocks and `URLBase` out of that
//!   document, tolerating partial and vendor-specific markup.
//! * [`DescriptorResolver`] ties the two together and reads the service's
//!   advertised actions into a [`ControlDescriptor`].

mod description;
mod endpoint;
mod error;
mod probe;
mod resolver;
mod service;

pub use description::{extract_control_url, looks_like_description, parse_action_names, DeviceDescription, ServiceEntry};
pub use endpoint::{ControlUrl, Endpoint, Scheme};
pub use error::{DiscoveryError, Result};
pub use probe::{
    default_candidates, DescriptionFetcher, FetchedDocument, HttpFetcher, ProbeCandidate, ProbeHit,
    TransportProber, DEFAULT_PROBE_TIMEOUT,
};
pub use resolver::{Capabilities, ControlDescriptor, DescriptorResolver};
pub use service::ServiceKind;

/// Resolve the `kind` descriptor of `host` over HTTP with the default candidates.
pub fn resolve(host: &str, kind: ServiceKind) -> Result<ControlDescriptor> {
    DescriptorResolver::new()?.resolve(host, &default_candidates(), kind)
}
