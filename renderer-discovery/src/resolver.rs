//! Control descriptor resolution: probe, parse, then read capabilities.

use std::collections::BTreeSet;

use tracing::{debug, info};
use url::Url;

use crate::description::{parse_action_names, DeviceDescription};
use crate::endpoint::ControlUrl;
use crate::error::{DiscoveryError, Result};
use crate::probe::{DescriptionFetcher, HttpFetcher, ProbeCandidate, TransportProber};
use crate::ServiceKind;

/// Actions a service advertises in its SCPD
///
/// `Unknown` when the SCPD could not be read; every action is then assumed
/// to be supported and the device gets to reject it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Capabilities {
    #[default]
    Unknown,
    Listed(BTreeSet<String>),
}

impl Capabilities {
    pub fn supports(&self, action: &str) -> bool {
        match self {
            Capabilities::Unknown => true,
            Capabilities::Listed(actions) => actions.contains(action),
        }
    }
}

/// How to reach one service of a renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlDescriptor {
    pub control_url: ControlUrl,
    pub service_kind: ServiceKind,
    /// Full service type URN, used in the SOAP action header
    pub service_type: String,
    pub capabilities: Capabilities,
}

/// Locates a renderer's description and derives a [`ControlDescriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorResolver<F = HttpFetcher> {
    prober: TransportProber<F>,
}

impl DescriptorResolver<HttpFetcher> {
    pub fn new() -> Result<Self> {
        Ok(Self {
            prober: TransportProber::new()?,
        })
    }
}

impl<F: DescriptionFetcher> DescriptorResolver<F> {
    pub fn with_prober(prober: TransportProber<F>) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &TransportProber<F> {
        &self.prober
    }

    /// Probe `host`, parse its description and build the `kind` descriptor
    pub fn resolve(
        &self,
        host: &str,
        candidates: &[ProbeCandidate],
        kind: ServiceKind,
    ) -> Result<ControlDescriptor> {
        let hit = self.prober.probe(host, candidates)?;
        let location = Url::parse(&hit.location)
            .map_err(|e| DiscoveryError::ParseError(format!("bad location {}: {}", hit.location, e)))?;

        let description = DeviceDescription::parse(&hit.document).map_err(|_| DiscoveryError::NotFound {
            host: host.to_string(),
            attempts: candidates.len(),
        })?;
        let service = description
            .find_service(kind)
            .ok_or(DiscoveryError::CapabilityMissing(kind))?;
        let control_url = description.control_url(&location, kind)?;

        let capabilities = service
            .scpd_url
            .as_deref()
            .and_then(|scpd| description.resolve_url(&location, scpd))
            .map(|scpd_url| self.read_capabilities(scpd_url.as_str()))
            .unwrap_or_default();

        info!(
            host,
            control_url = %control_url,
            service = kind.name(),
            "resolved control descriptor"
        );

        Ok(ControlDescriptor {
            control_url,
            service_kind: kind,
            service_type: service.service_type.clone(),
            capabilities,
        })
    }

    /// Best effort: any failure leaves the capability set unknown
    fn read_capabilities(&self, scpd_url: &str) -> Capabilities {
        match self.prober.fetcher().fetch(scpd_url, self.prober.timeout()) {
            Ok(doc) if doc.is_success() => parse_action_names(&doc.body)
                .map(Capabilities::Listed)
                .unwrap_or_default(),
            Ok(doc) => {
                debug!(scpd_url, status = doc.status, "SCPD not available");
                Capabilities::Unknown
            }
            Err(e) => {
                debug!(scpd_url, error = %e, "SCPD fetch failed");
                Capabilities::Unknown
            }
        }
    }
}
