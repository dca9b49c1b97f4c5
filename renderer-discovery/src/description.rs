//! Device description parsing.
//!
//! Extracts only what the control adapter needs from a UPnP device
//! description: the service blocks (type, control path, SCPD path) and the
//! optional `URLBase`. The reader is a streaming event walk rather than a
//! schema-bound deserializer so that partial and vendor-quirky documents still
//! yield whatever complete service blocks they contain.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeSet;
use url::Url;

use crate::endpoint::ControlUrl;
use crate::error::{DiscoveryError, Result};
use crate::ServiceKind;

/// One `<service>` block of a device description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEntry {
    pub service_type: String,
    pub service_id: Option<String>,
    /// Control path exactly as written in the document
    pub control_url: String,
    pub scpd_url: Option<String>,
    pub event_sub_url: Option<String>,
}

/// The subset of a device description the control path cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescription {
    pub device_type: Option<String>,
    pub friendly_name: Option<String>,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub url_base: Option<String>,
    /// Services of the root device and all embedded devices, document order
    pub services: Vec<ServiceEntry>,
}

/// Cheap structural check used by the prober before full parsing
pub fn looks_like_description(body: &str) -> bool {
    body.contains("deviceType") && body.contains("serviceType")
}

impl DeviceDescription {
    /// Parse a device description document.
    ///
    /// A document that breaks off mid-way still returns everything read up to
    /// that point. Only a document that yields nothing usable is an error.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut description = DeviceDescription::default();
        let mut path: Vec<String> = Vec::new();
        let mut current_service: Option<ServiceEntry> = None;
        let mut parse_error: Option<String> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name == "service" {
                        current_service = Some(ServiceEntry::default());
                    }
                    path.push(name);
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if name == "service" {
                        if let Some(service) = current_service.take() {
                            // Incomplete blocks are dropped rather than guessed at
                            if !service.service_type.is_empty() && !service.control_url.is_empty() {
                                description.services.push(service);
                            }
                        }
                    }
                    path.pop();
                }
                Ok(Event::Text(t)) => match t.unescape() {
                    Ok(text) => description.assign(&path, current_service.as_mut(), text.trim()),
                    Err(e) => {
                        parse_error = Some(e.to_string());
                        break;
                    }
                },
                Ok(Event::CData(c)) => {
                    let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                    description.assign(&path, current_service.as_mut(), text.trim());
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    parse_error = Some(e.to_string());
                    break;
                }
            }
        }

        if description.device_type.is_none() && description.services.is_empty() {
            return Err(DiscoveryError::ParseError(
                parse_error.unwrap_or_else(|| "no device element".to_string()),
            ));
        }

        Ok(description)
    }

    fn assign(&mut self, path: &[String], service: Option<&mut ServiceEntry>, text: &str) {
        if text.is_empty() {
            return;
        }
        let (Some(leaf), Some(parent)) = (path.last(), path.len().checked_sub(2).map(|i| &path[i])) else {
            return;
        };

        match (parent.as_str(), service) {
            ("service", Some(service)) => match leaf.as_str() {
                "serviceType" => service.service_type = text.to_string(),
                "serviceId" => service.service_id = Some(text.to_string()),
                "controlURL" => service.control_url = text.to_string(),
                "SCPDURL" => service.scpd_url = Some(text.to_string()),
                "eventSubURL" => service.event_sub_url = Some(text.to_string()),
                _ => {}
            },
            // First device wins: the root device precedes embedded ones
            ("device", _) => {
                let slot = match leaf.as_str() {
                    "deviceType" => &mut self.device_type,
                    "friendlyName" => &mut self.friendly_name,
                    "manufacturer" => &mut self.manufacturer,
                    "modelName" => &mut self.model_name,
                    _ => return,
                };
                if slot.is_none() {
                    *slot = Some(text.to_string());
                }
            }
            ("root", _) if leaf == "URLBase" => self.url_base = Some(text.to_string()),
            _ => {}
        }
    }

    /// First service block matching `kind`
    pub fn find_service(&self, kind: ServiceKind) -> Option<&ServiceEntry> {
        self.services.iter().find(|s| kind.matches(&s.service_type))
    }

    /// Resolve a path from this document against `URLBase` or the document URL
    pub fn resolve_url(&self, location: &Url, raw: &str) -> Option<Url> {
        if let Ok(absolute) = Url::parse(raw) {
            return Some(absolute);
        }
        let base = self
            .url_base
            .as_deref()
            .and_then(|b| Url::parse(b).ok())
            .unwrap_or_else(|| location.clone());
        base.join(raw).ok()
    }

    /// Control location of the `kind` service
    pub fn control_url(&self, location: &Url, kind: ServiceKind) -> Result<ControlUrl> {
        let service = self
            .find_service(kind)
            .ok_or(DiscoveryError::CapabilityMissing(kind))?;
        self.resolve_url(location, &service.control_url)
            .and_then(|url| ControlUrl::from_url(&url))
            .ok_or_else(|| {
                DiscoveryError::ParseError(format!("unusable controlURL '{}'", service.control_url))
            })
    }
}

/// Extract the control location of `kind` from a raw description document.
///
/// Malformed documents report `NotFound`; well-formed documents without the
/// service report `CapabilityMissing`.
pub fn extract_control_url(document: &str, location: &Url, kind: ServiceKind) -> Result<ControlUrl> {
    let description = DeviceDescription::parse(document).map_err(|_| DiscoveryError::NotFound {
        host: location.host_str().unwrap_or_default().to_string(),
        attempts: 1,
    })?;
    description.control_url(location, kind)
}

/// Action names listed in a service control protocol description (SCPD)
///
/// Returns `None` when the document is unreadable or lists no actions.
pub fn parse_action_names(xml: &str) -> Option<BTreeSet<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut actions = BTreeSet::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let in_action_name = path.len() >= 2
                    && path[path.len() - 1] == "name"
                    && path[path.len() - 2] == "action";
                if in_action_name {
                    if let Ok(text) = t.unescape() {
                        actions.insert(text.trim().to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    if actions.is_empty() {
        None
    } else {
        Some(actions)
    }
}
