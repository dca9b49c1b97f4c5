//! Renderer service kinds that carry control actions.

/// UPnP services the control adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// RenderingControl - volume, mute and other rendering parameters
    RenderingControl,
    /// AVTransport - play, pause, stop and transport state
    AVTransport,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::RenderingControl => "RenderingControl",
            ServiceKind::AVTransport => "AVTransport",
        }
    }

    /// Service type URN assumed when a description omits the version
    pub fn default_service_type(&self) -> &'static str {
        match self {
            ServiceKind::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            ServiceKind::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
        }
    }

    /// Whether a `<serviceType>` value names this kind, any version
    pub fn matches(&self, service_type: &str) -> bool {
        let marker = format!(":service:{}:", self.name()).to_ascii_lowercase();
        service_type.to_ascii_lowercase().contains(&marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_any_version() {
        assert!(ServiceKind::RenderingControl.matches("urn:schemas-upnp-org:service:RenderingControl:1"));
        assert!(ServiceKind::RenderingControl.matches("urn:schemas-upnp-org:service:RenderingControl:3"));
        assert!(ServiceKind::AVTransport.matches("urn:schemas-upnp-org:service:avtransport:2"));
        assert!(!ServiceKind::AVTransport.matches("urn:schemas-upnp-org:service:RenderingControl:1"));
        assert!(!ServiceKind::RenderingControl.matches("urn:schemas-upnp-org:service:GroupRenderingControl:1"));
    }
}
