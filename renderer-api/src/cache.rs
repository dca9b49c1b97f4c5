//! Process-lifetime cache of resolved control descriptors.
//!
//! Entries are keyed by the address a caller uses for a renderer plus the
//! service kind. An entry is dropped once its control URL has been
//! unreachable on consecutive calls, which sends the next call back through
//! probing. The lock is held only for map operations, never across I/O.

use std::collections::HashMap;

use parking_lot::RwLock;
use renderer_discovery::{ControlDescriptor, ServiceKind};
use tracing::{debug, warn};

use crate::volume::VolumeEncoding;

/// Consecutive unreachable calls after which an entry is dropped
pub const DEFAULT_FAILURE_LIMIT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    host: String,
    port: u16,
    kind: ServiceKind,
}

impl CacheKey {
    fn new(host: &str, port: u16, kind: ServiceKind) -> Self {
        Self {
            host: host.to_string(),
            port,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    descriptor: ControlDescriptor,
    consecutive_failures: u32,
    /// Volume encoding learned from an earlier reading
    encoding: Option<VolumeEncoding>,
}

/// Shared descriptor cache
#[derive(Debug)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    failure_limit: u32,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::with_failure_limit(DEFAULT_FAILURE_LIMIT)
    }

    pub fn with_failure_limit(failure_limit: u32) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            failure_limit: failure_limit.max(1),
        }
    }

    pub fn get(&self, host: &str, port: u16, kind: ServiceKind) -> Option<ControlDescriptor> {
        self.entries
            .read()
            .get(&CacheKey::new(host, port, kind))
            .map(|entry| entry.descriptor.clone())
    }

    pub fn insert(&self, host: &str, port: u16, descriptor: ControlDescriptor) {
        let key = CacheKey::new(host, port, descriptor.service_kind);
        self.entries.write().insert(
            key,
            CacheEntry {
                descriptor,
                consecutive_failures: 0,
                encoding: None,
            },
        );
    }

    /// A call through the cached descriptor reached the renderer
    pub fn record_success(&self, host: &str, port: u16, kind: ServiceKind) {
        if let Some(entry) = self.entries.write().get_mut(&CacheKey::new(host, port, kind)) {
            entry.consecutive_failures = 0;
        }
    }

    /// A call through the cached descriptor could not reach the renderer.
    ///
    /// Returns `true` when this failure evicted the entry.
    pub fn record_failure(&self, host: &str, port: u16, kind: ServiceKind) -> bool {
        let key = CacheKey::new(host, port, kind);
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(&key) else {
            return false;
        };

        entry.consecutive_failures += 1;
        if entry.consecutive_failures < self.failure_limit {
            debug!(host, port, failures = entry.consecutive_failures, "control call failed");
            return false;
        }

        entries.remove(&key);
        warn!(host, port, service = kind.name(), "control descriptor invalidated after repeated failures");
        true
    }

    /// Volume encoding remembered for a renderer's RenderingControl entry
    pub fn remembered_encoding(&self, host: &str, port: u16) -> Option<VolumeEncoding> {
        self.entries
            .read()
            .get(&CacheKey::new(host, port, ServiceKind::RenderingControl))
            .and_then(|entry| entry.encoding)
    }

    /// Remember an encoding; ignored when no RenderingControl entry exists
    pub fn remember_encoding(&self, host: &str, port: u16, encoding: VolumeEncoding) {
        if let Some(entry) = self
            .entries
            .write()
            .get_mut(&CacheKey::new(host, port, ServiceKind::RenderingControl))
        {
            entry.encoding = Some(encoding);
        }
    }

    /// Drop every entry for a renderer
    pub fn invalidate(&self, host: &str, port: u16) {
        self.entries
            .write()
            .retain(|key, _| !(key.host == host && key.port == port));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer_discovery::{Capabilities, ControlUrl, Endpoint};

    fn descriptor(kind: ServiceKind) -> ControlDescriptor {
        ControlDescriptor {
            control_url: ControlUrl::new(Endpoint::new("10.0.0.5", 49152), "/ctl"),
            service_kind: kind,
            service_type: kind.default_service_type().to_string(),
            capabilities: Capabilities::Unknown,
        }
    }

    #[test]
    fn test_two_consecutive_failures_evict() {
        let cache = DescriptorCache::new();
        cache.insert("10.0.0.5", 49152, descriptor(ServiceKind::RenderingControl));

        assert!(!cache.record_failure("10.0.0.5", 49152, ServiceKind::RenderingControl));
        assert!(cache.get("10.0.0.5", 49152, ServiceKind::RenderingControl).is_some());
        assert!(cache.record_failure("10.0.0.5", 49152, ServiceKind::RenderingControl));
        assert!(cache.get("10.0.0.5", 49152, ServiceKind::RenderingControl).is_none());
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cache = DescriptorCache::new();
        cache.insert("10.0.0.5", 49152, descriptor(ServiceKind::RenderingControl));

        cache.record_failure("10.0.0.5", 49152, ServiceKind::RenderingControl);
        cache.record_success("10.0.0.5", 49152, ServiceKind::RenderingControl);
        assert!(!cache.record_failure("10.0.0.5", 49152, ServiceKind::RenderingControl));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_are_per_service() {
        let cache = DescriptorCache::new();
        cache.insert("10.0.0.5", 49152, descriptor(ServiceKind::RenderingControl));
        cache.insert("10.0.0.5", 49152, descriptor(ServiceKind::AVTransport));
        assert_eq!(cache.len(), 2);

        cache.record_failure("10.0.0.5", 49152, ServiceKind::AVTransport);
        cache.record_failure("10.0.0.5", 49152, ServiceKind::AVTransport);
        assert!(cache.get("10.0.0.5", 49152, ServiceKind::RenderingControl).is_some());

        cache.invalidate("10.0.0.5", 49152);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_encoding_memo_lives_on_entry() {
        let cache = DescriptorCache::new();

        cache.remember_encoding("10.0.0.5", 49152, VolumeEncoding::Decibel);
        assert_eq!(cache.remembered_encoding("10.0.0.5", 49152), None);

        cache.insert("10.0.0.5", 49152, descriptor(ServiceKind::RenderingControl));
        cache.remember_encoding("10.0.0.5", 49152, VolumeEncoding::Decibel);
        assert_eq!(cache.remembered_encoding("10.0.0.5", 49152), Some(VolumeEncoding::Decibel));

        cache.record_failure("10.0.0.5", 49152, ServiceKind::RenderingControl);
        cache.record_failure("10.0.0.5", 49152, ServiceKind::RenderingControl);
        assert_eq!(cache.remembered_encoding("10.0.0.5", 49152), None);
    }
}
