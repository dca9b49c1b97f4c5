//! Per-service health state and the restart guard

use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Where a supervisor is in its check/restart cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    /// Waiting for the next tick; the last check (if any) was healthy
    Idle,
    Checking,
    /// Last check failed, threshold not reached or restart not possible
    Unhealthy,
    Diagnosing,
    Restarting,
    /// A restart ran and the service is still down; no further restart
    /// fires until a healthy check resets the record
    RestartExhausted,
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Unhealthy => "unhealthy",
            Self::Diagnosing => "diagnosing",
            Self::Restarting => "restarting",
            Self::RestartExhausted => "restart exhausted",
        };
        f.write_str(name)
    }
}

/// Snapshot of one service's health
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthRecord {
    pub service_id: String,
    pub consecutive_failures: u32,
    pub last_checked_at: Option<SystemTime>,
    pub is_restarting: bool,
    pub phase: SupervisorPhase,
}

impl HealthRecord {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            consecutive_failures: 0,
            last_checked_at: None,
            is_restarting: false,
            phase: SupervisorPhase::Idle,
        }
    }

    /// Fold a healthy check into the record
    pub fn mark_healthy(&mut self, at: SystemTime) {
        self.consecutive_failures = 0;
        self.last_checked_at = Some(at);
        if !self.is_restarting {
            self.phase = SupervisorPhase::Idle;
        }
    }

    /// Fold a failed check into the record, returning the new failure count
    pub fn mark_unhealthy(&mut self, at: SystemTime) -> u32 {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_checked_at = Some(at);
        if !self.is_restarting && self.phase != SupervisorPhase::RestartExhausted {
            self.phase = SupervisorPhase::Unhealthy;
        }
        self.consecutive_failures
    }
}

/// Flag preventing overlapping restarts of one service
///
/// Acquiring returns a [`RestartPermit`]; the flag clears when the permit is
/// dropped, including during a panic unwind.
#[derive(Debug, Clone, Default)]
pub struct RestartGuard {
    held: Arc<AtomicBool>,
}

impl RestartGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the guard if no restart is in flight
    pub fn try_acquire(&self) -> Option<RestartPermit> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RestartPermit {
                held: Arc::clone(&self.held),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof that the holder owns the [`RestartGuard`]
#[derive(Debug)]
pub struct RestartPermit {
    held: Arc<AtomicBool>,
}

impl Drop for RestartPermit {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
