//! Periodic health supervision of one service
//!
//! Each [`Supervisor`] owns the [`HealthRecord`] and [`RestartGuard`] of a
//! single service. Everything that touches the service runs on one sequential
//! path: a tick's check, and when the failure threshold is reached, the
//! restart cycle (diagnose, restart, settle, one re-check). A slow check or a
//! restart delays the next tick instead of overlapping it.

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::{MonitorConfig, ServiceSpec};
use crate::executor::ServiceRestarter;
use crate::probe::{HealthProbe, HealthStatus};
use crate::state::{HealthRecord, RestartGuard, RestartPermit, SupervisorPhase};

/// Timing policy for one supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub interval: Duration,
    pub failure_threshold: u32,
    pub settle_delay: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for SupervisorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            interval: config.interval(),
            failure_threshold: config.failure_threshold,
            settle_delay: config.settle_delay(),
        }
    }
}

/// How a restart cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The re-check after settling was healthy
    Recovered { pid: u32 },
    /// The process was relaunched but the re-check failed
    StillUnhealthy { reason: String },
    /// Terminate or launch failed
    Failed { reason: String },
}

/// Result of one supervisor step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    /// Set when this step ran a restart cycle
    pub restart: Option<RestartOutcome>,
}

impl StepReport {
    pub fn restart_triggered(&self) -> bool {
        self.restart.is_some()
    }
}

pub struct Supervisor<P, R> {
    service: ServiceSpec,
    probe: Arc<P>,
    restarter: Arc<R>,
    settings: SupervisorSettings,
    record: HealthRecord,
    guard: RestartGuard,
}

impl<P: HealthProbe, R: ServiceRestarter> Supervisor<P, R> {
    pub fn new(service: ServiceSpec, probe: Arc<P>, restarter: Arc<R>, settings: SupervisorSettings) -> Self {
        let record = HealthRecord::new(service.id.clone());
        Self {
            service,
            probe,
            restarter,
            settings,
            record,
            guard: RestartGuard::new(),
        }
    }

    pub fn service(&self) -> &ServiceSpec {
        &self.service
    }

    pub fn guard(&self) -> &RestartGuard {
        &self.guard
    }

    /// Current health snapshot
    pub fn record(&self) -> HealthRecord {
        let mut record = self.record.clone();
        record.is_restarting = self.guard.is_held();
        record
    }

    /// Run checks on the configured interval until `shutdown` changes
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            service = %self.service.id,
            interval = ?self.settings.interval,
            threshold = self.settings.failure_threshold,
            "[Monitor] supervising"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.step().await;
                }
                // Any signal, or a dropped sender, stops the loop
                _ = shutdown.changed() => break,
            }
        }

        info!(service = %self.service.id, "[Monitor] supervisor stopped");
    }

    /// Run one health check and act on the result
    ///
    /// When the check crosses the failure threshold the restart cycle runs
    /// before this returns.
    pub async fn step(&mut self) -> StepReport {
        if self.record.phase != SupervisorPhase::RestartExhausted {
            self.record.phase = SupervisorPhase::Checking;
        }

        let status = self.probe.check(&self.service).await;
        let now = SystemTime::now();

        match &status {
            HealthStatus::Healthy => {
                if self.record.consecutive_failures > 0 {
                    info!(service = %self.service.id, "[Health Check] service recovered");
                }
                self.record.mark_healthy(now);
            }
            HealthStatus::Unhealthy(reason) => {
                let failures = self.record.mark_unhealthy(now);
                warn!(service = %self.service.id, failures, %reason, "[Health Check] service unhealthy");
            }
        }

        let failures = self.record.consecutive_failures;
        let mut restart = None;
        if !status.is_healthy() && failures >= self.settings.failure_threshold {
            if self.record.phase == SupervisorPhase::RestartExhausted {
                debug!(service = %self.service.id, failures, "[Monitor] restart already attempted, waiting for recovery");
            } else if let Some(permit) = self.guard.try_acquire() {
                error!(
                    service = %self.service.id,
                    failures,
                    "[Monitor] ALERT: failure threshold reached, restarting"
                );
                restart = Some(self.restart_cycle(permit).await);
            } else {
                debug!(service = %self.service.id, failures, "[Monitor] restart already in flight");
            }
        }

        StepReport {
            status,
            consecutive_failures: self.record.consecutive_failures,
            restart,
        }
    }

    /// Diagnose, restart, settle and re-check once; `permit` is held throughout
    async fn restart_cycle(&mut self, permit: RestartPermit) -> RestartOutcome {
        self.record.is_restarting = true;
        let outcome = self.run_restart().await;
        self.record.is_restarting = false;
        drop(permit);
        outcome
    }

    async fn run_restart(&mut self) -> RestartOutcome {
        self.record.phase = SupervisorPhase::Diagnosing;
        let diagnosis = self.restarter.diagnose(&self.service).await;

        self.record.phase = SupervisorPhase::Restarting;
        let pid = match self.restarter.restart(&self.service, &diagnosis).await {
            Ok(pid) => pid,
            Err(e) => {
                error!(service = %self.service.id, error = %e, %diagnosis, "[Monitor] ALERT: restart failed");
                self.record.phase = SupervisorPhase::RestartExhausted;
                return RestartOutcome::Failed { reason: e.to_string() };
            }
        };

        tokio::time::sleep(self.settings.settle_delay).await;

        self.record.phase = SupervisorPhase::Checking;
        let status = self.probe.check(&self.service).await;
        let now = SystemTime::now();

        match status {
            HealthStatus::Healthy => {
                self.record.is_restarting = false;
                self.record.mark_healthy(now);
                info!(service = %self.service.id, pid, "[Monitor] restart succeeded");
                RestartOutcome::Recovered { pid }
            }
            HealthStatus::Unhealthy(reason) => {
                error!(
                    service = %self.service.id,
                    pid,
                    %reason,
                    "[Monitor] ALERT: still unhealthy after restart, giving up"
                );
                self.record.consecutive_failures = self.record.consecutive_failures.saturating_add(1);
                self.record.last_checked_at = Some(now);
                self.record.phase = SupervisorPhase::RestartExhausted;
                RestartOutcome::StillUnhealthy { reason }
            }
        }
    }
}
