//! Health supervision for the services the client depends on
//!
//! One [`Supervisor`] per configured service probes its liveness endpoint on
//! a fixed interval. After `failure_threshold` consecutive failures it
//! diagnoses port and process state, restarts the service as a detached
//! process and re-checks once after a settle delay. Outcomes are reported as
//! `[Health Check]` and `[Monitor]` log lines.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use service_monitor::{HttpHealthProbe, MonitorConfig, RestartExecutor, Supervisor};
//!
//! let config = MonitorConfig::load(None)?;
//! let probe = Arc::new(HttpHealthProbe::new(config.probe_timeout()));
//! let executor = Arc::new(RestartExecutor::new(config.port_release_timeout()));
//!
//! let supervisor = Supervisor::new(config.services[0].clone(), probe, executor, (&config).into());
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod probe;
pub mod state;
pub mod supervisor;

pub use config::{LaunchSpec, MonitorConfig, ServiceSpec};
pub use error::{ConfigError, MonitorError};
pub use executor::{Diagnosis, ProcessControl, ProcessInfo, RestartExecutor, ServiceRestarter, SystemProcessControl};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use probe::{HealthProbe, HealthStatus, HttpHealthProbe};
pub use state::{HealthRecord, RestartGuard, RestartPermit, SupervisorPhase};
pub use supervisor::{RestartOutcome, StepReport, Supervisor, SupervisorSettings};
