//! Monitor configuration
//!
//! The configuration is a JSON document listing the services to watch and the
//! timing policy shared by all supervisors. It is located by, in order:
//!
//! 1. an explicit path (the binary's first argument)
//! 2. the `RENDERCTL_MONITOR_CONFIG` environment variable
//! 3. `<config dir>/renderctl/monitor.json` (e.g. `~/.config` on Linux)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "RENDERCTL_MONITOR_CONFIG";

/// Path of the default config file relative to the platform config dir
pub const DEFAULT_CONFIG_FILE: &str = "renderctl/monitor.json";

/// Timing policy and the list of monitored services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between the start of two health checks (default: 30)
    pub interval_secs: u64,

    /// Consecutive failures that trigger a restart (default: 2)
    pub failure_threshold: u32,

    /// Seconds to wait after launching before re-checking (default: 8)
    pub settle_secs: u64,

    /// Per-check timeout in seconds (default: 5)
    pub probe_timeout_secs: u64,

    /// Seconds to wait for a terminated process to free its port (default: 3)
    pub port_release_timeout_secs: u64,

    /// Services to supervise
    pub services: Vec<ServiceSpec>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            failure_threshold: 2,
            settle_secs: 8,
            probe_timeout_secs: 5,
            port_release_timeout_secs: 3,
            services: Vec::new(),
        }
    }
}

/// One dependent service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Identifier used in logs and health records
    pub id: String,

    /// Liveness endpoint; any 2xx response counts as healthy
    pub health_url: String,

    /// Substring the response body must contain, if set
    #[serde(default)]
    pub expect_body: Option<String>,

    /// Port the service binds
    pub port: u16,

    /// Command-line pattern identifying the service's process
    pub process_pattern: String,

    /// How to start a replacement process
    pub launch: LaunchSpec,
}

/// Command used to (re)launch a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub program: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl MonitorConfig {
    /// Locate, read and validate the configuration
    pub fn load(cli_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let default_path = dirs::config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE));

        let path = resolve_config_path(cli_path, env_path.as_deref(), default_path.as_deref())?;
        tracing::info!(path = %path.display(), "[Monitor] loading configuration");
        Self::from_file(&path)
    }

    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a config from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.services.is_empty() {
            return Err(ConfigError::Invalid("no services configured".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be at least 1".to_string()));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid("failure_threshold must be at least 1".to_string()));
        }
        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("probe_timeout_secs must be at least 1".to_string()));
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if service.id.trim().is_empty() {
                return Err(ConfigError::Invalid("service id must not be empty".to_string()));
            }
            if !seen.insert(service.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate service id '{}'", service.id)));
            }
            if service.launch.program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service '{}' has no launch program",
                    service.id
                )));
            }
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn port_release_timeout(&self) -> Duration {
        Duration::from_secs(self.port_release_timeout_secs)
    }
}

/// Pick the config file to load
///
/// An explicit path (CLI, then environment) is returned even when it does not
/// exist so the caller reports the read error. The default location is only
/// used when the file is present.
pub fn resolve_config_path(
    cli_path: Option<&Path>,
    env_path: Option<&Path>,
    default_path: Option<&Path>,
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = cli_path.or(env_path) {
        return Ok(path.to_path_buf());
    }

    match default_path {
        Some(path) if path.exists() => Ok(path.to_path_buf()),
        Some(path) => Err(ConfigError::NotFound(format!(
            "{} or {}",
            CONFIG_ENV,
            path.display()
        ))),
        None => Err(ConfigError::NotFound(CONFIG_ENV.to_string())),
    }
}
