//! Diagnosis and restart of a dependent service
//!
//! [`ProcessControl`] is the platform seam: signal-based tools (`lsof`,
//! `pgrep`, `kill`) on Unix and handle-based ones (`netstat`, `tasklist`,
//! `taskkill`) on Windows. [`RestartExecutor`] drives it through one
//! diagnose, terminate, wait, launch cycle.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{LaunchSpec, ServiceSpec};
use crate::error::{MonitorError, Result};

/// A process found during diagnosis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: Option<String>,
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "{} ({})", self.pid, command),
            None => write!(f, "{}", self.pid),
        }
    }
}

/// OS-level process inspection and control
#[async_trait]
pub trait ProcessControl: Send + Sync {
    /// The process listening on `port`, if any
    async fn find_process_on_port(&self, port: u16) -> Result<Option<ProcessInfo>>;

    /// Processes whose command line matches `pattern`
    async fn find_processes_by_pattern(&self, pattern: &str) -> Result<Vec<ProcessInfo>>;

    async fn terminate(&self, pid: u32) -> Result<()>;

    /// Start a process that outlives the monitor, returning its pid
    async fn launch_detached(&self, launch: &LaunchSpec) -> Result<u32>;
}

/// What diagnosis found, reported whether or not the restart succeeds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnosis {
    pub port_owner: Option<ProcessInfo>,
    pub matching_processes: Vec<ProcessInfo>,
    /// Inspection steps that could not run
    pub errors: Vec<String>,
}

impl Diagnosis {
    /// Pids to terminate before relaunching, without duplicates
    pub fn stale_pids(&self) -> Vec<u32> {
        let own = std::process::id();
        self.port_owner
            .iter()
            .chain(self.matching_processes.iter())
            .map(|p| p.pid)
            .filter(|pid| *pid != own)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port_owner {
            Some(owner) => write!(f, "port bound by {owner}")?,
            None => write!(f, "port free")?,
        }

        if self.matching_processes.is_empty() {
            write!(f, "; no matching process")?;
        } else {
            let pids: Vec<String> = self.matching_processes.iter().map(|p| p.pid.to_string()).collect();
            write!(f, "; matching processes: {}", pids.join(", "))?;
        }

        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

/// Diagnose and restart one service
#[async_trait]
pub trait ServiceRestarter: Send + Sync {
    /// Inspect port and process state; never fails
    async fn diagnose(&self, service: &ServiceSpec) -> Diagnosis;

    /// Replace the service's process, returning the new pid
    async fn restart(&self, service: &ServiceSpec, diagnosis: &Diagnosis) -> Result<u32>;
}

/// [`ServiceRestarter`] over a [`ProcessControl`]
#[derive(Debug, Clone)]
pub struct RestartExecutor<C = SystemProcessControl> {
    control: C,
    port_release_timeout: Duration,
    poll_interval: Duration,
}

impl RestartExecutor<SystemProcessControl> {
    pub fn new(port_release_timeout: Duration) -> Self {
        Self::with_control(SystemProcessControl, port_release_timeout)
    }
}

impl<C: ProcessControl> RestartExecutor<C> {
    pub fn with_control(control: C, port_release_timeout: Duration) -> Self {
        Self {
            control,
            port_release_timeout,
            poll_interval: Duration::from_millis(250),
        }
    }

    /// Override how often the port is re-checked while waiting for release
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    async fn wait_for_port_release(&self, port: u16) -> Result<()> {
        let deadline = tokio::time::Instant::now() + self.port_release_timeout;

        loop {
            match self.control.find_process_on_port(port).await {
                Ok(None) => return Ok(()),
                Ok(Some(_)) => {}
                // Can't tell; let the launch decide
                Err(e) => {
                    warn!(port, error = %e, "[Monitor] cannot confirm port release");
                    return Ok(());
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(MonitorError::PortStillBound(port));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl<C: ProcessControl> ServiceRestarter for RestartExecutor<C> {
    async fn diagnose(&self, service: &ServiceSpec) -> Diagnosis {
        let mut diagnosis = Diagnosis::default();

        match self.control.find_process_on_port(service.port).await {
            Ok(owner) => diagnosis.port_owner = owner,
            Err(e) => diagnosis.errors.push(format!("port lookup failed: {e}")),
        }

        match self.control.find_processes_by_pattern(&service.process_pattern).await {
            Ok(found) => diagnosis.matching_processes = found,
            Err(e) => diagnosis.errors.push(format!("process lookup failed: {e}")),
        }

        info!(service = %service.id, port = service.port, %diagnosis, "[Monitor] diagnosis");
        diagnosis
    }

    async fn restart(&self, service: &ServiceSpec, diagnosis: &Diagnosis) -> Result<u32> {
        for pid in diagnosis.stale_pids() {
            match self.control.terminate(pid).await {
                Ok(()) => info!(service = %service.id, pid, "[Monitor] terminated stale process"),
                Err(e) => warn!(service = %service.id, pid, error = %e, "[Monitor] terminate failed"),
            }
        }

        self.wait_for_port_release(service.port).await?;

        let pid = self.control.launch_detached(&service.launch).await?;
        info!(service = %service.id, pid, program = %service.launch.program, "[Monitor] launched replacement");
        Ok(pid)
    }
}

/// Process control through the platform's command-line tools
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessControl;

/// Run a tool and capture stdout; `Ok(None)` when it exits non-zero
async fn run_tool(program: &str, args: &[&str]) -> Result<Option<String>> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| MonitorError::Command {
            command: program.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    } else {
        Ok(None)
    }
}

#[cfg(unix)]
#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn find_process_on_port(&self, port: u16) -> Result<Option<ProcessInfo>> {
        let selector = format!("-iTCP:{port}");
        let output = run_tool("lsof", &["-nP", &selector, "-sTCP:LISTEN", "-Fpc"]).await?;
        Ok(output.as_deref().and_then(parse_lsof_output))
    }

    async fn find_processes_by_pattern(&self, pattern: &str) -> Result<Vec<ProcessInfo>> {
        let own = std::process::id();
        let output = run_tool("pgrep", &["-fl", pattern]).await?;
        Ok(output
            .as_deref()
            .map(parse_pgrep_output)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.pid != own)
            .collect())
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let pid_arg = pid.to_string();
        match run_tool("kill", &["-TERM", &pid_arg]).await? {
            Some(_) => Ok(()),
            None => Err(MonitorError::Terminate {
                pid,
                reason: "kill -TERM exited with an error".to_string(),
            }),
        }
    }

    async fn launch_detached(&self, launch: &LaunchSpec) -> Result<u32> {
        let mut command = detached_command(launch);
        command.process_group(0);
        spawn_reaped(command, &launch.program)
    }
}

#[cfg(windows)]
#[async_trait]
impl ProcessControl for SystemProcessControl {
    async fn find_process_on_port(&self, port: u16) -> Result<Option<ProcessInfo>> {
        let output = run_tool("netstat", &["-ano", "-p", "TCP"]).await?;
        Ok(output.as_deref().and_then(|text| parse_netstat_output(text, port)))
    }

    async fn find_processes_by_pattern(&self, pattern: &str) -> Result<Vec<ProcessInfo>> {
        let own = std::process::id();
        let output = run_tool("tasklist", &["/FO", "CSV", "/NH"]).await?;
        Ok(output
            .as_deref()
            .map(|text| parse_tasklist_output(text, pattern))
            .unwrap_or_default()
            .into_iter()
            .filter(|p| p.pid != own)
            .collect())
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        let pid_arg = pid.to_string();
        match run_tool("taskkill", &["/PID", &pid_arg, "/F"]).await? {
            Some(_) => Ok(()),
            None => Err(MonitorError::Terminate {
                pid,
                reason: "taskkill exited with an error".to_string(),
            }),
        }
    }

    async fn launch_detached(&self, launch: &LaunchSpec) -> Result<u32> {
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

        let mut command = detached_command(launch);
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        spawn_reaped(command, &launch.program)
    }
}

/// Command for a replacement process with no inherited stdio
fn detached_command(launch: &LaunchSpec) -> Command {
    let mut command = Command::new(&launch.program);
    command
        .args(&launch.args)
        .envs(&launch.env)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);
    if let Some(dir) = &launch.working_dir {
        command.current_dir(dir);
    }
    command
}

/// Spawn `command` and wait on it in the background so its exit is reaped
fn spawn_reaped(mut command: Command, program: &str) -> Result<u32> {
    let mut child = command.spawn().map_err(|source| MonitorError::Launch {
        program: program.to_string(),
        source,
    })?;

    let pid = child.id().ok_or_else(|| MonitorError::Launch {
        program: program.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "process exited before its pid was read"),
    })?;

    let program = program.to_string();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(pid, %program, %status, "[Monitor] launched process exited"),
            Err(e) => warn!(pid, %program, error = %e, "[Monitor] cannot wait on launched process"),
        }
    });

    Ok(pid)
}

/// Parse `lsof -F pc` output: `p<pid>` then `c<command>` per process
pub fn parse_lsof_output(output: &str) -> Option<ProcessInfo> {
    let mut pid = None;
    let mut command = None;

    for line in output.lines() {
        if let Some(value) = line.strip_prefix('p') {
            if pid.is_some() {
                break;
            }
            pid = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix('c') {
            if pid.is_some() {
                command = Some(value.trim().to_string());
            }
        }
    }

    pid.map(|pid| ProcessInfo { pid, command })
}

/// Parse `pgrep -l` style output: `<pid> <name>` per line
pub fn parse_pgrep_output(output: &str) -> Vec<ProcessInfo> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let pid = pid.parse().ok()?;
            let rest = rest.trim();
            Some(ProcessInfo {
                pid,
                command: (!rest.is_empty()).then(|| rest.to_string()),
            })
        })
        .collect()
}

/// Find the listener for `port` in `netstat -ano` output
pub fn parse_netstat_output(output: &str, port: u16) -> Option<ProcessInfo> {
    let suffix = format!(":{port}");
    output.lines().find_map(|line| {
        let columns: Vec<&str> = line.split_whitespace().collect();
        match columns.as_slice() {
            [proto, local, _remote, state, pid]
                if proto.eq_ignore_ascii_case("TCP")
                    && local.ends_with(&suffix)
                    && state.eq_ignore_ascii_case("LISTENING") =>
            {
                pid.parse().ok().map(|pid| ProcessInfo { pid, command: None })
            }
            _ => None,
        }
    })
}

/// Match image names in `tasklist /FO CSV /NH` output
pub fn parse_tasklist_output(output: &str, pattern: &str) -> Vec<ProcessInfo> {
    let needle = pattern.to_ascii_lowercase();
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split("\",\"").map(|f| f.trim_matches('"'));
            let image = fields.next()?;
            let pid = fields.next()?.parse().ok()?;
            image.to_ascii_lowercase().contains(&needle).then(|| ProcessInfo {
                pid,
                command: Some(image.to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lsof() {
        let output = "p4242\ncnode\nf23\n";
        assert_eq!(
            parse_lsof_output(output),
            Some(ProcessInfo {
                pid: 4242,
                command: Some("node".to_string())
            })
        );
        assert_eq!(parse_lsof_output(""), None);
    }

    #[test]
    fn test_parse_lsof_takes_first_process() {
        let output = "p10\ncfirst\np20\ncsecond\n";
        assert_eq!(parse_lsof_output(output).map(|p| p.pid), Some(10));
    }

    #[test]
    fn test_parse_pgrep() {
        let found = parse_pgrep_output("123 node\n456\nnot-a-pid\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].command.as_deref(), Some("node"));
        assert_eq!(found[1].pid, 456);
        assert!(found[1].command.is_none());
    }

    #[test]
    fn test_parse_netstat() {
        let output = "\
Active Connections

  Proto  Local Address          Foreign Address        State           PID
  TCP    0.0.0.0:135            0.0.0.0:0              LISTENING       1024
  TCP    0.0.0.0:3001           0.0.0.0:0              LISTENING       7788
  TCP    127.0.0.1:3001         127.0.0.1:55000        ESTABLISHED     7788
";
        assert_eq!(parse_netstat_output(output, 3001).map(|p| p.pid), Some(7788));
        assert_eq!(parse_netstat_output(output, 8080), None);
    }

    #[test]
    fn test_parse_tasklist() {
        let output = "\"node.exe\",\"7788\",\"Console\",\"1\",\"45,000 K\"\n\"explorer.exe\",\"100\",\"Console\",\"1\",\"90,000 K\"\n";
        let found = parse_tasklist_output(output, "NODE");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pid, 7788);
    }

    #[test]
    fn test_stale_pids_dedupes_and_skips_self() {
        let diagnosis = Diagnosis {
            port_owner: Some(ProcessInfo { pid: 7, command: None }),
            matching_processes: vec![
                ProcessInfo { pid: 7, command: None },
                ProcessInfo { pid: 3, command: None },
                ProcessInfo {
                    pid: std::process::id(),
                    command: None,
                },
            ],
            errors: Vec::new(),
        };
        assert_eq!(diagnosis.stale_pids(), vec![3, 7]);
    }

    #[test]
    fn test_diagnosis_display() {
        let diagnosis = Diagnosis {
            port_owner: None,
            matching_processes: Vec::new(),
            errors: vec!["process lookup failed: boom".to_string()],
        };
        assert_eq!(
            diagnosis.to_string(),
            "port free; no matching process; process lookup failed: boom"
        );
    }
}
