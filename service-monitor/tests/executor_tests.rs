//! Restart executor tests over an in-memory process table

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use service_monitor::{
    LaunchSpec, MonitorError, ProcessControl, ProcessInfo, RestartExecutor, ServiceRestarter, ServiceSpec,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    PortLookup(u16),
    PatternLookup(String),
    Terminate(u32),
    Launch(String),
}

/// Fake process table; terminating the port owner frees the port
#[derive(Default)]
struct FakeProcesses {
    port_owner: Mutex<Option<ProcessInfo>>,
    matching: Vec<ProcessInfo>,
    port_sticky: bool,
    lookups_fail: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeProcesses {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn tool_error(command: &str) -> MonitorError {
    MonitorError::Command {
        command: command.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
    }
}

#[async_trait]
impl ProcessControl for FakeProcesses {
    async fn find_process_on_port(&self, port: u16) -> Result<Option<ProcessInfo>, MonitorError> {
        self.record(Call::PortLookup(port));
        if self.lookups_fail {
            return Err(tool_error("lsof"));
        }
        Ok(self.port_owner.lock().unwrap().clone())
    }

    async fn find_processes_by_pattern(&self, pattern: &str) -> Result<Vec<ProcessInfo>, MonitorError> {
        self.record(Call::PatternLookup(pattern.to_string()));
        if self.lookups_fail {
            return Err(tool_error("pgrep"));
        }
        Ok(self.matching.clone())
    }

    async fn terminate(&self, pid: u32) -> Result<(), MonitorError> {
        self.record(Call::Terminate(pid));
        if !self.port_sticky {
            let mut owner = self.port_owner.lock().unwrap();
            if owner.as_ref().is_some_and(|p| p.pid == pid) {
                *owner = None;
            }
        }
        Ok(())
    }

    async fn launch_detached(&self, launch: &LaunchSpec) -> Result<u32, MonitorError> {
        self.record(Call::Launch(launch.program.clone()));
        Ok(9001)
    }
}

fn process(pid: u32, command: &str) -> ProcessInfo {
    ProcessInfo {
        pid,
        command: Some(command.to_string()),
    }
}

fn service() -> ServiceSpec {
    ServiceSpec {
        id: "media-server".to_string(),
        health_url: "http://127.0.0.1:3001/health".to_string(),
        expect_body: None,
        port: 3001,
        process_pattern: "media-server.js".to_string(),
        launch: LaunchSpec {
            program: "node".to_string(),
            args: vec!["media-server.js".to_string()],
            working_dir: None,
            env: HashMap::new(),
        },
    }
}

fn executor(fake: FakeProcesses) -> RestartExecutor<FakeProcesses> {
    RestartExecutor::with_control(fake, Duration::from_millis(100)).with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn test_diagnose_reports_port_and_pattern() {
    let executor = executor(FakeProcesses {
        port_owner: Mutex::new(Some(process(7788, "node"))),
        matching: vec![process(7788, "node media-server.js")],
        ..FakeProcesses::default()
    });

    let diagnosis = executor.diagnose(&service()).await;

    assert_eq!(diagnosis.port_owner.as_ref().map(|p| p.pid), Some(7788));
    assert_eq!(diagnosis.matching_processes.len(), 1);
    assert!(diagnosis.errors.is_empty());
    assert_eq!(
        executor.control().calls(),
        vec![Call::PortLookup(3001), Call::PatternLookup("media-server.js".to_string())]
    );
}

#[tokio::test]
async fn test_diagnose_never_fails() {
    let executor = executor(FakeProcesses {
        lookups_fail: true,
        ..FakeProcesses::default()
    });

    let diagnosis = executor.diagnose(&service()).await;

    assert!(diagnosis.port_owner.is_none());
    assert_eq!(diagnosis.errors.len(), 2);
    assert!(diagnosis.to_string().contains("lsof"));
}

#[tokio::test]
async fn test_restart_terminates_stale_then_launches() {
    let executor = executor(FakeProcesses {
        port_owner: Mutex::new(Some(process(7788, "node"))),
        matching: vec![process(7788, "node"), process(7790, "node media-server.js")],
        ..FakeProcesses::default()
    });
    let service = service();

    let diagnosis = executor.diagnose(&service).await;
    let pid = executor.restart(&service, &diagnosis).await.unwrap();

    assert_eq!(pid, 9001);
    let calls = executor.control().calls();
    let after_diagnosis = &calls[2..];
    assert_eq!(after_diagnosis[0], Call::Terminate(7788));
    assert_eq!(after_diagnosis[1], Call::Terminate(7790));
    assert_eq!(after_diagnosis[2], Call::PortLookup(3001));
    assert_eq!(after_diagnosis.last(), Some(&Call::Launch("node".to_string())));
}

#[tokio::test]
async fn test_restart_with_nothing_running_just_launches() {
    let executor = executor(FakeProcesses::default());
    let service = service();

    let diagnosis = executor.diagnose(&service).await;
    executor.restart(&service, &diagnosis).await.unwrap();

    let calls = executor.control().calls();
    assert!(!calls.iter().any(|c| matches!(c, Call::Terminate(_))));
    assert_eq!(calls.last(), Some(&Call::Launch("node".to_string())));
}

#[tokio::test]
async fn test_port_never_released_skips_launch() {
    let executor = executor(FakeProcesses {
        port_owner: Mutex::new(Some(process(1234, "zombie"))),
        port_sticky: true,
        ..FakeProcesses::default()
    });
    let service = service();

    let diagnosis = executor.diagnose(&service).await;
    let err = executor.restart(&service, &diagnosis).await.unwrap_err();

    assert!(matches!(err, MonitorError::PortStillBound(3001)));
    assert!(!executor
        .control()
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Launch(_))));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_launched_process_is_reaped_after_exit() {
    use service_monitor::SystemProcessControl;

    let launch = LaunchSpec {
        program: "true".to_string(),
        args: Vec::new(),
        working_dir: None,
        env: HashMap::new(),
    };

    let pid = SystemProcessControl.launch_detached(&launch).await.unwrap();
    let proc_entry = std::path::PathBuf::from(format!("/proc/{pid}"));

    // A zombie keeps its /proc entry until its parent waits on it
    let reaped = tokio::time::timeout(Duration::from_secs(5), async {
        while proc_entry.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    assert!(reaped.is_ok(), "process {pid} was never reaped");
}

#[tokio::test]
async fn test_launch_of_missing_program_fails() {
    use service_monitor::SystemProcessControl;

    let launch = LaunchSpec {
        program: "/nonexistent/renderctl-test-binary".to_string(),
        args: Vec::new(),
        working_dir: None,
        env: HashMap::new(),
    };

    let err = SystemProcessControl.launch_detached(&launch).await.unwrap_err();
    assert!(matches!(err, MonitorError::Launch { .. }));
}
