//! Loading the monitor configuration from disk

use std::path::{Path, PathBuf};
use std::time::Duration;

use service_monitor::{ConfigError, MonitorConfig};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

#[test]
fn test_load_explicit_path() {
    let path = fixture("monitor.json");
    let config = MonitorConfig::load(Some(&path)).unwrap();

    assert_eq!(config.services.len(), 2);
    assert_eq!(config.interval(), Duration::from_secs(30));
    assert_eq!(config.probe_timeout(), Duration::from_secs(5));

    let media = &config.services[0];
    assert_eq!(media.port, 3001);
    assert_eq!(media.launch.env.get("PORT").map(String::as_str), Some("3001"));
    assert_eq!(
        media.launch.working_dir.as_deref(),
        Some(Path::new("/opt/renderctl/media-server"))
    );

    let bundler = &config.services[1];
    assert_eq!(bundler.expect_body.as_deref(), Some("packager-status:running"));
    assert!(bundler.launch.env.is_empty());
}

#[test]
fn test_missing_explicit_path_is_read_error() {
    let path = fixture("does-not-exist.json");
    let err = MonitorConfig::load(Some(&path)).unwrap_err();

    assert!(matches!(err, ConfigError::FileRead { .. }));
}
