//! Test helpers for fixture-based integration tests

use std::fs;
use std::path::PathBuf;

/// Load a fixture document from the fixtures directory
pub fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);

    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

/// Split a mockito `host:port` into its parts
pub fn host_and_port(server: &mockito::Server) -> (String, u16) {
    let host_with_port = server.host_with_port();
    let (host, port) = host_with_port
        .rsplit_once(':')
        .expect("mock server address has a port");
    (host.to_string(), port.parse().expect("numeric port"))
}
