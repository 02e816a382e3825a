/// Configuration Loading Tests

use nodepool::{Config, NodePoolError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn loads_host_settings_from_toml() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[host]
name = "node-a"
address = "10.1.2.3"
port = 9042
max_active = 9
max_wait_time_when_exhausted = 50
use_stale_connection_check = true

[logging]
level = "debug"
format = "json"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.host.name(), "node-a");
    assert_eq!(config.host.address, "10.1.2.3");
    assert_eq!(config.host.max_active, 9);
    assert_eq!(config.host.max_wait(), Duration::from_millis(50));
    assert!(config.host.use_stale_connection_check);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.workload.workers, 8);
}

#[test]
fn missing_sections_fall_back_to_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[host]\nport = 7000\n").unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.host.port, 7000);
    assert_eq!(config.host.max_active, 50);
    assert_eq!(config.host.max_wait_time_when_exhausted, -1);
    assert!(config.host.max_wait().is_zero());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn zero_max_active_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[host]\nmax_active = 0\n").unwrap();

    let err = Config::from_file(file.path()).unwrap_err();
    assert!(matches!(err, NodePoolError::Config(_)));
}

#[test]
fn malformed_file_is_a_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[host\nport = ").unwrap();

    let err = Config::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn generated_example_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nodepool.toml");

    Config::create_example(&path).unwrap();
    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.host.port, 9160);
    assert_eq!(config.host.probe, "PING\n");
    assert_eq!(config.workload.leases_per_worker, 100);
}
