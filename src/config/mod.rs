use crate::utils::error::{NodePoolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

/// Settings for the single remote node a pool is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Identity used in log lines, errors and status strings.
    /// Falls back to `address:port` when unset.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    /// Milliseconds to wait for a connection once the pool is exhausted.
    ///
    /// Negative values are normalized to 0, and 0 means wait forever,
    /// not "don't wait". See [`HostConfig::max_wait`].
    #[serde(default = "default_max_wait_time_when_exhausted")]
    pub max_wait_time_when_exhausted: i64,
    #[serde(default)]
    pub use_stale_connection_check: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Payload written by the health round-trip; the node must echo it back.
    #[serde(default = "default_probe")]
    pub probe: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String, // "json" or "pretty"
}

/// Synthetic load driven by the `nodepool` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_leases")]
    pub leases_per_worker: usize,
    /// How long each worker holds a lease before releasing it.
    #[serde(default)]
    pub hold_ms: u64,
}

// Default values
fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9160
}

fn default_max_active() -> usize {
    50
}

fn default_max_wait_time_when_exhausted() -> i64 {
    -1
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_probe_timeout_ms() -> u64 {
    2000
}

fn default_probe() -> String {
    "PING\n".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_workers() -> usize {
    8
}

fn default_leases() -> usize {
    100
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            name: None,
            address: default_address(),
            port: default_port(),
            max_active: default_max_active(),
            max_wait_time_when_exhausted: default_max_wait_time_when_exhausted(),
            use_stale_connection_check: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe: default_probe(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            leases_per_worker: default_leases(),
            hold_ms: 0,
        }
    }
}

impl HostConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_max_active(mut self, max_active: usize) -> Self {
        self.max_active = max_active;
        self
    }

    pub fn with_max_wait_time_when_exhausted(mut self, millis: i64) -> Self {
        self.max_wait_time_when_exhausted = millis;
        self
    }

    pub fn with_stale_connection_check(mut self, enabled: bool) -> Self {
        self.use_stale_connection_check = enabled;
        self
    }

    /// Stable host identity.
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{}:{}", self.address, self.port),
        }
    }

    /// Normalized wait budget: negative becomes zero, and zero means
    /// "wait indefinitely" to the pool.
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_time_when_exhausted.max(0) as u64)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_active == 0 {
            return Err(NodePoolError::Config(
                "host.max_active must be at least 1".to_string(),
            ));
        }

        if self.address.trim().is_empty() {
            return Err(NodePoolError::Config(
                "host.address cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| NodePoolError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| NodePoolError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.host.validate()?;

        // Only the TCP transport speaks the probe.
        if self.host.probe.is_empty() {
            return Err(NodePoolError::Config(
                "host.probe cannot be empty".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(NodePoolError::Config(format!(
                "Invalid log format: {}. Must be 'pretty' or 'json'",
                self.logging.format
            )));
        }

        if self.workload.workers == 0 {
            return Err(NodePoolError::Config(
                "workload.workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Create example configuration file
    pub fn create_example<P: AsRef<Path>>(path: P) -> Result<()> {
        let example = r#"[host]
# name = "node-a"  # Defaults to "address:port"
address = "127.0.0.1"
port = 9160
max_active = 50
# Milliseconds to wait once exhausted. Negative is treated as 0,
# and 0 waits forever.
max_wait_time_when_exhausted = -1
use_stale_connection_check = false
connect_timeout_ms = 5000
probe_timeout_ms = 2000
probe = "PING\n"

[logging]
level = "info"  # Options: "trace", "debug", "info", "warn", "error"
format = "pretty"  # Options: "pretty", "json"

[workload]
workers = 8
leases_per_worker = 100
hold_ms = 0
"#;

        std::fs::write(path.as_ref(), example).map_err(|e| {
            NodePoolError::Config(format!("Failed to write example config: {}", e))
        })?;

        Ok(())
    }
}
