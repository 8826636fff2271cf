#![deny(unsafe_code)]

//! Configuration loading and validation for auxproc.
//!
//! Loads TOML configuration files and validates them against expected
//! schemas. Provides the [`AppConfig`] type as the central
//! configuration structure for the auxiliary-processor daemon.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Processor kind and identity.
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Signal-channel transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Daemon lifecycle configuration.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which auxiliary-processor kind this process runs, and under what
/// identity it registers with the coordination store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Processor kind: "command", "passthrough", or "record".
    #[serde(default = "default_processor_kind")]
    pub kind: String,

    /// Identity registered with the coordination store. Defaults per
    /// kind (AP100 for command, AP210 for record) when unset.
    #[serde(default)]
    pub identity: Option<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            kind: default_processor_kind(),
            identity: None,
        }
    }
}

fn default_processor_kind() -> String {
    "command".to_string()
}

const PROCESSOR_KINDS: [&str; 3] = ["command", "passthrough", "record"];

/// Configuration for the datagram signal channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Address the signal channel binds on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the signal channel binds on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_listen_port() -> u16 {
    9901
}

/// Daemon lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Fork into the background on startup.
    #[serde(default = "default_daemonize")]
    pub daemonize: bool,

    /// Exit once the last coupled variable is retracted.
    #[serde(default)]
    pub auto_exit: bool,

    /// Pid of the launching interpreter; the loop exits when it dies.
    #[serde(default)]
    pub parent_pid: Option<u32>,

    /// Bound on the wait for the next signal, in milliseconds. Sets the
    /// parent-liveness polling cadence.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            daemonize: default_daemonize(),
            auto_exit: false,
            parent_pid: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_daemonize() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    5000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PROCESSOR_KINDS.contains(&self.processor.kind.as_str()) {
            return Err(ConfigError::Validation(format!(
                "processor.kind must be one of {PROCESSOR_KINDS:?}, got '{}'",
                self.processor.kind
            )));
        }
        if self.transport.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "transport.listen_addr must not be empty".to_string(),
            ));
        }
        if self.transport.listen_port == 0 {
            return Err(ConfigError::Validation(
                "transport.listen_port must be non-zero".to_string(),
            ));
        }
        if self.daemon.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "daemon.poll_interval_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
