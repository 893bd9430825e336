//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Event storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Broker and watch stream settings.
    #[serde(default)]
    pub broker: BrokerSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static web UI settings.
    #[serde(default)]
    pub ui: UiConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Event storage configuration.
///
/// With storage disabled, events are broadcast to watchers but not kept.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    /// Capacity of the broker's command channel.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    /// Events buffered per watcher before it starts missing events.
    #[serde(default = "default_watch_buffer")]
    pub watch_buffer: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "regnotify_store=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UiConfig {
    /// Directory served under `/ui`. No UI is served when unset.
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "regnotify.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_command_buffer() -> usize {
    16
}

fn default_watch_buffer() -> usize {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            command_buffer: default_command_buffer(),
            watch_buffer: default_watch_buffer(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `REGNOTIFY_HOST` overrides `server.host`
/// - `REGNOTIFY_PORT` overrides `server.port`
/// - `REGNOTIFY_STORAGE_ENABLED` overrides `storage.enabled` ("true" or "1")
/// - `REGNOTIFY_DB_PATH` overrides `storage.path`
/// - `REGNOTIFY_LOG_LEVEL` overrides `logging.level`
/// - `REGNOTIFY_LOG_JSON` overrides `logging.json` ("true" or "1")
/// - `REGNOTIFY_UI_DIR` overrides `ui.dir`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Applies overrides looked up through `var`. Unparseable values are ignored.
fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("REGNOTIFY_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("REGNOTIFY_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(enabled) = var("REGNOTIFY_STORAGE_ENABLED") {
        config.storage.enabled = parse_flag(&enabled);
    }
    if let Some(db_path) = var("REGNOTIFY_DB_PATH") {
        config.storage.path = db_path;
    }
    if let Some(level) = var("REGNOTIFY_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("REGNOTIFY_LOG_JSON") {
        config.logging.json = parse_flag(&json);
    }
    if let Some(dir) = var("REGNOTIFY_UI_DIR") {
        config.ui.dir = Some(dir).filter(|d| !d.is_empty());
    }
}
