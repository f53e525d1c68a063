//! Configuration – reads/writes `~/.microbridge/config.toml`.

use microbridge_middleware::BridgeConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Persisted user configuration stored in `~/.microbridge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node identity the bridge endpoints are created under.
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Inbound velocity-command topic.
    #[serde(default = "default_command_topic")]
    pub command_topic: String,

    /// Outbound status topic.
    #[serde(default = "default_status_topic")]
    pub status_topic: String,

    /// Upper bound on one dispatch step, in milliseconds.
    #[serde(default = "default_spin_timeout_ms")]
    pub spin_timeout_ms: u64,

    /// Payload emitted on the status topic.
    #[serde(default = "default_status_payload")]
    pub status_payload: String,

    /// How often the status payload is emitted, in milliseconds.
    #[serde(default = "default_status_period_ms")]
    pub status_period_ms: u64,
}

fn default_node_name() -> String {
    "micro_ros_platformio_node".to_string()
}
fn default_command_topic() -> String {
    "cmd_vel".to_string()
}
fn default_status_topic() -> String {
    "serial_monitor".to_string()
}
fn default_spin_timeout_ms() -> u64 {
    100
}
fn default_status_payload() -> String {
    "Hello World!".to_string()
}
fn default_status_period_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            command_topic: default_command_topic(),
            status_topic: default_status_topic(),
            spin_timeout_ms: default_spin_timeout_ms(),
            status_payload: default_status_payload(),
            status_period_ms: default_status_period_ms(),
        }
    }
}

impl Config {
    /// Translate into the middleware-facing bridge wiring.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            node_name: self.node_name.clone(),
            command_topic: self.command_topic.clone(),
            status_topic: self.status_topic.clone(),
            spin_timeout: Duration::from_millis(self.spin_timeout_ms),
        }
    }
}

/// Return the path to `~/.microbridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
/// Extracted for testability without mutating environment variables.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".microbridge").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `MICROBRIDGE_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `MICROBRIDGE_NODE_NAME` | `node_name` |
/// | `MICROBRIDGE_COMMAND_TOPIC` | `command_topic` |
/// | `MICROBRIDGE_STATUS_TOPIC` | `status_topic` |
/// | `MICROBRIDGE_SPIN_TIMEOUT_MS` | `spin_timeout_ms` |
/// | `MICROBRIDGE_STATUS_PAYLOAD` | `status_payload` |
/// | `MICROBRIDGE_STATUS_PERIOD_MS` | `status_period_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MICROBRIDGE_NODE_NAME") {
        cfg.node_name = v;
    }
    if let Ok(v) = std::env::var("MICROBRIDGE_COMMAND_TOPIC") {
        cfg.command_topic = v;
    }
    if let Ok(v) = std::env::var("MICROBRIDGE_STATUS_TOPIC") {
        cfg.status_topic = v;
    }
    if let Ok(v) = std::env::var("MICROBRIDGE_SPIN_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.spin_timeout_ms = ms;
        }
    if let Ok(v) = std::env::var("MICROBRIDGE_STATUS_PAYLOAD") {
        cfg.status_payload = v;
    }
    if let Ok(v) = std::env::var("MICROBRIDGE_STATUS_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.status_period_ms = ms;
        }
}

/// Save the config to disk, creating `~/.microbridge/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
