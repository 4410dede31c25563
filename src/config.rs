//! Relay configuration.
//!
//! Values come from built-in defaults, then an optional `key = value`
//! file, then `PACKET_RELAY_*` environment variables. Command-line flags
//! are applied on top by the binary.

use std::path::Path;

use crate::error::ConfigError;
use crate::sink::ConnectionMode;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/packet-relay.conf";
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080";
const DEFAULT_LOG_FILTER: &str = "info";

const ENV_PREFIX: &str = "PACKET_RELAY_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interface to capture on; `None` picks the first suitable one
    pub interface: Option<String>,
    pub endpoint: String,
    pub connection_mode: ConnectionMode,
    pub include_ipv6: bool,
    pub max_packets: Option<u64>,
    /// Tracing filter used when `RUST_LOG` is not set
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connection_mode: ConnectionMode::default(),
            include_ipv6: false,
            max_packets: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default path) and the environment.
    ///
    /// A missing file is not an error; an explicitly given one must exist.
    /// Call [`Config::validate`] once any command-line overrides are applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        let (path, required) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        if required || path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            config.apply_file(&content)?;
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Apply `key = value` lines. Blank lines, `#` comments and unknown
    /// keys are ignored.
    pub fn apply_file(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                if !self.set(key, value.trim())? {
                    tracing::warn!("Ignoring unknown config key: {}", key);
                }
            }
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        for key in [
            "interface",
            "endpoint",
            "connection_mode",
            "include_ipv6",
            "max_packets",
            "log",
        ] {
            let var = format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase());
            if let Ok(value) = std::env::var(&var) {
                self.set(key, value.trim())?;
            }
        }
        Ok(())
    }

    /// Set one value by key. Returns `false` for unknown keys.
    fn set(&mut self, key: &str, value: &str) -> Result<bool, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "interface" => {
                self.interface = (!value.is_empty()).then(|| value.to_string());
            }
            "endpoint" => self.endpoint = value.to_string(),
            "connection_mode" => {
                self.connection_mode = value.parse().map_err(|_| invalid())?;
            }
            "include_ipv6" => self.include_ipv6 = parse_bool(value).ok_or_else(invalid)?,
            "max_packets" => {
                self.max_packets = if value.is_empty() {
                    None
                } else {
                    Some(value.parse().map_err(|_| invalid())?)
                };
            }
            "log" | "log_filter" => self.log_filter = value.to_string(),
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Check values that can only be judged as a whole.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("ws://") || self.endpoint.starts_with("wss://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
