//! Server configuration management.
//!
//! Layers, in increasing precedence: built-in defaults, a `key=value` config
//! file, command-line flags. Invalid numeric values fall back to the
//! defaults with a warning rather than aborting startup; warnings go to
//! stderr directly because logging is initialized from this configuration.

use std::time::Duration;

/// Complete server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listener bind address.
    pub ip: String,
    /// Listener port (1..=65535).
    pub port: u16,
    /// Upper bound on simultaneously-live rooms.
    pub max_rooms: usize,
    /// Target file for the persistent log.
    pub log_file: String,
    /// If false, the log sink is stderr only.
    pub enable_file_logging: bool,
    /// Ping silence that moves a player to temporarily-disconnected.
    pub player_timeout_seconds: u64,
    /// Supervisor tick period.
    pub heartbeat_check_interval: u64,
    /// How long a temporarily-disconnected session survives.
    pub grace_period_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: "0.0.0.0".to_string(),
            port: 8080,
            max_rooms: 15,
            log_file: "server.log".to_string(),
            enable_file_logging: true,
            player_timeout_seconds: 60,
            heartbeat_check_interval: 10,
            grace_period_seconds: 120,
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ServerConfig {
    /// Loads a config file over the current values. A missing or unreadable
    /// file leaves the configuration untouched and returns `false`.
    pub fn load_from_file(&mut self, path: &str) -> bool {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                self.load_from_str(&contents);
                true
            }
            Err(error) => {
                eprintln!("warning: could not read config file {path}: {error}");
                eprintln!("using default configuration values");
                false
            }
        }
    }

    /// Applies `key=value` lines. `#` starts a comment; whitespace around
    /// keys and values is ignored; unknown keys and invalid values warn and
    /// are skipped.
    pub fn load_from_str(&mut self, contents: &str) {
        let defaults = Self::default();
        for (line_number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                eprintln!("warning: invalid config line {}: {line}", line_number + 1);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "ip" => self.ip = value.to_string(),
                "port" => {
                    self.port = parse_bounded(key, value, 1, 65535, u64::from(defaults.port)) as u16;
                }
                "max_rooms" => {
                    self.max_rooms =
                        parse_bounded(key, value, 1, u64::MAX, defaults.max_rooms as u64) as usize;
                }
                "log_file" => self.log_file = value.to_string(),
                "enable_file_logging" => {
                    self.enable_file_logging =
                        parse_bool(key, value, defaults.enable_file_logging);
                }
                "player_timeout_seconds" => {
                    self.player_timeout_seconds =
                        parse_bounded(key, value, 5, u64::MAX, defaults.player_timeout_seconds);
                }
                "heartbeat_check_interval" => {
                    self.heartbeat_check_interval =
                        parse_bounded(key, value, 1, u64::MAX, defaults.heartbeat_check_interval);
                }
                "grace_period_seconds" => {
                    self.grace_period_seconds =
                        parse_bounded(key, value, 1, u64::MAX, defaults.grace_period_seconds);
                }
                _ => eprintln!("warning: unknown configuration key '{key}'"),
            }
        }
    }

    /// Validates cross-field constraints after all sources are applied.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid {
                key: "port".to_string(),
                reason: "must be between 1 and 65535".to_string(),
            });
        }
        if self.ip.is_empty() {
            return Err(ConfigError::Invalid {
                key: "ip".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.grace_period_seconds < self.player_timeout_seconds {
            eprintln!(
                "warning: grace_period_seconds ({}) below player_timeout_seconds ({}); raising it",
                self.grace_period_seconds, self.player_timeout_seconds
            );
            self.grace_period_seconds = self.player_timeout_seconds;
        }
        Ok(())
    }

    /// The resolved record the library consumes.
    pub fn to_core_config(&self) -> shed::ServerConfig {
        shed::ServerConfig {
            ip: self.ip.clone(),
            port: self.port,
            max_rooms: self.max_rooms,
            player_timeout: Duration::from_secs(self.player_timeout_seconds),
            heartbeat_check_interval: Duration::from_secs(self.heartbeat_check_interval),
            grace_period: Duration::from_secs(self.grace_period_seconds),
        }
    }
}

fn parse_bounded(key: &str, value: &str, min: u64, max: u64, default: u64) -> u64 {
    match value.parse::<u64>() {
        Ok(parsed) if (min..=max).contains(&parsed) => parsed,
        _ => {
            eprintln!("warning: invalid {key} '{value}'; using default: {default}");
            default
        }
    }
}

fn parse_bool(key: &str, value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => true,
        "false" | "0" | "no" => false,
        _ => {
            eprintln!("warning: invalid {key} '{value}'; using default: {default}");
            default
        }
    }
}
