//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::util::rate_limit::{ACTION_RATE_LIMIT, MOVE_RATE_LIMIT};

/// Default CORS origins (local dev client)
const DEFAULT_CLIENT_ORIGIN: &str = "http://localhost:5173,http://127.0.0.1:5173";

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// Delay between a death and the automatic respawn
    pub respawn_delay: Duration,
    /// Interval of the periodic `game:update` snapshot broadcast
    pub game_update_interval: Duration,
    /// Max `player:move` frames per second per connection
    pub move_rate_limit: u32,
    /// Max shoot/reload/switch/respawn/ping frames per second per connection
    pub action_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| DEFAULT_CLIENT_ORIGIN.to_string()),

            respawn_delay: Duration::from_millis(parse_var("RESPAWN_DELAY_MS", 5_000)?),
            game_update_interval: Duration::from_millis(parse_var(
                "GAME_UPDATE_INTERVAL_MS",
                1_000,
            )?),
            move_rate_limit: parse_var("MOVE_RATE_LIMIT", MOVE_RATE_LIMIT)?,
            action_rate_limit: parse_var("ACTION_RATE_LIMIT", ACTION_RATE_LIMIT)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            log_level: "info".to_string(),
            client_origin: DEFAULT_CLIENT_ORIGIN.to_string(),
            respawn_delay: Duration::from_secs(5),
            game_update_interval: Duration::from_secs(1),
            move_rate_limit: MOVE_RATE_LIMIT,
            action_rate_limit: ACTION_RATE_LIMIT,
        }
    }
}

/// Read an optional numeric variable, using `default` when unset
fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
