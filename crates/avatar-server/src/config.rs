//! Server configuration loading from file and environment variables.

use avatar_speech::{SpeechConfig, TokenMode};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Speech provider settings. The key is normally supplied through
    /// `AZ_SPEECH_KEY` rather than the file.
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
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

    /// Requests per minute allowed per client IP on `/api/speech/*`.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Directory holding a built browser client, served as static files.
    #[serde(default)]
    pub client_dir: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "avatar_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3001
}

fn default_rate_limit() -> u32 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rate_limit_per_minute: default_rate_limit(),
            client_dir: None,
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

    /// An environment override held an unusable value.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Loads configuration from a TOML file, falling back to defaults, then
/// applies environment overrides from the process environment.
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if an override holds an invalid value.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let config = match path {
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

    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Applies environment overrides read through `lookup`.
///
/// - `AVATAR_HOST` overrides `server.host`
/// - `AVATAR_PORT` overrides `server.port`
/// - `AVATAR_CLIENT_DIR` overrides `server.client_dir`
/// - `AZ_SPEECH_KEY` overrides `speech.key`
/// - `AZ_SPEECH_REGION` overrides `speech.region`
/// - `AVATAR_SPEECH_VOICE` overrides `speech.voice`
/// - `AVATAR_TOKEN_MODE` overrides `speech.token_mode` (`issue_token` or
///   `subscription_key`)
/// - `AVATAR_LOG_LEVEL` overrides `logging.level`
/// - `AVATAR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// Unparseable host and port values are ignored, as is an empty client
/// directory. An unknown token mode is an error.
pub fn apply_env_overrides(
    mut config: Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    if let Some(host) = lookup("AVATAR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("AVATAR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(dir) = lookup("AVATAR_CLIENT_DIR") {
        if !dir.trim().is_empty() {
            config.server.client_dir = Some(dir);
        }
    }
    if let Some(key) = lookup("AZ_SPEECH_KEY") {
        config.speech.key = key;
    }
    if let Some(region) = lookup("AZ_SPEECH_REGION") {
        config.speech.region = region;
    }
    if let Some(voice) = lookup("AVATAR_SPEECH_VOICE") {
        if !voice.trim().is_empty() {
            config.speech.voice = voice;
        }
    }
    if let Some(mode) = lookup("AVATAR_TOKEN_MODE") {
        config.speech.token_mode = mode.parse().map_err(|_| ConfigError::InvalidEnv {
            name: "AVATAR_TOKEN_MODE",
            value: mode.clone(),
        })?;
    }
    if let Some(level) = lookup("AVATAR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("AVATAR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }

    Ok(config)
}
