// Configuration loading and parsing (config/server.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Name of the config file inside `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "server.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub websocket: ListenConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl ListenConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin for the create-room endpoint. Any origin when unset.
    #[serde(default)]
    pub cors_origin: Option<String>,
}

impl HttpConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Behavior switches for the room/session core. All default to `false`,
/// which reproduces the original open-room semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionConfig {
    /// Only the moderator may start, end or reset voting.
    #[serde(default)]
    pub moderator_only: bool,
    /// Drop a member's vote when they leave the room.
    #[serde(default)]
    pub prune_departed_votes: bool,
    /// Answer dropped operations with an `error` event to the sender.
    #[serde(default)]
    pub report_errors: bool,
}

impl Default for Config {
    /// Loopback listeners on ephemeral ports.
    fn default() -> Self {
        Config {
            websocket: ListenConfig {
                host: "127.0.0.1".into(),
                port: 0,
            },
            http: HttpConfig {
                host: "127.0.0.1".into(),
                port: 0,
                cors_origin: None,
            },
            session: SessionConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/server.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config = parse_config(&text).map_err(|source| ConfigError::ParseError {
        path: path.clone(),
        source,
    })?;

    validate(&config)?;
    Ok(config)
}

/// Parse a config document without touching the filesystem.
pub fn parse_config(text: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(text)
}

/// Seed `config/server.toml` from `defaults/server.toml` when it is missing.
/// An existing file is left alone. Returns the path written, if any.
pub fn ensure_config_file(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let target = base_dir.join("config").join(CONFIG_FILE);
    if target.is_file() {
        return Ok(None);
    }

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    if !source.is_file() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "no {CONFIG_FILE} in config/ or defaults/ under {}",
                base_dir.display()
            ),
        });
    }

    let copy_error = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {} to {}: {e}", source.display(), target.display()),
    };
    std::fs::create_dir_all(base_dir.join("config")).map_err(copy_error)?;
    std::fs::copy(&source, &target).map_err(copy_error)?;

    Ok(Some(target))
}

/// Load config relative to the current working directory, initializing it
/// from `defaults/` when needed.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_file(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.websocket.host.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "websocket.host".into(),
            message: "must not be empty".into(),
        });
    }

    if config.http.host.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "http.host".into(),
            message: "must not be empty".into(),
        });
    }

    // Port 0 means "pick any free port", so only fixed ports can clash.
    let ws_port = config.websocket.port;
    if ws_port != 0 && ws_port == config.http.port {
        return Err(ConfigError::ValidationError {
            field: "http.port".into(),
            message: format!("must differ from websocket.port ({ws_port})"),
        });
    }

    if let Some(origin) = &config.http.cors_origin {
        if origin.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                field: "http.cors_origin".into(),
                message: "must not be empty when set".into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
