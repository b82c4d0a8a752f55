//! Configuration management for tunnelgate
//!
//! Config files are stored in platform-appropriate locations:
//! - Linux: ~/.config/tunnelgate/
//! - macOS: ~/Library/Application Support/tunnelgate/
//! - Windows: %APPDATA%\tunnelgate\
//!
//! `TUNNELGATE_CONFIG` overrides the location.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "TUNNELGATE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    NoDirFound,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
}

/// Admin interface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public domain of the admin interface, used to build login links
    #[serde(default = "default_admin_domain")]
    pub admin_domain: String,

    /// Token signing secret (base64 encoded)
    /// If not set, a random secret is generated on every start
    pub token_secret: Option<String>,

    /// Login link key TTL in seconds
    #[serde(default = "default_login_key_ttl")]
    pub login_key_ttl: u64,

    /// Session (access token) TTL in seconds
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl: u64,

    /// Emails allowed to request a login link. Empty allows any address.
    #[serde(default)]
    pub allowed_emails: Vec<String>,

    /// File login links are appended to. They are only logged when unset.
    pub login_link_file: Option<PathBuf>,

    /// Tunnel database file. In-memory only when unset.
    pub db_path: Option<PathBuf>,

    /// Directory holding styles.css and the *.tmpl views.
    /// The bundled assets are used when unset.
    pub assets_dir: Option<PathBuf>,

    /// First port handed out to tunnels
    #[serde(default = "default_tunnel_port_start")]
    pub tunnel_port_start: u16,

    /// Last port handed out to tunnels (inclusive)
    #[serde(default = "default_tunnel_port_end")]
    pub tunnel_port_end: u16,
}

// Default value functions
fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    crate::DEFAULT_ADMIN_PORT
}
fn default_admin_domain() -> String {
    "localhost".to_string()
}
fn default_login_key_ttl() -> u64 {
    900 // 15 minutes
}
fn default_access_ttl() -> u64 {
    2_592_000 // 30 days
}
fn default_tunnel_port_start() -> u16 {
    9300
}
fn default_tunnel_port_end() -> u16 {
    9399
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            admin_domain: default_admin_domain(),
            token_secret: None,
            login_key_ttl: default_login_key_ttl(),
            access_token_ttl: default_access_ttl(),
            allowed_emails: Vec::new(),
            login_link_file: None,
            db_path: None,
            assets_dir: None,
            tunnel_port_start: default_tunnel_port_start(),
            tunnel_port_end: default_tunnel_port_end(),
        }
    }
}

impl ServerConfig {
    /// Whether `email` may request a login link
    pub fn email_allowed(&self, email: &str) -> bool {
        self.allowed_emails.is_empty()
            || self
                .allowed_emails
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(email))
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("tunnelgate"))
            .ok_or(ConfigError::NoDirFound)
    }

    /// Get config file path, honouring `TUNNELGATE_CONFIG`
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from specific path
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save config to specific path
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
