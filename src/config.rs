//! TOML configuration.
//!
//! A single file (default `./config/vidnest.toml`) carries the database
//! location, HTTP server settings, token secrets, pagination bounds, the
//! media storage backend, and optional identity federation credentials.
//! See `config/vidnest.example.toml` for a complete example.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    pub media: MediaConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origin. Any origin is accepted when unset.
    #[serde(default)]
    pub cors_origin: Option<String>,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub json_logs: bool,
}

fn default_body_limit() -> usize {
    20 * 1024 * 1024
}
fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_issuer")]
    pub issuer: String,
    pub access_token_secret: String,
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: u64,
    pub refresh_token_secret: String,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: u64,
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_issuer() -> String {
    "vidnest".to_string()
}
fn default_access_ttl() -> u64 {
    86_400
}
fn default_refresh_ttl() -> u64 {
    864_000
}
fn default_secure_cookies() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaginationConfig {
    #[serde(default = "default_page_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_page_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_page_limit() -> i64 {
    10
}
fn default_max_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct MediaConfig {
    #[serde(default = "default_media_provider")]
    pub provider: String,
    #[serde(default)]
    pub local: Option<LocalMediaConfig>,
    #[serde(default)]
    pub cloudinary: Option<CloudinaryConfig>,
}

fn default_media_provider() -> String {
    "local".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalMediaConfig {
    pub root: PathBuf,
    /// Prefix of the URLs handed out for stored objects, e.g.
    /// `http://127.0.0.1:8000/media`.
    pub public_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    #[serde(default = "default_cloudinary_timeout")]
    pub timeout_secs: u64,
}

fn default_cloudinary_timeout() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OAuthConfig {
    pub google: Option<GoogleOAuthConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl MediaConfig {
    pub fn is_local(&self) -> bool {
        self.provider == "local"
    }
}

impl Config {
    /// In-code configuration rooted at `root`: database under `root/data`,
    /// local media under `root/media`, fixed development secrets.
    pub fn minimal(root: &Path) -> Self {
        Self {
            db: DbConfig {
                path: root.join("data").join("vidnest.sqlite"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:8000".to_string(),
                cors_origin: None,
                body_limit_bytes: default_body_limit(),
                request_timeout_secs: default_request_timeout(),
                json_logs: false,
            },
            auth: AuthConfig {
                issuer: default_issuer(),
                access_token_secret: "dev-access-secret".to_string(),
                access_token_ttl_secs: default_access_ttl(),
                refresh_token_secret: "dev-refresh-secret".to_string(),
                refresh_token_ttl_secs: default_refresh_ttl(),
                secure_cookies: false,
            },
            pagination: PaginationConfig::default(),
            media: MediaConfig {
                provider: "local".to_string(),
                local: Some(LocalMediaConfig {
                    root: root.join("media"),
                    public_base_url: "http://127.0.0.1:8000/media".to_string(),
                }),
                cloudinary: None,
            },
            oauth: OAuthConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Tokens
    if config.auth.access_token_secret.trim().is_empty() {
        anyhow::bail!("auth.access_token_secret must not be empty");
    }
    if config.auth.refresh_token_secret.trim().is_empty() {
        anyhow::bail!("auth.refresh_token_secret must not be empty");
    }
    if config.auth.access_token_secret == config.auth.refresh_token_secret {
        anyhow::bail!("auth.access_token_secret and auth.refresh_token_secret must differ");
    }
    if config.auth.access_token_ttl_secs == 0 || config.auth.refresh_token_ttl_secs == 0 {
        anyhow::bail!("auth token TTLs must be > 0");
    }

    // Pagination
    if config.pagination.default_limit < 1 {
        anyhow::bail!("pagination.default_limit must be >= 1");
    }
    if config.pagination.max_limit < config.pagination.default_limit {
        anyhow::bail!("pagination.max_limit must be >= pagination.default_limit");
    }

    // Media
    match config.media.provider.as_str() {
        "local" => {
            if config.media.local.is_none() {
                anyhow::bail!("[media.local] is required when media.provider is 'local'");
            }
        }
        "cloudinary" => {
            if config.media.cloudinary.is_none() {
                anyhow::bail!("[media.cloudinary] is required when media.provider is 'cloudinary'");
            }
        }
        other => anyhow::bail!(
            "Unknown media provider: '{}'. Must be local or cloudinary.",
            other
        ),
    }

    Ok(())
}
