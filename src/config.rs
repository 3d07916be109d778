//! Configuration management for the relay
//!
//! Two sources feed the process-wide configuration:
//!
//! - an optional TOML file with server, CORS and logging settings ([`Config`])
//! - the process environment with the OpenRouter credentials and the
//!   identification headers sent upstream ([`UpstreamConfig`])
//!
//! Both are read once at startup and never change afterwards.

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Environment variable holding the OpenRouter API key (required)
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
/// Environment variable overriding the upstream base URL
pub const ENV_BASE_URL: &str = "OPENROUTER_BASE_URL";
/// Environment variable for the `HTTP-Referer` identification header
pub const ENV_SITE_URL: &str = "YOUR_SITE_URL";
/// Environment variable for the `X-Title` identification header
pub const ENV_SITE_NAME: &str = "YOUR_SITE_NAME";

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_SITE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SITE_NAME: &str = "FastAPI OpenRouter App";

/// Root configuration structure (file-backed)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Address to bind the listener to
    ///
    /// `host` must be an IP address literal; hostnames are not resolved.
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip = self.host.trim().parse::<IpAddr>().map_err(|_| {
            AppError::Config(format!(
                "server.host '{}' is not an IP address (use e.g. 127.0.0.1 or 0.0.0.0)",
                self.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Cross-origin policy for the browser frontend
///
/// Credentials are always allowed; methods and request headers are mirrored
/// from the preflight request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

impl CorsConfig {
    /// Parse the configured origins into header values
    pub fn origin_header_values(&self) -> AppResult<Vec<HeaderValue>> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).map_err(|e| {
                    AppError::Config(format!("cors origin '{}' is not a valid header: {}", origin, e))
                })
            })
            .collect()
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            }
        })?;

        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist
    ///
    /// A file that exists but cannot be read, parsed or validated is still an error.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate configuration after parsing
    pub fn validate(&self) -> AppResult<()> {
        if self.server.port == 0 {
            return Err(AppError::Config("server.port must be greater than 0".to_string()));
        }

        if self.server.host.trim().is_empty() {
            return Err(AppError::Config("server.host cannot be empty".to_string()));
        }
        self.server.socket_addr()?;

        for origin in &self.cors.allowed_origins {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(AppError::Config(format!(
                    "cors origin '{}' must start with http:// or https://",
                    origin
                )));
            }
        }
        self.cors.origin_header_values()?;

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

/// Secret bearer token for the upstream API
///
/// `Debug` and `Display` never print the key itself.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Load `.env` from the working directory into the process environment
///
/// Variables that are already set keep their values. Returns the loaded path,
/// or `None` when there is no `.env` or it could not be read (logged).
pub fn load_dotenv() -> Option<PathBuf> {
    report_dotenv(dotenvy::dotenv())
}

/// Load a specific env file into the process environment
pub fn load_dotenv_from<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    let path = path.as_ref();
    report_dotenv(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn report_dotenv(result: Result<PathBuf, dotenvy::Error>) -> Option<PathBuf> {
    match result {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unreadable env file");
            None
        }
    }
}

/// Upstream connection settings, read from the environment
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    api_key: ApiKey,
    base_url: String,
    site_url: String,
    site_name: String,
}

impl UpstreamConfig {
    /// Read the upstream settings from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] if `OPENROUTER_API_KEY` is missing or blank,
    /// or if `OPENROUTER_BASE_URL` is not an http(s) URL.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(format!("{} is not set in the environment", ENV_API_KEY))
            })?;

        let base_url = lookup(ENV_BASE_URL)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "{} must start with http:// or https://, got '{}'",
                ENV_BASE_URL, base_url
            )));
        }

        Ok(Self {
            api_key: ApiKey(api_key),
            base_url: base_url.trim_end_matches('/').to_string(),
            site_url: lookup(ENV_SITE_URL).unwrap_or_else(|| DEFAULT_SITE_URL.to_string()),
            site_name: lookup(ENV_SITE_NAME).unwrap_or_else(|| DEFAULT_SITE_NAME.to_string()),
        })
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Base URL without a trailing slash, e.g. `https://openrouter.ai/api/v1`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Value of the `HTTP-Referer` header sent upstream
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Value of the `X-Title` header sent upstream
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    /// Full URL of the chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}
