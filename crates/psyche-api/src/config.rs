//! Server configuration from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FADE_OUT_MS: u64 = 250;
const DEFAULT_SESSION_RETENTION_SECS: u64 = 300;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Directory of extra narrative documents.
    pub content_dir: Option<PathBuf>,
    /// Fade-out for narratives that do not set their own.
    pub fade_out: Duration,
    /// How long a finished session stays readable before it is removed.
    pub session_retention: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            content_dir: None,
            fade_out: Duration::from_millis(DEFAULT_FADE_OUT_MS),
            session_retention: Duration::from_secs(DEFAULT_SESSION_RETENTION_SECS),
        }
    }
}

impl ServerConfig {
    /// Reads `HOST`, `PORT`, `CONTENT_DIR`, `FADE_OUT_MS` and
    /// `SESSION_RETENTION_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServerConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => defaults.port,
        };
        let content_dir = lookup("CONTENT_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);
        let fade_out = match lookup("FADE_OUT_MS") {
            Some(raw) => Duration::from_millis(raw.parse().map_err(|e| {
                AppError::Config(format!("FADE_OUT_MS must be milliseconds: {e}"))
            })?),
            None => defaults.fade_out,
        };
        let session_retention = match lookup("SESSION_RETENTION_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().map_err(|e| {
                AppError::Config(format!("SESSION_RETENTION_SECS must be seconds: {e}"))
            })?),
            None => defaults.session_retention,
        };
        Ok(Self {
            host,
            port,
            content_dir,
            fade_out,
            session_retention,
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if host and port do not form an address.
    pub fn addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}
