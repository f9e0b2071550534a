//! Process configuration, built once at startup and passed by reference.
//!
//! No module-level mutable globals: everything the server needs (API key,
//! storage paths, bind address) lives in an explicit `AppConfig`.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub const APP_NAME: &str = "MediClear";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// OpenRouter chat-completions endpoint base.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Maximum accepted upload size (10 MB).
pub const MAX_FILE_SIZE_BYTES: usize = 10 * 1024 * 1024;

pub fn default_log_filter() -> &'static str {
    "mediclear=info,tower_http=info"
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY is not set; refusing to start without credentials")]
    MissingApiKey,
    #[error("invalid MEDICLEAR_BIND address: {0}")]
    InvalidBindAddr(String),
}

/// Runtime configuration resolved from the process environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer token for the completion provider.
    pub api_key: String,
    /// Chat-completions base URL (overridable for tests and proxies).
    pub base_url: String,
    /// Root directory for the database and stored record files.
    pub storage_dir: PathBuf,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// A missing API key is a hard error: the server must never start and
    /// then fail on the first outbound call.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary lookup function.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = get("OPENROUTER_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let base_url = get("MEDICLEAR_BASE_URL")
            .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let storage_dir = match get("MEDICLEAR_STORAGE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_storage_dir(),
        };

        let bind_addr = match get("MEDICLEAR_BIND") {
            Some(addr) => addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddr(addr))?,
            None => SocketAddr::from(([127, 0, 0, 1], 8000)),
        };

        Ok(Self {
            api_key,
            base_url,
            storage_dir,
            bind_addr,
        })
    }

    /// Directory holding uploaded record files.
    pub fn files_dir(&self) -> PathBuf {
        self.storage_dir.join("files")
    }

    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join("mediclear.db")
    }
}

/// ~/MediClear/ on all platforms (user-visible).
fn default_storage_dir() -> PathBuf {
    let home = dirs::home_dir().expect("Cannot determine home directory");
    home.join(APP_NAME)
}
