//! Host configuration.
//!
//! Loaded from a TOML file. Every section is `#[serde(default)]`, so a file
//! only needs the values it changes:
//!
//! ```toml
//! bind_addr = "0.0.0.0:8080"
//! catalog_path = "/srv/shelf/catalog.json"
//!
//! [search.local]
//! min_local_results = 3
//!
//! [[search.providers]]
//! kind = "GOOGLE_BOOKS"
//! priority = "secondary"
//! require_api_key = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelf_search::{BookSource, SearchConfig};

use crate::error::{AppError, Result};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SHELF_CONFIG";
/// Environment variable overriding `bind_addr`.
pub const BIND_ADDR_ENV: &str = "SHELF_BIND_ADDR";
/// Environment variable carrying the Google Books API key.
pub const GOOGLE_BOOKS_KEY_ENV: &str = "SHELF_GOOGLE_BOOKS_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Address the HTTP API listens on.
    pub bind_addr: String,
    /// JSON file holding the local catalog.
    pub catalog_path: PathBuf,
    pub search: SearchConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            catalog_path: default_data_dir().join("catalog.json"),
            search: SearchConfig::default(),
        }
    }
}

impl ShelfConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path` if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Returns the default config file path: `<config dir>/shelf/config.toml`.
    pub fn default_config_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("shelf").join("config.toml"),
            None => PathBuf::from("/tmp/shelf-config/config.toml"),
        }
    }

    /// The config path to use: `$SHELF_CONFIG` when set, else the default.
    pub fn resolve_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_config_path)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides read through `lookup`. Blank values are ignored.
    ///
    /// An API key is attached to the Google Books provider entry; the entry
    /// is added with its preset when the file has none.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = lookup(BIND_ADDR_ENV) {
            self.bind_addr = addr;
        }
        if let Some(key) = lookup(GOOGLE_BOOKS_KEY_ENV) {
            let providers = &mut self.search.providers;
            if !providers.iter().any(|p| p.kind == BookSource::GoogleBooks) {
                providers.push(shelf_search::ProviderConfig::google_books());
            }
            for provider in providers.iter_mut().filter(|p| p.kind == BookSource::GoogleBooks) {
                provider.api_key = Some(key.clone());
            }
            tracing::debug!("Google Books API key taken from environment");
        }
    }

    /// Validate the search section and the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] for an unparseable bind address and
    /// [`AppError::Search`] for invalid search settings.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| AppError::Config(format!("bind_addr '{}': {e}", self.bind_addr)))?;
        self.search.validate()?;
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("shelf"),
        None => PathBuf::from("/tmp/shelf-data"),
    }
}
