/// Gallery configuration
///
/// Read from `config.json` in the platform config directory:
/// - Linux: ~/.config/design-gallery/config.json
/// - macOS: ~/Library/Application Support/design-gallery/config.json
/// - Windows: %APPDATA%\design-gallery\config.json
///
/// Every field is optional in the file; missing ones take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::cache::CacheSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GalleryConfig {
    // ========== Sources ==========
    /// Base URL relative resource paths are resolved against
    pub base_url: String,

    /// The entry source document (JSON array of designs)
    pub data_url: String,

    /// Route opened at startup, e.g. "#/mobile". Empty selects random.
    pub start_route: String,

    // ========== Pagination & windowing ==========
    /// Entries per page
    pub page_size: usize,

    /// Fixed height of one card
    pub item_extent: f32,

    /// Cards kept mounted above and below the viewport
    pub buffer_count: usize,

    /// Viewport height assumed until the first scroll event
    pub viewport_extent: f32,

    // ========== Visibility ==========
    /// Distance around the viewport at which elements count as visible
    pub visibility_margin: f32,

    /// Fraction of the sentinel that must be visible to load the next page
    pub sentinel_threshold: f32,

    /// Height of the sentinel below the last card
    pub sentinel_extent: f32,

    // ========== Offline cache ==========
    /// Prefix of every cache partition this app owns
    pub cache_family: String,

    /// Current cache generation; changing it evicts older partitions
    pub cache_version: String,

    /// Resources pre-populated into the shell partition on install
    pub shell_manifest: Vec<String>,

    /// Overrides the default cache database location
    pub cache_db_path: Option<PathBuf>,
}

const DEFAULT_DATA_URL: &str = "data/designs.json";

/// Upper bound for `buffer_count`; far more than any screen needs
pub const MAX_BUFFER_COUNT: usize = 1000;

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            data_url: DEFAULT_DATA_URL.to_string(),
            start_route: String::new(),
            page_size: 20,
            item_extent: 400.0,
            buffer_count: 5,
            viewport_extent: 800.0,
            visibility_margin: 100.0,
            sentinel_threshold: 0.1,
            sentinel_extent: 16.0,
            cache_family: "design-gallery".to_string(),
            cache_version: "v1".to_string(),
            shell_manifest: vec![DEFAULT_DATA_URL.to_string()],
            cache_db_path: None,
        }
    }
}

impl GalleryConfig {
    /// Load from the default location; a missing file means defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                log::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("⚙️  Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse from a JSON string and validate
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get the path where the config file is expected
    pub fn config_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("design-gallery");
        path.push("config.json");
        Some(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if !(self.item_extent > 0.0) {
            return Err(ConfigError::Invalid("item_extent must be positive".into()));
        }
        if self.buffer_count > MAX_BUFFER_COUNT {
            return Err(ConfigError::Invalid(format!(
                "buffer_count must be at most {}",
                MAX_BUFFER_COUNT
            )));
        }
        if !(self.viewport_extent >= 0.0) || !(self.sentinel_extent >= 0.0) {
            return Err(ConfigError::Invalid("extents must not be negative".into()));
        }
        if !(self.visibility_margin >= 0.0) {
            return Err(ConfigError::Invalid("visibility_margin must not be negative".into()));
        }
        if !(0.0..=1.0).contains(&self.sentinel_threshold) {
            return Err(ConfigError::Invalid("sentinel_threshold must be within [0, 1]".into()));
        }
        if self.cache_family.trim().is_empty() || self.cache_version.trim().is_empty() {
            return Err(ConfigError::Invalid("cache_family and cache_version must not be empty".into()));
        }
        Ok(())
    }

    /// Partition naming and install manifest for the cache coordinator
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings::new(&self.cache_family, &self.cache_version, self.shell_manifest.clone())
    }
}
