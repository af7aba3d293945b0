//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/treino/config.toml)
//! 3. Environment variables (TREINO_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
const ENV_PREFIX: &str = "TREINO";

/// Asset cache bound on the authoritative device
pub const DEFAULT_ASSET_CACHE_CAPACITY: usize = 100;

/// Asset cache bound on the mirror device, which has less memory to spare
pub const DEFAULT_MIRROR_CACHE_CAPACITY: usize = 50;

/// Subdirectory holding image files inside a documents directory
const IMAGE_DIR: &str = "images";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Documents directory of the authoritative device (database, images)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Documents directory of the mirror device
    #[serde(default = "default_mirror_dir")]
    pub mirror_dir: PathBuf,

    /// Directory shared by both roles for durable link contexts
    #[serde(default = "default_link_dir")]
    pub link_dir: PathBuf,

    /// Maximum number of images held in memory on the authoritative device
    #[serde(default = "default_asset_cache_capacity")]
    pub asset_cache_capacity: usize,

    /// Maximum number of images held in memory on the mirror device
    #[serde(default = "default_mirror_cache_capacity")]
    pub mirror_cache_capacity: usize,

    /// Whether mutations are propagated to the mirror
    #[serde(default = "default_true")]
    pub sync_enabled: bool,

    /// Log level for the `treino` crates (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            mirror_dir: default_mirror_dir(),
            link_dir: default_link_dir(),
            asset_cache_capacity: DEFAULT_ASSET_CACHE_CAPACITY,
            mirror_cache_capacity: DEFAULT_MIRROR_CACHE_CAPACITY,
            sync_enabled: true,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (TREINO_DATA_DIR, TREINO_MIRROR_DIR, ...)
    /// 2. Config file (~/.config/treino/config.toml or TREINO_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_dirs()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration rooted in a single directory (useful for testing)
    pub fn in_dir(root: &Path) -> Self {
        Self {
            data_dir: root.join("phone"),
            mirror_dir: root.join("watch"),
            link_dir: root.join("link"),
            ..Self::default()
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_MIRROR_DIR", ENV_PREFIX)) {
            self.mirror_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_LINK_DIR", ENV_PREFIX)) {
            self.link_dir = PathBuf::from(val);
        }

        // Unparseable capacities keep the current value
        if let Ok(val) = std::env::var(format!("{}_ASSET_CACHE_CAPACITY", ENV_PREFIX)) {
            if let Ok(n) = val.parse() {
                self.asset_cache_capacity = n;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_MIRROR_CACHE_CAPACITY", ENV_PREFIX)) {
            if let Ok(n) = val.parse() {
                self.mirror_cache_capacity = n;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure the device directories exist
    fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.data_dir, &self.mirror_dir, &self.link_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create directory: {:?}", dir))?;
            }
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with TREINO_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("treino")
            .join("config.toml")
    }

    /// Get the path to the SQLite key-value database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("treino.db")
    }

    /// Image directory of the authoritative device
    ///
    /// Kept apart from the database so no image name can address it.
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGE_DIR)
    }

    /// Image directory of the mirror device
    pub fn mirror_image_dir(&self) -> PathBuf {
        self.mirror_dir.join(IMAGE_DIR)
    }
}

fn default_data_dir() -> PathBuf {
    base_dir().join("phone")
}

fn default_mirror_dir() -> PathBuf {
    base_dir().join("watch")
}

fn default_link_dir() -> PathBuf {
    base_dir().join("link")
}

fn base_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("treino")
}

fn default_asset_cache_capacity() -> usize {
    DEFAULT_ASSET_CACHE_CAPACITY
}

fn default_mirror_cache_capacity() -> usize {
    DEFAULT_MIRROR_CACHE_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
