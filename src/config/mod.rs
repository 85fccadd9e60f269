//! Configuration management for pybake

pub mod schema;

pub use schema::Config;

use crate::error::{BakeError, BakeResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of the project-local configuration
pub const LOCAL_CONFIG_NAME: &str = "pybake.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pybake")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pybake")
    }

    /// Directory holding per-build scratch directories
    pub fn builds_dir() -> PathBuf {
        Self::state_dir().join("builds")
    }

    /// Get the build history log path
    pub fn history_path() -> PathBuf {
        Self::state_dir().join("history.log")
    }

    /// Search `start` and its ancestors for a project-local `pybake.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_NAME))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> BakeResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> BakeResult<Config> {
        let content = read_config(path).await?;

        toml::from_str(&content).map_err(|e| BakeError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with an optional project-local file layered on top.
    ///
    /// Tables are merged key by key, so a local file only needs the keys it
    /// overrides.
    pub async fn load_merged(&self, local: Option<&Path>) -> BakeResult<Config> {
        let mut merged = if self.config_path.exists() {
            parse_table(&self.config_path, &read_config(&self.config_path).await?)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        if let Some(local_path) = local {
            debug!("Merging local config {}", local_path.display());
            let overlay = parse_table(local_path, &read_config(local_path).await?)?;
            merge_values(&mut merged, overlay);
        }

        merged.try_into().map_err(|e: toml::de::Error| BakeError::ConfigInvalid {
            path: local
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.config_path.clone()),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> BakeResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            BakeError::io(format!("writing config to {}", self.config_path.display()), e)
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> BakeResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BakeError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> BakeResult<()> {
        for dir in [Self::state_dir(), Self::builds_dir()] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                BakeError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_config(path: &Path) -> BakeResult<String> {
    fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BakeError::ConfigNotFound(path.to_path_buf()),
        _ => BakeError::io(format!("reading config from {}", path.display()), e),
    })
}

fn parse_table(path: &Path, content: &str) -> BakeResult<toml::Value> {
    content.parse::<toml::Table>()
        .map(toml::Value::Table)
        .map_err(|e| BakeError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Recursively merge `overlay` into `base`; non-table values in `overlay` win.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
