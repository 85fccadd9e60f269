//! Configuration schema for pybake
//!
//! Global configuration is stored at `~/.config/pybake/config.toml`,
//! project overrides in `pybake.toml` at the build context root.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Container engine settings
    pub engine: EngineConfig,

    /// Base image, paths and runtime environment
    pub image: ImageConfig,

    /// Native packages installed with the OS package manager
    pub system: SystemConfig,

    /// Build variant switches
    pub variant: VariantConfig,

    /// Unprivileged runtime identity
    pub user: UserConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Record completed builds in the history log
    pub history: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { history: true }
    }
}

/// Container engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine program: "auto", "podman" or "docker"
    pub program: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "auto".to_string(),
        }
    }
}

/// Image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Base runtime image, pinned to an interpreter version
    pub base: String,

    /// Working directory inside the image
    pub workdir: String,

    /// Dependency manifest, relative to the build context root
    pub manifest: String,

    /// Source tree to copy, relative to the build context root
    pub source: String,

    /// Set PYTHONDONTWRITEBYTECODE=1
    pub dont_write_bytecode: bool,

    /// Set PYTHONUNBUFFERED=1
    pub unbuffered: bool,

    /// Additional environment variables baked into the image
    pub env: BTreeMap<String, String>,

    /// Default command (exec form)
    pub command: Option<Vec<String>>,

    /// Accept a base image without a version tag or digest
    pub allow_unpinned: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            base: "python:3.12-slim".to_string(),
            workdir: "/app".to_string(),
            manifest: "requirements.txt".to_string(),
            source: ".".to_string(),
            dont_write_bytecode: true,
            unbuffered: true,
            env: BTreeMap::new(),
            command: None,
            allow_unpinned: false,
        }
    }
}

/// System package configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Always-installed packages (compiler toolchain)
    pub packages: Vec<String>,

    /// Database client development packages
    pub db_client_packages: Vec<String>,

    /// Remove package manager lists after install
    pub clean_cache: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            packages: vec!["build-essential".to_string()],
            db_client_packages: vec!["libpq-dev".to_string()],
            clean_cache: true,
        }
    }
}

/// Build variant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantConfig {
    /// Install database client headers. Unset means infer from the manifest.
    pub include_db_client_headers: Option<bool>,

    /// Create a writable static-assets directory
    pub create_static_dir: bool,

    /// Static-assets directory, relative to the working directory
    pub static_dir: String,

    /// Port the contained service listens on
    pub exposed_port: Option<u16>,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            include_db_client_headers: None,
            create_static_dir: true,
            static_dir: "staticfiles".to_string(),
            exposed_port: None,
        }
    }
}

/// Runtime user configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Account name
    pub name: String,

    /// Fixed numeric uid (optional)
    pub uid: Option<u32>,

    /// Skip creation when the account already exists in the base image
    pub idempotent: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            name: "appuser".to_string(),
            uid: None,
            idempotent: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[image]"));
        assert!(toml.contains("[variant]"));
        assert!(toml.contains("python:3.12-slim"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.image.workdir, "/app");
        assert_eq!(config.user.name, "appuser");
        assert!(config.variant.exposed_port.is_none());
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [variant]
            exposed_port = 8000
            include_db_client_headers = false
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.variant.exposed_port, Some(8000));
        assert_eq!(config.variant.include_db_client_headers, Some(false));
        assert!(config.variant.create_static_dir); // default preserved
    }
}
