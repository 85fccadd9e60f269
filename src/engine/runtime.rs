//! Container engine abstraction
//!
//! Provides a trait for the image operations pybake needs, implemented by
//! the Podman and Docker command-line backends.

use crate::error::{BakeError, BakeResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Everything the engine needs to run one build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Generated Dockerfile (outside the context)
    pub dockerfile: PathBuf,
    /// Build context root sent to the engine
    pub context_dir: PathBuf,
    /// Tags to apply; the first one is the content-addressed tag
    pub tags: Vec<String>,
    /// Image labels
    pub labels: BTreeMap<String, String>,
    /// Disable the engine's layer cache
    pub no_cache: bool,
    /// Always pull the base image
    pub pull: bool,
}

/// Image metadata relevant to verification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInfo {
    pub user: String,
    pub workdir: String,
    pub exposed_ports: Vec<u16>,
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    config: Option<InspectConfig>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct InspectConfig {
    user: Option<String>,
    working_dir: Option<String>,
    exposed_ports: Option<HashMap<String, serde_json::Value>>,
    env: Option<Vec<String>>,
    labels: Option<BTreeMap<String, String>>,
}

impl ImageInfo {
    /// Parse the JSON array printed by `podman image inspect` / `docker image inspect`
    pub fn from_inspect_json(image: &str, json: &str) -> BakeResult<Self> {
        let entries: Vec<InspectEntry> =
            serde_json::from_str(json).map_err(|e| BakeError::ImageInspect {
                image: image.to_string(),
                reason: e.to_string(),
            })?;

        let config = entries
            .into_iter()
            .next()
            .ok_or_else(|| BakeError::ImageNotFound(image.to_string()))?
            .config
            .unwrap_or_default();

        let mut exposed_ports: Vec<u16> = config
            .exposed_ports
            .unwrap_or_default()
            .keys()
            .filter_map(|spec| spec.split('/').next()?.parse().ok())
            .collect();
        exposed_ports.sort_unstable();

        Ok(Self {
            user: config.user.unwrap_or_default(),
            workdir: config.working_dir.unwrap_or_default(),
            exposed_ports,
            env: config.env.unwrap_or_default(),
            labels: config.labels.unwrap_or_default(),
        })
    }

    /// Whether `KEY=VALUE` is set in the image environment
    pub fn has_env(&self, key: &str, value: &str) -> bool {
        let wanted = format!("{}={}", key, value);
        self.env.iter().any(|e| *e == wanted)
    }
}

/// Abstract container engine interface
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check if the engine is installed and responding
    async fn is_available(&self) -> BakeResult<bool>;

    /// Check if an image exists locally
    async fn image_exists(&self, image: &str) -> BakeResult<bool>;

    /// Build an image, streaming each output line to `on_output`
    async fn build_image(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> BakeResult<()>;

    /// Add another tag to an existing image
    async fn tag_image(&self, image: &str, tag: &str) -> BakeResult<()>;

    /// Read image metadata
    async fn inspect_image(&self, image: &str) -> BakeResult<ImageInfo>;

    /// Run `argv` in a throwaway container as the image's default user.
    /// Returns whether it exited successfully.
    async fn probe(&self, image: &str, argv: &[String]) -> BakeResult<bool>;

    /// Remove an image (missing images are not an error)
    async fn image_remove(&self, image: &str) -> BakeResult<()>;

    /// List image references starting with a prefix
    async fn image_list_prefixed(&self, prefix: &str) -> BakeResult<Vec<String>>;

    /// Get the human-readable engine name for display
    fn engine_name(&self) -> &'static str;
}
