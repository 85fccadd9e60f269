//! Build context
//!
//! Loads everything a build needs from one project directory: the
//! dependency manifest, the source digest, the resolved configuration, the
//! recipe and its layer keys.

use crate::cache::{LayerInputs, LayerPlan, SourceDigest};
use crate::config::Config;
use crate::error::{BakeError, BakeResult};
use crate::manifest::DependencyManifest;
use crate::recipe::{BuildConfig, Recipe};
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// File name of the generated Dockerfile inside a build directory
pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// A fully planned build of one project directory
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Canonical context root
    pub root: PathBuf,
    pub manifest: DependencyManifest,
    pub source: SourceDigest,
    pub build: BuildConfig,
    pub recipe: Recipe,
    pub layers: LayerPlan,
}

impl BuildContext {
    /// Load and plan the build of `root` under `config`
    pub async fn open(root: &Path, config: &Config) -> BakeResult<Self> {
        if !root.is_dir() {
            return Err(BakeError::ContextNotFound(root.to_path_buf()));
        }
        let root = tokio::fs::canonicalize(root)
            .await
            .map_err(|e| BakeError::io(format!("resolving {}", root.display()), e))?;

        check_context_path("image.manifest", &config.image.manifest)?;
        check_context_path("image.source", &config.image.source)?;

        let manifest = DependencyManifest::load(&root.join(&config.image.manifest)).await?;
        let build = BuildConfig::resolve(config, &manifest)?;
        let recipe = Recipe::plan(&build)?;

        let source = {
            let root = root.clone();
            let source_path = config.image.source.clone();
            tokio::task::spawn_blocking(move || SourceDigest::compute(&root, &source_path))
                .await
                .map_err(|e| BakeError::Internal(format!("source hashing task failed: {}", e)))??
        };

        let inputs = LayerInputs {
            manifest_digest: manifest.digest.clone(),
            source_digest: source.digest.clone(),
        };
        let layers = LayerPlan::compute(&recipe, &inputs);

        debug!(
            "Planned {} steps for {} (image {})",
            recipe.steps().len(),
            root.display(),
            layers.image_tag()
        );

        Ok(Self {
            root,
            manifest,
            source,
            build,
            recipe,
            layers,
        })
    }

    /// Digests that feed the layer keys
    pub fn layer_inputs(&self) -> LayerInputs {
        LayerInputs {
            manifest_digest: self.manifest.digest.clone(),
            source_digest: self.source.digest.clone(),
        }
    }

    /// Content-addressed tag of the image this context builds
    pub fn image_tag(&self) -> String {
        self.layers.image_tag()
    }

    /// Write the rendered Dockerfile into a fresh directory under `builds_dir`.
    ///
    /// The Dockerfile stays outside the context so it never affects the
    /// source digest. Returns the Dockerfile path.
    pub async fn prepare_build_dir(&self, builds_dir: &Path) -> BakeResult<PathBuf> {
        let dir = builds_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| BakeError::io(format!("creating build directory {}", dir.display()), e))?;

        let dockerfile = dir.join(DOCKERFILE_NAME);
        tokio::fs::write(&dockerfile, self.recipe.render())
            .await
            .map_err(|e| BakeError::io(format!("writing {}", dockerfile.display()), e))?;

        debug!("Wrote {}", dockerfile.display());
        Ok(dockerfile)
    }
}

/// Paths copied into the image must stay inside the context
fn check_context_path(key: &str, value: &str) -> BakeResult<()> {
    let path = Path::new(value);
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir));

    if escapes {
        return Err(BakeError::ConfigInvalid {
            path: key.into(),
            reason: format!("'{}' must be relative to the build context", value),
        });
    }
    Ok(())
}
