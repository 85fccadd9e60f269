//! Image builds
//!
//! Content-addressed: the image tag is derived from the final layer key, so
//! an existing tag means an identical image already exists and the engine
//! is not invoked at all.

use crate::cache::LayerStatus;
use crate::context::BuildContext;
use crate::engine::{BuildRequest, ContainerEngine};
use crate::error::BakeResult;
use crate::history::BuildHistory;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Label carrying the final layer key
pub const LABEL_RECIPE: &str = "io.pybake.recipe";
/// Label carrying the dependency manifest digest
pub const LABEL_MANIFEST: &str = "io.pybake.manifest";

/// Caller-controlled build switches
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Extra tags applied on top of the content-addressed one
    pub tags: Vec<String>,
    /// Ignore both pybake's and the engine's cache
    pub no_cache: bool,
    /// Always pull the base image
    pub pull: bool,
}

/// Result of a build
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// Content-addressed image tag
    pub image_tag: String,
    /// True when the image already existed and nothing was built
    pub was_cached: bool,
    /// Per-step reuse compared with the previous build of this context
    pub statuses: Vec<LayerStatus>,
}

/// Build the context's image unless an identical one already exists.
pub async fn build_image(
    engine: &dyn ContainerEngine,
    ctx: &BuildContext,
    options: &BuildOptions,
    history: &BuildHistory,
    builds_dir: &Path,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> BakeResult<BuildOutcome> {
    let image_tag = ctx.image_tag();

    let previous = history.last_build(&ctx.root).await;
    let statuses = if options.no_cache {
        vec![LayerStatus::Rebuilt; ctx.layers.layers().len()]
    } else {
        ctx.layers
            .compare(previous.as_ref().map(|r| r.layers.as_slice()).unwrap_or(&[]))
    };

    if !options.no_cache && engine.image_exists(&image_tag).await? {
        info!("Using cached image {}", image_tag);
        for tag in &options.tags {
            engine.tag_image(&image_tag, tag).await?;
        }
        let statuses = vec![LayerStatus::Reused; ctx.layers.layers().len()];
        return Ok(BuildOutcome {
            image_tag,
            was_cached: true,
            statuses,
        });
    }

    let dockerfile = ctx.prepare_build_dir(builds_dir).await?;

    let mut tags = vec![image_tag.clone()];
    tags.extend(options.tags.iter().cloned());

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_RECIPE.to_string(), ctx.layers.final_key().to_string());
    labels.insert(LABEL_MANIFEST.to_string(), ctx.manifest.digest.clone());

    let request = BuildRequest {
        dockerfile: dockerfile.clone(),
        context_dir: ctx.root.clone(),
        tags,
        labels,
        no_cache: options.no_cache,
        pull: options.pull,
    };

    let result = engine.build_image(&request, on_output).await;
    cleanup_build_dir(&dockerfile).await;
    result?;

    info!("Built image {}", image_tag);
    history
        .record_build(&ctx.root, &image_tag, ctx.layers.layers())
        .await;

    Ok(BuildOutcome {
        image_tag,
        was_cached: false,
        statuses,
    })
}

async fn cleanup_build_dir(dockerfile: &Path) {
    let Some(dir) = dockerfile.parent() else {
        return;
    };
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed build directory {}", dir.display()),
        Err(e) => warn!("Failed to remove build directory {}: {}", dir.display(), e),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::ImageInfo;
    use crate::error::BakeError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory engine recording every call
    #[derive(Default)]
    pub(crate) struct MockEngine {
        pub images: Mutex<Vec<String>>,
        pub builds: Mutex<Vec<BuildRequest>>,
        pub fail_build: bool,
        pub info: ImageInfo,
        pub probe_results: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl ContainerEngine for MockEngine {
        async fn is_available(&self) -> BakeResult<bool> {
            Ok(true)
        }

        async fn image_exists(&self, image: &str) -> BakeResult<bool> {
            Ok(self.images.lock().unwrap().iter().any(|i| i == image))
        }

        async fn build_image(
            &self,
            request: &BuildRequest,
            on_output: &(dyn Fn(String) + Send + Sync),
        ) -> BakeResult<()> {
            assert!(request.dockerfile.exists());
            on_output("STEP 1/10: FROM python:3.12-slim".to_string());
            self.builds.lock().unwrap().push(request.clone());
            if self.fail_build {
                return Err(BakeError::ImageBuild {
                    tag: request.tags[0].clone(),
                    reason: "pip install failed".to_string(),
                });
            }
            self.images
                .lock()
                .unwrap()
                .extend(request.tags.iter().cloned());
            Ok(())
        }

        async fn tag_image(&self, _image: &str, tag: &str) -> BakeResult<()> {
            self.images.lock().unwrap().push(tag.to_string());
            Ok(())
        }

        async fn inspect_image(&self, image: &str) -> BakeResult<ImageInfo> {
            if self.image_exists(image).await? {
                Ok(self.info.clone())
            } else {
                Err(BakeError::ImageNotFound(image.to_string()))
            }
        }

        async fn probe(&self, _image: &str, argv: &[String]) -> BakeResult<bool> {
            let joined = argv.join(" ");
            Ok(self
                .probe_results
                .lock()
                .unwrap()
                .iter()
                .find(|(needle, _)| joined.contains(needle.as_str()))
                .map(|(_, ok)| *ok)
                .unwrap_or(true))
        }

        async fn image_remove(&self, image: &str) -> BakeResult<()> {
            self.images.lock().unwrap().retain(|i| i != image);
            Ok(())
        }

        async fn image_list_prefixed(&self, prefix: &str) -> BakeResult<Vec<String>> {
            Ok(self
                .images
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn engine_name(&self) -> &'static str {
            "Mock"
        }
    }

    struct Fixture {
        project: TempDir,
        state: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let project = TempDir::new().unwrap();
            std::fs::write(project.path().join("requirements.txt"), "flask==3.0.0\n").unwrap();
            std::fs::write(project.path().join("app.py"), "app = 1\n").unwrap();
            Self {
                project,
                state: TempDir::new().unwrap(),
            }
        }

        async fn context(&self) -> BuildContext {
            BuildContext::open(self.project.path(), &Config::default())
                .await
                .unwrap()
        }

        fn history(&self) -> BuildHistory {
            BuildHistory::with_path(self.state.path().join("history.log"), true)
        }

        fn builds_dir(&self) -> std::path::PathBuf {
            self.state.path().join("builds")
        }
    }

    #[tokio::test]
    async fn builds_and_records() {
        let fx = Fixture::new();
        let ctx = fx.context().await;
        let engine = MockEngine::default();
        let options = BuildOptions {
            tags: vec!["shop:dev".to_string()],
            ..Default::default()
        };

        let outcome = build_image(&engine, &ctx, &options, &fx.history(), &fx.builds_dir(), &|_| {})
            .await
            .unwrap();

        assert!(!outcome.was_cached);
        assert_eq!(outcome.image_tag, ctx.image_tag());
        assert!(outcome.statuses.iter().all(|s| *s == LayerStatus::Rebuilt));

        let builds = engine.builds.lock().unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].tags, vec![ctx.image_tag(), "shop:dev".to_string()]);
        assert_eq!(builds[0].context_dir, ctx.root);
        assert_eq!(
            builds[0].labels.get(LABEL_MANIFEST).unwrap(),
            &ctx.manifest.digest
        );
        assert!(!builds[0].dockerfile.exists());

        let record = fx.history().last_build(&ctx.root).await.unwrap();
        assert_eq!(record.image, ctx.image_tag());
    }

    #[tokio::test]
    async fn existing_image_skips_build() {
        let fx = Fixture::new();
        let ctx = fx.context().await;
        let engine = MockEngine::default();
        engine.images.lock().unwrap().push(ctx.image_tag());
        let options = BuildOptions {
            tags: vec!["shop:latest".to_string()],
            ..Default::default()
        };

        let outcome = build_image(&engine, &ctx, &options, &fx.history(), &fx.builds_dir(), &|_| {})
            .await
            .unwrap();

        assert!(outcome.was_cached);
        assert!(engine.builds.lock().unwrap().is_empty());
        assert!(engine
            .images
            .lock()
            .unwrap()
            .contains(&"shop:latest".to_string()));
    }

    #[tokio::test]
    async fn no_cache_forces_build() {
        let fx = Fixture::new();
        let ctx = fx.context().await;
        let engine = MockEngine::default();
        engine.images.lock().unwrap().push(ctx.image_tag());
        let options = BuildOptions {
            no_cache: true,
            ..Default::default()
        };

        let outcome = build_image(&engine, &ctx, &options, &fx.history(), &fx.builds_dir(), &|_| {})
            .await
            .unwrap();

        assert!(!outcome.was_cached);
        assert!(engine.builds.lock().unwrap()[0].no_cache);
    }

    #[tokio::test]
    async fn source_change_reports_reused_layers() {
        let fx = Fixture::new();
        let engine = MockEngine::default();
        let history = fx.history();

        let first = fx.context().await;
        build_image(&engine, &first, &BuildOptions::default(), &history, &fx.builds_dir(), &|_| {})
            .await
            .unwrap();

        std::fs::write(fx.project.path().join("app.py"), "app = 2\n").unwrap();
        let second = fx.context().await;
        let outcome =
            build_image(&engine, &second, &BuildOptions::default(), &history, &fx.builds_dir(), &|_| {})
                .await
                .unwrap();

        let install = second
            .recipe
            .position(crate::recipe::StepKind::InstallDependencies)
            .unwrap();
        assert_eq!(outcome.statuses[install], LayerStatus::Reused);
        assert_eq!(*outcome.statuses.last().unwrap(), LayerStatus::Rebuilt);
    }

    #[tokio::test]
    async fn failed_build_is_not_recorded() {
        let fx = Fixture::new();
        let ctx = fx.context().await;
        let engine = MockEngine {
            fail_build: true,
            ..Default::default()
        };

        let err = build_image(&engine, &ctx, &BuildOptions::default(), &fx.history(), &fx.builds_dir(), &|_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, BakeError::ImageBuild { .. }));
        assert!(fx.history().last_build(&ctx.root).await.is_none());
        assert!(!engine.builds.lock().unwrap()[0].dockerfile.exists());
    }
}
