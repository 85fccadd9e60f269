//! Command-line container engine (Podman or Docker)
//!
//! Both CLIs share the `build`, `image inspect`, `run`, `tag`, `rmi` and
//! `images` surface, so one implementation drives either.

use crate::engine::runtime::{BuildRequest, ContainerEngine, ImageInfo};
use crate::error::{BakeError, BakeResult};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supported engine programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Podman,
    Docker,
}

impl EngineKind {
    /// Executable name
    pub fn program(&self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }
}

/// Container engine driven through its CLI
pub struct CliEngine {
    kind: EngineKind,
}

impl CliEngine {
    pub fn new(kind: EngineKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> BakeResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.kind.program(), args);

        Command::new(self.kind.program())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                BakeError::command_failed(format!("{} {:?}", self.kind.program(), args), e)
            })
    }

    /// Spawn an engine command with piped output for streaming
    fn spawn_piped(&self, args: &[String]) -> BakeResult<tokio::process::Child> {
        debug!("Spawning: {} {:?}", self.kind.program(), args);

        Command::new(self.kind.program())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BakeError::command_failed(format!("{} build", self.kind.program()), e))
    }

    /// Arguments for `build`, excluding the program name
    pub(crate) fn build_args(&self, request: &BuildRequest) -> Vec<String> {
        let mut args = vec![
            "build".to_string(),
            "-f".to_string(),
            request.dockerfile.display().to_string(),
        ];

        for tag in &request.tags {
            args.push("-t".to_string());
            args.push(tag.clone());
        }

        for (key, value) in &request.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }

        if request.no_cache {
            args.push("--no-cache".to_string());
        }
        if request.pull {
            args.push("--pull".to_string());
        }

        // BuildKit collapses output unless asked for plain progress
        if self.kind == EngineKind::Docker {
            args.push("--progress=plain".to_string());
        }

        args.push(request.context_dir.display().to_string());
        args
    }
}

#[async_trait]
impl ContainerEngine for CliEngine {
    async fn is_available(&self) -> BakeResult<bool> {
        let status = Command::new(self.kind.program())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        Ok(status.map(|s| s.success()).unwrap_or(false))
    }

    async fn image_exists(&self, image: &str) -> BakeResult<bool> {
        let output = self
            .exec(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;
        Ok(output.status.success())
    }

    async fn build_image(
        &self,
        request: &BuildRequest,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> BakeResult<()> {
        let tag = request.tags.first().cloned().unwrap_or_default();
        info!("Building image {}", tag);

        let args = self.build_args(request);
        let mut child = self.spawn_piped(&args)?;

        let all_output = super::stream_child_output(&mut child, on_output).await;

        let status = child.wait().await.map_err(|e| {
            BakeError::command_failed(format!("{} build", self.kind.program()), e)
        })?;

        if !status.success() {
            let combined = all_output.join("\n");
            return Err(BakeError::ImageBuild {
                tag,
                reason: super::build_error_output(&combined, ""),
            });
        }

        Ok(())
    }

    async fn tag_image(&self, image: &str, tag: &str) -> BakeResult<()> {
        let output = self.exec(&["tag", image, tag]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BakeError::command_exec(format!("{} tag", self.kind.program()), stderr))
        }
    }

    async fn inspect_image(&self, image: &str) -> BakeResult<ImageInfo> {
        let output = self.exec(&["image", "inspect", image]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lowered = stderr.to_lowercase();
            if lowered.contains("no such") || lowered.contains("not known") {
                return Err(BakeError::ImageNotFound(image.to_string()));
            }
            return Err(BakeError::ImageInspect {
                image: image.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        ImageInfo::from_inspect_json(image, &String::from_utf8_lossy(&output.stdout))
    }

    async fn probe(&self, image: &str, argv: &[String]) -> BakeResult<bool> {
        let (entrypoint, rest) = argv
            .split_first()
            .ok_or_else(|| BakeError::Internal("empty probe command".to_string()))?;

        let mut args = vec![
            "run",
            "--rm",
            "--network",
            "none",
            "--entrypoint",
            entrypoint.as_str(),
            image,
        ];
        args.extend(rest.iter().map(String::as_str));

        let output = self.exec(&args).await?;
        if !output.status.success() {
            debug!(
                "Probe {:?} failed: {}",
                argv,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }

    async fn image_remove(&self, image: &str) -> BakeResult<()> {
        debug!("Removing image: {}", image);

        let output = self.exec(&["rmi", image]).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("image not known") || stderr.contains("No such image") {
                Ok(())
            } else {
                Err(BakeError::command_exec(format!("{} rmi", self.kind.program()), stderr))
            }
        }
    }

    async fn image_list_prefixed(&self, prefix: &str) -> BakeResult<Vec<String>> {
        let filter = format!("reference={}*", prefix);
        let output = self
            .exec(&[
                "images",
                "--filter",
                &filter,
                "--format",
                "{{.Repository}}:{{.Tag}}",
            ])
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BakeError::command_exec(
                format!("{} images", self.kind.program()),
                stderr,
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    fn engine_name(&self) -> &'static str {
        match self.kind {
            EngineKind::Podman => "Podman",
            EngineKind::Docker => "Docker",
        }
    }
}
