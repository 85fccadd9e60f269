//! Build history
//!
//! Writes JSON lines to `~/.local/state/pybake/history.log`. The layer keys
//! of the last successful build of each context let `pybake plan` report
//! which layers the next build can take from cache.

use crate::cache::LayerKey;
use crate::config::{schema::Config, ConfigManager};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Event name for completed builds
pub const BUILD_COMPLETED: &str = "build.completed";

/// A previously completed build
#[derive(Debug, Clone, Deserialize)]
pub struct BuildRecord {
    pub context: PathBuf,
    pub image: String,
    pub layers: Vec<LayerKey>,
    #[serde(skip)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct Entry {
    timestamp: DateTime<Utc>,
    event: String,
    data: serde_json::Value,
}

/// File-based history that appends JSON lines
pub struct BuildHistory {
    enabled: bool,
    path: PathBuf,
}

impl BuildHistory {
    /// Create a history log from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.history,
            path: ConfigManager::history_path(),
        }
    }

    /// Create a history log at an explicit path
    pub fn with_path(path: PathBuf, enabled: bool) -> Self {
        Self { enabled, path }
    }

    /// Record a completed build
    pub async fn record_build(&self, context: &Path, image: &str, layers: &[LayerKey]) {
        self.log(
            BUILD_COMPLETED,
            &serde_json::json!({
                "context": context,
                "image": image,
                "layers": layers,
            }),
        )
        .await;
    }

    /// Log an event as a JSON line
    ///
    /// Drops events on IO failure; history must never fail a build.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize history event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write build history: {}", e);
        }
    }

    /// Most recent completed build of `context`, if any
    pub async fn last_build(&self, context: &Path) -> Option<BuildRecord> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                debug!("No build history at {}: {}", self.path.display(), e);
                return None;
            }
        };

        content.lines().rev().find_map(|line| {
            let entry: Entry = serde_json::from_str(line).ok()?;
            if entry.event != BUILD_COMPLETED {
                return None;
            }
            let mut record: BuildRecord = serde_json::from_value(entry.data).ok()?;
            if record.context != context {
                return None;
            }
            record.timestamp = Some(entry.timestamp);
            Some(record)
        })
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::StepKind;
    use tempfile::TempDir;

    fn history(dir: &TempDir, enabled: bool) -> BuildHistory {
        BuildHistory::with_path(dir.path().join("history.log"), enabled)
    }

    fn layers(key: &str) -> Vec<LayerKey> {
        vec![
            LayerKey {
                step: StepKind::From,
                key: format!("{key}-0"),
            },
            LayerKey {
                step: StepKind::CopySource,
                key: format!("{key}-1"),
            },
        ]
    }

    #[tokio::test]
    async fn writes_json_line() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, true);

        history
            .log("build.failed", &serde_json::json!({"image": "pybake-abc"}))
            .await;

        let content = tokio::fs::read_to_string(&history.path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(content.trim()).unwrap();

        assert_eq!(parsed["event"], "build.failed");
        assert_eq!(parsed["data"]["image"], "pybake-abc");
        assert!(parsed["timestamp"].is_string());
    }

    #[tokio::test]
    async fn last_build_per_context() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, true);
        let shop = Path::new("/src/shop");
        let blog = Path::new("/src/blog");

        history.record_build(shop, "pybake-111", &layers("a")).await;
        history.record_build(blog, "pybake-222", &layers("b")).await;
        history.record_build(shop, "pybake-333", &layers("c")).await;

        let record = history.last_build(shop).await.unwrap();
        assert_eq!(record.image, "pybake-333");
        assert_eq!(record.layers, layers("c"));
        assert!(record.timestamp.is_some());

        let record = history.last_build(blog).await.unwrap();
        assert_eq!(record.image, "pybake-222");

        assert!(history.last_build(Path::new("/src/none")).await.is_none());
    }

    #[tokio::test]
    async fn skips_corrupt_lines() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, true);
        let shop = Path::new("/src/shop");

        history.record_build(shop, "pybake-111", &layers("a")).await;
        tokio::fs::write(
            &history.path,
            format!(
                "{}not json\n",
                tokio::fs::read_to_string(&history.path).await.unwrap()
            ),
        )
        .await
        .unwrap();

        assert_eq!(history.last_build(shop).await.unwrap().image, "pybake-111");
    }

    #[tokio::test]
    async fn skips_when_disabled() {
        let dir = TempDir::new().unwrap();
        let history = history(&dir, false);

        history.record_build(Path::new("/src"), "x", &[]).await;

        assert!(!history.path.exists());
    }
}
