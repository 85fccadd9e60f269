//! Post-build verification
//!
//! Checks a built image against the configuration it was built from:
//! metadata via `image inspect`, runtime behavior via throwaway containers
//! started as the image's default user. Every `==` pin in the manifest is
//! checked against the installed distribution.

use crate::engine::ContainerEngine;
use crate::error::BakeResult;
use crate::manifest::DependencyManifest;
use crate::recipe::{is_privileged, BuildConfig};
use tracing::debug;

/// Outcome of one check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl VerifyCheck {
    fn new(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed,
            detail: detail.into(),
        }
    }
}

/// All checks run against one image
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub image: String,
    pub checks: Vec<VerifyCheck>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }
}

/// Verify that `image` runs unprivileged and matches `build` and `manifest`.
pub async fn verify_image(
    engine: &dyn ContainerEngine,
    image: &str,
    build: &BuildConfig,
    manifest: &DependencyManifest,
) -> BakeResult<VerifyReport> {
    let info = engine.inspect_image(image).await?;
    let mut checks = Vec::new();

    let user = info.user.as_str();
    checks.push(VerifyCheck::new(
        "unprivileged user",
        !is_privileged(user),
        if user.is_empty() {
            "no USER set, defaults to root".to_string()
        } else {
            format!("USER {}", user)
        },
    ));

    let configured = user.split(':').next().unwrap_or(user);
    checks.push(VerifyCheck::new(
        "runtime user",
        configured == build.user.name,
        format!("expected {}, found {}", build.user.name, display_or_none(configured)),
    ));

    checks.push(VerifyCheck::new(
        "working directory",
        info.workdir == build.workdir,
        format!("expected {}, found {}", build.workdir, display_or_none(&info.workdir)),
    ));

    for (key, value) in &build.env {
        checks.push(VerifyCheck::new(
            &format!("env {}", key),
            info.has_env(key, value),
            format!("{}={}", key, value),
        ));
    }

    if let Some(port) = build.variant.exposed_port {
        checks.push(VerifyCheck::new(
            "exposed port",
            info.exposed_ports.contains(&port),
            format!("{}/tcp", port),
        ));
    }

    let uid_ok = engine
        .probe(image, &shell(r#"test "$(id -u)" != 0"#))
        .await?;
    checks.push(VerifyCheck::new(
        "process uid",
        uid_ok,
        if uid_ok {
            "non-zero uid"
        } else {
            "process runs as uid 0"
        },
    ));

    if build.variant.create_static_dir {
        let dir = &build.static_dir;
        let script = format!("test -d '{dir}' && test -w '{dir}'");
        let writable = engine.probe(image, &shell(&script)).await?;
        checks.push(VerifyCheck::new(
            "static directory writable",
            writable,
            dir.clone(),
        ));
    }

    // Marker-guarded pins may legitimately be absent on the image's platform
    for requirement in manifest
        .requirements
        .iter()
        .filter(|r| r.marker.is_none() && r.url.is_none())
    {
        let Some(version) = requirement.pinned_version() else {
            continue;
        };
        let installed = engine
            .probe(image, &installed_version_check(&requirement.name, version))
            .await?;
        checks.push(VerifyCheck::new(
            &format!("installed {}", requirement.name),
            installed,
            if installed {
                format!("{}=={}", requirement.name, version)
            } else {
                format!("{}=={} not installed", requirement.name, version)
            },
        ));
    }

    debug!(
        "Verified {}: {} of {} checks passed",
        image,
        checks.iter().filter(|c| c.passed).count(),
        checks.len()
    );

    Ok(VerifyReport {
        image: image.to_string(),
        checks,
    })
}

/// Requirement names and versions are validated to `[A-Za-z0-9._+!*-]`, so
/// single quotes are safe here.
fn installed_version_check(name: &str, version: &str) -> Vec<String> {
    vec![
        "python".to_string(),
        "-c".to_string(),
        format!(
            "import importlib.metadata as m; assert m.version('{}') == '{}'",
            name, version
        ),
    ]
}

fn shell(script: &str) -> Vec<String> {
    vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()]
}

fn display_or_none(value: &str) -> &str {
    if value.is_empty() {
        "(none)"
    } else {
        value
    }
}
