//! Build recipe
//!
//! A recipe is the ordered list of steps that turns a pinned Python base
//! image plus a source tree into a least-privilege application image.
//! The two observed deployment variants are expressed as one
//! [`BuildConfig`] rather than separate recipes.

mod plan;
mod step;

pub use plan::Recipe;
pub(crate) use plan::is_privileged;
pub use step::{BuildStep, StepKind};

use crate::config::Config;
use crate::error::{BakeError, BakeResult};
use crate::manifest::DependencyManifest;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Variant switches of the build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVariant {
    pub include_db_client_headers: bool,
    pub create_static_dir: bool,
    pub exposed_port: Option<u16>,
}

/// Unprivileged runtime identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeUser {
    pub name: String,
    pub uid: Option<u32>,
    pub idempotent: bool,
}

/// Fully resolved build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub base_image: String,
    pub workdir: String,
    /// Manifest path relative to the build context
    pub manifest_path: String,
    /// Source path relative to the build context
    pub source_path: String,
    pub env: BTreeMap<String, String>,
    pub system_packages: Vec<String>,
    pub clean_package_cache: bool,
    pub variant: BuildVariant,
    /// Absolute static-assets path inside the image
    pub static_dir: String,
    pub user: RuntimeUser,
    pub command: Option<Vec<String>>,
}

impl BuildConfig {
    /// Resolve configuration against the project's dependency manifest.
    ///
    /// When `variant.include_db_client_headers` is unset, the headers are
    /// installed only if the manifest names a driver that compiles against
    /// them.
    pub fn resolve(config: &Config, manifest: &DependencyManifest) -> BakeResult<Self> {
        let image = &config.image;

        if !image.allow_unpinned && !is_pinned(&image.base) {
            return Err(BakeError::BaseImageUnpinned(image.base.clone()));
        }

        if !image.workdir.starts_with('/') {
            return Err(BakeError::ConfigInvalid {
                path: "image.workdir".into(),
                reason: format!("'{}' must be an absolute path", image.workdir),
            });
        }
        check_image_path("image.workdir", &image.workdir)?;
        let workdir = trim_trailing_slash(&image.workdir);

        validate_user_name(&config.user.name)?;

        let include_db_client_headers = match config.variant.include_db_client_headers {
            Some(explicit) => explicit,
            None => {
                let inferred = manifest.requires_relational_storage();
                info!(
                    "Database client headers {} (inferred from {})",
                    if inferred { "enabled" } else { "disabled" },
                    manifest.path.display()
                );
                inferred
            }
        };

        let mut system_packages: Vec<String> = Vec::new();
        let db_packages: &[String] = if include_db_client_headers {
            config.system.db_client_packages.as_slice()
        } else {
            &[]
        };
        for pkg in config.system.packages.iter().chain(db_packages) {
            if !system_packages.contains(pkg) {
                system_packages.push(pkg.clone());
            }
        }

        let mut env = BTreeMap::new();
        if image.dont_write_bytecode {
            env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());
        }
        if image.unbuffered {
            env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
        }
        env.extend(image.env.clone());

        let static_dir = resolve_static_dir(&workdir, &config.variant.static_dir)?;

        let resolved = Self {
            base_image: image.base.clone(),
            workdir,
            manifest_path: image.manifest.clone(),
            source_path: image.source.clone(),
            env,
            system_packages,
            clean_package_cache: config.system.clean_cache,
            variant: BuildVariant {
                include_db_client_headers,
                create_static_dir: config.variant.create_static_dir,
                exposed_port: config.variant.exposed_port,
            },
            static_dir,
            user: RuntimeUser {
                name: config.user.name.clone(),
                uid: config.user.uid,
                idempotent: config.user.idempotent,
            },
            command: image.command.clone().filter(|argv| !argv.is_empty()),
        };

        debug!("Resolved build config: {:?}", resolved);
        Ok(resolved)
    }
}

/// Whether an image reference names a specific interpreter version.
///
/// Digest references are pinned. Tags must exist, not be `latest`, and
/// carry a version number.
pub fn is_pinned(image: &str) -> bool {
    if image.contains("@sha256:") {
        return true;
    }
    let last_segment = image.rsplit('/').next().unwrap_or(image);
    match last_segment.split_once(':') {
        Some((_, tag)) => tag != "latest" && tag.chars().any(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Join a path relative to the working directory; absolute paths pass through.
pub fn join_image_path(workdir: &str, path: &str) -> String {
    if path.starts_with('/') {
        return trim_trailing_slash(path);
    }
    let rel = path.trim_start_matches("./");
    if rel.is_empty() || rel == "." {
        return workdir.to_string();
    }
    format!("{}/{}", workdir.trim_end_matches('/'), trim_trailing_slash(rel))
}

/// The static directory is chowned to the runtime user. Reject paths that
/// would cover the application tree or the root filesystem.
fn resolve_static_dir(workdir: &str, configured: &str) -> BakeResult<String> {
    check_image_path("variant.static_dir", configured)?;
    let resolved = join_image_path(workdir, configured);

    let reason = if resolved == "/" {
        Some("the filesystem root")
    } else if resolved == workdir {
        Some("the working directory")
    } else if workdir.starts_with(&format!("{}/", resolved)) {
        Some("a parent of the working directory")
    } else {
        None
    };

    match reason {
        Some(what) => Err(BakeError::ConfigInvalid {
            path: "variant.static_dir".into(),
            reason: format!(
                "'{}' resolves to {} ({}); the runtime user may only own a dedicated subdirectory",
                configured, what, resolved
            ),
        }),
        None => Ok(resolved),
    }
}

/// Paths interpolated into Dockerfile and shell text: `[A-Za-z0-9._/-]`, no `..`
fn check_image_path(key: &str, path: &str) -> BakeResult<()> {
    if let Some(bad) = path
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-')))
    {
        return Err(BakeError::ConfigInvalid {
            path: key.into(),
            reason: format!("'{}' contains unsupported character '{}'", path, bad),
        });
    }
    if path.split('/').any(|part| part == "..") {
        return Err(BakeError::ConfigInvalid {
            path: key.into(),
            reason: format!("'{}' must not contain '..'", path),
        });
    }
    Ok(())
}

fn trim_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Accept POSIX-portable login names; reject the administrative account.
fn validate_user_name(name: &str) -> BakeResult<()> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

    if !valid {
        return Err(BakeError::ConfigInvalid {
            path: "user.name".into(),
            reason: format!("'{}' is not a valid account name", name),
        });
    }
    if name == "root" {
        return Err(BakeError::ConfigInvalid {
            path: "user.name".into(),
            reason: "the runtime user must not be root".to_string(),
        });
    }
    Ok(())
}
