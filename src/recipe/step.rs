//! Pipeline steps and their Dockerfile instructions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`BuildStep`], used for ordering checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    From,
    Env,
    Workdir,
    SystemPackages,
    CopyManifest,
    InstallDependencies,
    CopySource,
    CreateUser,
    CreateWritableDir,
    SwitchUser,
    Expose,
    Command,
}

impl StepKind {
    /// Whether the step only records image metadata (no filesystem change)
    pub fn is_metadata(&self) -> bool {
        matches!(self, Self::Env | Self::Workdir | Self::SwitchUser | Self::Expose | Self::Command)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::From => "from",
            Self::Env => "env",
            Self::Workdir => "workdir",
            Self::SystemPackages => "system-packages",
            Self::CopyManifest => "copy-manifest",
            Self::InstallDependencies => "install-dependencies",
            Self::CopySource => "copy-source",
            Self::CreateUser => "create-user",
            Self::CreateWritableDir => "create-writable-dir",
            Self::SwitchUser => "switch-user",
            Self::Expose => "expose",
            Self::Command => "command",
        };
        write!(f, "{}", name)
    }
}

/// One layer-producing (or metadata) step of the image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStep {
    From {
        image: String,
    },
    Env {
        vars: Vec<(String, String)>,
    },
    Workdir {
        path: String,
    },
    SystemPackages {
        packages: Vec<String>,
        clean_cache: bool,
    },
    CopyManifest {
        src: String,
        dest: String,
    },
    InstallDependencies {
        manifest: String,
    },
    CopySource {
        src: String,
        dest: String,
    },
    CreateUser {
        name: String,
        uid: Option<u32>,
        idempotent: bool,
    },
    CreateWritableDir {
        path: String,
        owner: String,
    },
    SwitchUser {
        name: String,
    },
    Expose {
        port: u16,
    },
    Command {
        argv: Vec<String>,
    },
}

impl BuildStep {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::From { .. } => StepKind::From,
            Self::Env { .. } => StepKind::Env,
            Self::Workdir { .. } => StepKind::Workdir,
            Self::SystemPackages { .. } => StepKind::SystemPackages,
            Self::CopyManifest { .. } => StepKind::CopyManifest,
            Self::InstallDependencies { .. } => StepKind::InstallDependencies,
            Self::CopySource { .. } => StepKind::CopySource,
            Self::CreateUser { .. } => StepKind::CreateUser,
            Self::CreateWritableDir { .. } => StepKind::CreateWritableDir,
            Self::SwitchUser { .. } => StepKind::SwitchUser,
            Self::Expose { .. } => StepKind::Expose,
            Self::Command { .. } => StepKind::Command,
        }
    }

    /// Render the Dockerfile instruction for this step
    pub fn instruction(&self) -> String {
        match self {
            Self::From { image } => format!("FROM {}", image),
            Self::Env { vars } => {
                let pairs: Vec<String> = vars
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, dockerfile_quote(v)))
                    .collect();
                format!("ENV {}", pairs.join(" \\\n    "))
            }
            Self::Workdir { path } => format!("WORKDIR {}", path),
            Self::SystemPackages {
                packages,
                clean_cache,
            } => {
                let mut run = format!(
                    "RUN apt-get update \\\n    && apt-get install -y --no-install-recommends {}",
                    packages.join(" ")
                );
                if *clean_cache {
                    run.push_str(" \\\n    && rm -rf /var/lib/apt/lists/*");
                }
                run
            }
            Self::CopyManifest { src, dest } | Self::CopySource { src, dest } => {
                format!("COPY {} {}", src, dest)
            }
            Self::InstallDependencies { manifest } => {
                format!("RUN pip install --no-cache-dir -r {}", manifest)
            }
            Self::CreateUser {
                name,
                uid,
                idempotent,
            } => {
                let uid_arg = uid.map(|u| format!(" --uid {}", u)).unwrap_or_default();
                let useradd = format!(
                    "useradd --create-home --user-group --shell /usr/sbin/nologin{} {}",
                    uid_arg, name
                );
                if *idempotent {
                    format!("RUN id -u {name} >/dev/null 2>&1 || {useradd}")
                } else {
                    format!("RUN {}", useradd)
                }
            }
            Self::CreateWritableDir { path, owner } => {
                format!("RUN mkdir -p {path} && chown -R {owner}:{owner} {path}")
            }
            Self::SwitchUser { name } => format!("USER {}", name),
            Self::Expose { port } => format!("EXPOSE {}", port),
            Self::Command { argv } => {
                // A JSON array of strings cannot fail to serialize
                let json = serde_json::to_string(argv).unwrap_or_else(|_| "[]".to_string());
                format!("CMD {}", json)
            }
        }
    }

    /// Short human-readable description for plan output
    pub fn label(&self) -> String {
        match self {
            Self::From { image } => format!("base runtime {}", image),
            Self::Env { vars } => {
                let keys: Vec<&str> = vars.iter().map(|(k, _)| k.as_str()).collect();
                format!("environment {}", keys.join(", "))
            }
            Self::Workdir { path } => format!("working directory {}", path),
            Self::SystemPackages { packages, .. } => {
                format!("system packages {}", packages.join(" "))
            }
            Self::CopyManifest { src, .. } => format!("copy manifest {}", src),
            Self::InstallDependencies { .. } => "install Python dependencies".to_string(),
            Self::CopySource { src, .. } => format!("copy source {}", src),
            Self::CreateUser { name, .. } => format!("create user {}", name),
            Self::CreateWritableDir { path, owner } => format!("writable {} for {}", path, owner),
            Self::SwitchUser { name } => format!("run as {}", name),
            Self::Expose { port } => format!("expose {}", port),
            Self::Command { argv } => format!("command {}", argv.join(" ")),
        }
    }
}

/// Quote a value for a Dockerfile ENV instruction.
/// Embedded double quotes and backslashes are escaped to prevent injection.
pub(crate) fn dockerfile_quote(value: &str) -> String {
    if value.is_empty()
        || value.contains('$')
        || value.contains(' ')
        || value.contains('"')
        || value.contains('\\')
    {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}
