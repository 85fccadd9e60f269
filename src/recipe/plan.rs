//! Recipe planning, validation and Dockerfile rendering

use super::step::{BuildStep, StepKind};
use super::{join_image_path, BuildConfig};
use crate::error::{BakeError, BakeResult};

/// Ordered, validated build steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    steps: Vec<BuildStep>,
}

impl Recipe {
    /// Plan the build steps for a resolved configuration.
    ///
    /// The manifest is copied and installed before the full source tree so
    /// source-only changes reuse the dependency layer. The runtime user and
    /// its writable directories are set up before the identity switch.
    pub fn plan(build: &BuildConfig) -> BakeResult<Self> {
        let mut steps = vec![BuildStep::From {
            image: build.base_image.clone(),
        }];

        if !build.env.is_empty() {
            steps.push(BuildStep::Env {
                vars: build
                    .env
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            });
        }

        steps.push(BuildStep::Workdir {
            path: build.workdir.clone(),
        });

        if !build.system_packages.is_empty() {
            steps.push(BuildStep::SystemPackages {
                packages: build.system_packages.clone(),
                clean_cache: build.clean_package_cache,
            });
        }

        let manifest_dest = join_image_path(&build.workdir, &build.manifest_path);
        steps.push(BuildStep::CopyManifest {
            src: build.manifest_path.clone(),
            dest: manifest_dest.clone(),
        });
        steps.push(BuildStep::InstallDependencies {
            manifest: manifest_dest,
        });

        steps.push(BuildStep::CopySource {
            src: build.source_path.clone(),
            dest: build.workdir.clone(),
        });

        steps.push(BuildStep::CreateUser {
            name: build.user.name.clone(),
            uid: build.user.uid,
            idempotent: build.user.idempotent,
        });

        if build.variant.create_static_dir {
            steps.push(BuildStep::CreateWritableDir {
                path: build.static_dir.clone(),
                owner: build.user.name.clone(),
            });
        }

        steps.push(BuildStep::SwitchUser {
            name: build.user.name.clone(),
        });

        if let Some(port) = build.variant.exposed_port {
            steps.push(BuildStep::Expose { port });
        }

        if let Some(ref argv) = build.command {
            steps.push(BuildStep::Command { argv: argv.clone() });
        }

        Self::from_steps(steps)
    }

    /// Wrap an explicit step list after checking ordering invariants
    pub fn from_steps(steps: Vec<BuildStep>) -> BakeResult<Self> {
        let recipe = Self { steps };
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    /// Index of the first step of the given kind
    pub fn position(&self, kind: StepKind) -> Option<usize> {
        self.steps.iter().position(|s| s.kind() == kind)
    }

    /// The identity the final process runs as
    pub fn runtime_user(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|s| match s {
            BuildStep::SwitchUser { name } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Declared listening port, if any
    pub fn exposed_port(&self) -> Option<u16> {
        self.steps.iter().find_map(|s| match s {
            BuildStep::Expose { port } => Some(*port),
            _ => None,
        })
    }

    /// Check the ordering and privilege invariants
    pub fn validate(&self) -> BakeResult<()> {
        match self.steps.first() {
            Some(BuildStep::From { .. }) => {}
            _ => return Err(invalid("the first step must select the base image")),
        }
        if self.count(StepKind::From) != 1 {
            return Err(invalid("exactly one base image step is allowed"));
        }

        let copy_manifest = self.require(StepKind::CopyManifest)?;
        let install = self.require(StepKind::InstallDependencies)?;
        let copy_source = self.require(StepKind::CopySource)?;
        if !(copy_manifest < install && install < copy_source) {
            return Err(invalid(
                "the dependency manifest must be copied and installed before the source tree",
            ));
        }

        if self.count(StepKind::SwitchUser) != 1 {
            return Err(invalid("exactly one runtime user switch is required"));
        }
        let switch = self.require(StepKind::SwitchUser)?;
        let runtime_user = self.runtime_user().unwrap_or_default();
        if is_privileged(runtime_user) {
            return Err(invalid(&format!(
                "the runtime user '{}' is the administrative account",
                runtime_user
            )));
        }

        let create_user = self.require(StepKind::CreateUser)?;
        if create_user > switch {
            return Err(invalid("the runtime user must be created before switching to it"));
        }
        for step in &self.steps {
            if let BuildStep::CreateUser { name, .. } = step {
                if name != runtime_user {
                    return Err(invalid(&format!(
                        "created user '{}' differs from runtime user '{}'",
                        name, runtime_user
                    )));
                }
            }
        }

        let workdir = self.steps.iter().rev().find_map(|s| match s {
            BuildStep::Workdir { path } => Some(path.trim_end_matches('/')),
            _ => None,
        });
        for (idx, step) in self.steps.iter().enumerate() {
            if let BuildStep::CreateWritableDir { path, owner } = step {
                let target = path.trim_end_matches('/');
                if target.is_empty() || Some(target) == workdir {
                    return Err(invalid(&format!(
                        "{} must not be made writable by the runtime user",
                        path
                    )));
                }
                if idx < create_user || idx > switch {
                    return Err(invalid(&format!(
                        "{} must be granted after user creation and before the user switch",
                        path
                    )));
                }
                if owner != runtime_user {
                    return Err(invalid(&format!(
                        "{} is owned by '{}' instead of the runtime user",
                        path, owner
                    )));
                }
            }
        }

        if let Some(late) = self.steps[switch + 1..]
            .iter()
            .find(|s| !matches!(s.kind(), StepKind::Expose | StepKind::Command))
        {
            return Err(invalid(&format!(
                "step '{}' runs after the identity switch",
                late.kind()
            )));
        }

        if self.count(StepKind::Expose) > 1 {
            return Err(invalid("at most one port may be declared"));
        }

        Ok(())
    }

    /// Render the recipe as a Dockerfile
    pub fn render(&self) -> String {
        let mut out = String::from("# Generated by pybake. Edit pybake.toml instead.\n");
        for step in &self.steps {
            out.push('\n');
            out.push_str(&step.instruction());
            out.push('\n');
        }
        out
    }

    fn count(&self, kind: StepKind) -> usize {
        self.steps.iter().filter(|s| s.kind() == kind).count()
    }

    fn require(&self, kind: StepKind) -> BakeResult<usize> {
        self.position(kind)
            .ok_or_else(|| invalid(&format!("missing required step '{}'", kind)))
    }
}

/// Whether a USER value runs as the administrative account
pub(crate) fn is_privileged(user: &str) -> bool {
    let name = user.split(':').next().unwrap_or(user);
    name.is_empty() || name == "root" || name == "0"
}

fn invalid(reason: &str) -> BakeError {
    BakeError::RecipeInvalid(reason.to_string())
}
