//! Init command - create a project-local pybake.toml

use crate::cli::args::InitArgs;
use crate::config::LOCAL_CONFIG_NAME;
use crate::error::{BakeError, BakeResult};
use crate::ui::{self, UiContext};
use tokio::fs;

/// Template for project-local config
const INIT_TEMPLATE: &str = r#"# pybake project configuration
# Settings here override your global config (~/.config/pybake/config.toml)

[image]
base = "python:3.12-slim"            # must carry an interpreter version
# workdir = "/app"
# manifest = "requirements.txt"
# source = "."
# command = ["gunicorn", "config.wsgi:application", "--bind", "0.0.0.0:8000"]

# [image.env]
# DJANGO_SETTINGS_MODULE = "config.settings"

[system]
# packages = ["build-essential"]
# db_client_packages = ["libpq-dev"]

[variant]
# include_db_client_headers = true   # unset: inferred from the manifest
# create_static_dir = true
# static_dir = "staticfiles"
# exposed_port = 8000

[user]
# name = "appuser"
# uid = 10001
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> BakeResult<()> {
    let ctx = UiContext::detect();

    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => {
            std::env::current_dir().map_err(|e| BakeError::io("getting current directory", e))?
        }
    };

    let config_path = target_dir.join(LOCAL_CONFIG_NAME);

    if config_path.exists() && !args.force {
        return Err(BakeError::User(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        )));
    }

    fs::create_dir_all(&target_dir).await.map_err(|e| {
        BakeError::io(format!("creating directory {}", target_dir.display()), e)
    })?;

    fs::write(&config_path, INIT_TEMPLATE)
        .await
        .map_err(|e| BakeError::io(format!("writing {}", config_path.display()), e))?;

    ui::step_ok_detail(
        &ctx,
        "Created project config",
        &config_path.display().to_string(),
    );

    if !target_dir.join("requirements.txt").exists() {
        ui::remark(&ctx, "No requirements.txt found; set image.manifest if it lives elsewhere");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_creates_config() {
        let temp = TempDir::new().unwrap();
        let args = InitArgs {
            force: false,
            path: Some(temp.path().to_path_buf()),
        };
        execute(args).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join(LOCAL_CONFIG_NAME)).unwrap();
        assert!(content.contains("[image]"));
        assert!(content.contains("[variant]"));
    }

    #[tokio::test]
    async fn init_refuses_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_NAME), "existing").unwrap();

        let args = InitArgs {
            force: false,
            path: Some(temp.path().to_path_buf()),
        };
        let err = execute(args).await.unwrap_err().to_string();
        assert!(err.contains("already exists"));
    }

    #[tokio::test]
    async fn init_overwrites_with_force() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_NAME), "old content").unwrap();

        let args = InitArgs {
            force: true,
            path: Some(temp.path().to_path_buf()),
        };
        execute(args).await.unwrap();

        let content = std::fs::read_to_string(temp.path().join(LOCAL_CONFIG_NAME)).unwrap();
        assert!(content.contains("[image]"));
    }

    #[test]
    fn template_parses_to_defaults() {
        let config: Config = toml::from_str(INIT_TEMPLATE).unwrap();
        assert_eq!(config.image.base, "python:3.12-slim");
        assert_eq!(config.user.name, "appuser");
        assert!(config.variant.include_db_client_headers.is_none());
    }
}
