//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_NAME};
use crate::error::{BakeError, BakeResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;
use toml_edit::{Array, DocumentMut, Item, Value};

/// How a settable key's value is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Str,
    Bool,
    Int,
    List,
}

/// Settable keys. `image.env.<NAME>` is accepted in addition.
const KEYS: &[(&str, ValueKind)] = &[
    ("general.history", ValueKind::Bool),
    ("engine.program", ValueKind::Str),
    ("image.base", ValueKind::Str),
    ("image.workdir", ValueKind::Str),
    ("image.manifest", ValueKind::Str),
    ("image.source", ValueKind::Str),
    ("image.dont_write_bytecode", ValueKind::Bool),
    ("image.unbuffered", ValueKind::Bool),
    ("image.command", ValueKind::List),
    ("image.allow_unpinned", ValueKind::Bool),
    ("system.packages", ValueKind::List),
    ("system.db_client_packages", ValueKind::List),
    ("system.clean_cache", ValueKind::Bool),
    ("variant.include_db_client_headers", ValueKind::Bool),
    ("variant.create_static_dir", ValueKind::Bool),
    ("variant.static_dir", ValueKind::Str),
    ("variant.exposed_port", ValueKind::Int),
    ("user.name", ValueKind::Str),
    ("user.uid", ValueKind::Int),
    ("user.idempotent", ValueKind::Bool),
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
    local: Option<&Path>,
) -> BakeResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager, local),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let path = if local {
                std::env::current_dir()
                    .map_err(|e| BakeError::io("getting current directory", e))?
                    .join(LOCAL_CONFIG_NAME)
            } else {
                manager.path().to_path_buf()
            };
            set_value(&path, &key, &value).await?
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> BakeResult<()> {
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager, local: Option<&Path>) {
    println!("{}", manager.path().display());
    if let Some(local) = local {
        println!("{}", local.display());
    }
}

async fn init_config(manager: &ConfigManager, force: bool) -> BakeResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn(
            &ctx,
            &format!("Config already exists at {}. Use --force to overwrite", path.display()),
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Set one key in a TOML file, keeping its comments and layout
async fn set_value(path: &Path, key: &str, value: &str) -> BakeResult<()> {
    let ctx = UiContext::detect();
    let new_value = parse_setting(key, value)?;

    let content = if path.exists() {
        fs::read_to_string(path)
            .await
            .map_err(|e| BakeError::io(format!("reading {}", path.display()), e))?
    } else {
        String::new()
    };

    let updated = apply_setting(&content, key, new_value)?;

    // Reject edits that would leave the file unloadable
    toml::from_str::<Config>(&updated).map_err(|e| BakeError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| BakeError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    fs::write(path, updated)
        .await
        .map_err(|e| BakeError::io(format!("writing {}", path.display()), e))?;

    ui::step_ok(&ctx, &format!("Set {} = {} in {}", key, value, path.display()));
    Ok(())
}

/// Convert a command-line value to the TOML type its key expects
fn parse_setting(key: &str, value: &str) -> BakeResult<Value> {
    let kind = match KEYS.iter().find(|(k, _)| *k == key) {
        Some((_, kind)) => *kind,
        None if is_env_key(key) => ValueKind::Str,
        None => {
            let valid: Vec<&str> = KEYS.iter().map(|(k, _)| *k).collect();
            return Err(BakeError::User(format!(
                "Unknown config key: {}. Valid keys: {}, image.env.<NAME>",
                key,
                valid.join(", ")
            )));
        }
    };

    Ok(match kind {
        ValueKind::Str => Value::from(value),
        ValueKind::Bool => Value::from(parse_bool(value)?),
        ValueKind::Int => Value::from(
            value
                .parse::<i64>()
                .map_err(|_| BakeError::User(format!("Invalid number: {}", value)))?,
        ),
        ValueKind::List => {
            let mut items = Array::new();
            for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                items.push(item);
            }
            Value::Array(items)
        }
    })
}

fn is_env_key(key: &str) -> bool {
    key.strip_prefix("image.env.").is_some_and(|name| {
        !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

/// Set a dotted key in TOML text, creating tables as needed
fn apply_setting(content: &str, key: &str, value: Value) -> BakeResult<String> {
    let mut doc: DocumentMut = content.parse()?;
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, tables)) = parts.split_last() else {
        return Err(BakeError::User("Empty config key".to_string()));
    };

    let mut table = doc.as_table_mut();
    for part in tables {
        table = table
            .entry(part)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .ok_or_else(|| BakeError::User(format!("'{}' is not a table in the config file", part)))?;
    }
    table.insert(leaf, Item::Value(value));

    Ok(doc.to_string())
}

fn parse_bool(value: &str) -> BakeResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(BakeError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}
