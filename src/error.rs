//! Error types for pybake
//!
//! All modules use `BakeResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pybake operations
pub type BakeResult<T> = Result<T, BakeError>;

/// All errors that can occur while planning, building or verifying an image
#[derive(Error, Debug)]
pub enum BakeError {
    // Environment errors
    #[error("No container engine found. Install podman or docker")]
    EngineNotFound,

    #[error("Container engine '{0}' is not available")]
    EngineUnavailable(String),

    #[error("Unknown container engine: {0}. Use auto, podman or docker")]
    EngineUnknown(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Build context errors
    #[error("Build context not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Dependency manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid dependency manifest {path} line {line}: {reason}")]
    ManifestParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Source path not found in build context: {0}")]
    SourceNotFound(PathBuf),

    #[error("Base image '{0}' is not pinned to an interpreter version")]
    BaseImageUnpinned(String),

    // Recipe errors
    #[error("Invalid build recipe: {0}")]
    RecipeInvalid(String),

    // Engine errors
    #[error("Image build failed: {tag}\n{reason}")]
    ImageBuild { tag: String, reason: String },

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Failed to inspect image {image}: {reason}")]
    ImageInspect { image: String, reason: String },

    #[error("Image {image} failed verification: {failed} check(s) did not pass")]
    VerificationFailed { image: String, failed: usize },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML edit error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl BakeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound => Some("Install podman (https://podman.io) or docker"),
            Self::ManifestNotFound(_) => {
                Some("Create requirements.txt or set image.manifest in pybake.toml")
            }
            Self::SourceNotFound(_) => Some("Check image.source in pybake.toml"),
            Self::BaseImageUnpinned(_) => {
                Some("Use a versioned tag such as python:3.12-slim, or set image.allow_unpinned")
            }
            Self::ImageBuild { .. } => Some("Fix the failing step and run pybake build again"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = BakeError::ManifestNotFound(PathBuf::from("/app/requirements.txt"));
        assert!(err.to_string().contains("requirements.txt"));
    }

    #[test]
    fn error_hint() {
        let err = BakeError::BaseImageUnpinned("python".to_string());
        assert!(err.hint().unwrap().contains("python:3.12-slim"));
        assert!(BakeError::Internal("x".to_string()).hint().is_none());
    }

    #[test]
    fn manifest_parse_display_has_line() {
        let err = BakeError::ManifestParse {
            path: PathBuf::from("requirements.txt"),
            line: 3,
            reason: "empty version".to_string(),
        };
        assert!(err.to_string().contains("line 3"));
    }
}
