//! Engine selection from configuration

use crate::config::schema::EngineConfig;
use crate::engine::cli::{CliEngine, EngineKind};
use crate::engine::runtime::ContainerEngine;
use crate::error::{BakeError, BakeResult};
use tracing::debug;

/// Map a configured engine name to a kind. `None` means auto-detect.
pub fn engine_kind_from_name(name: &str) -> BakeResult<Option<EngineKind>> {
    match name.trim().to_lowercase().as_str() {
        "" | "auto" => Ok(None),
        "podman" => Ok(Some(EngineKind::Podman)),
        "docker" => Ok(Some(EngineKind::Docker)),
        other => Err(BakeError::EngineUnknown(other.to_string())),
    }
}

/// Create the configured container engine, verifying it responds.
///
/// With `auto`, Podman is preferred and Docker is the fallback.
pub async fn create_engine(config: &EngineConfig) -> BakeResult<Box<dyn ContainerEngine>> {
    match engine_kind_from_name(&config.program)? {
        Some(kind) => {
            let engine = CliEngine::new(kind);
            if !engine.is_available().await? {
                return Err(BakeError::EngineUnavailable(kind.program().to_string()));
            }
            Ok(Box::new(engine))
        }
        None => {
            for kind in [EngineKind::Podman, EngineKind::Docker] {
                let engine = CliEngine::new(kind);
                if engine.is_available().await? {
                    debug!("Auto-selected engine: {}", kind.program());
                    return Ok(Box::new(engine));
                }
            }
            Err(BakeError::EngineNotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_names_resolve() {
        assert_eq!(engine_kind_from_name("auto").unwrap(), None);
        assert_eq!(engine_kind_from_name("").unwrap(), None);
        assert_eq!(engine_kind_from_name("Podman").unwrap(), Some(EngineKind::Podman));
        assert_eq!(engine_kind_from_name("docker").unwrap(), Some(EngineKind::Docker));
    }

    #[test]
    fn unknown_engine_rejected() {
        let err = engine_kind_from_name("containerd").unwrap_err();
        assert!(matches!(err, BakeError::EngineUnknown(_)));
    }
}
