//! Per-step layer keys
//!
//! Each key hashes the parent key, the step's instruction and the digest
//! of whatever the step copies in. A change anywhere therefore invalidates
//! that step and every step after it, and nothing before it.

use crate::recipe::{Recipe, StepKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Prefix of image tags derived from a layer plan
pub const IMAGE_TAG_PREFIX: &str = "pybake-";

/// Content digests of the files copied into the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerInputs {
    pub manifest_digest: String,
    pub source_digest: String,
}

/// Cache key of one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerKey {
    pub step: StepKind,
    pub key: String,
}

/// Whether a layer can come from the cache of the previous build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerStatus {
    Reused,
    Rebuilt,
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reused => write!(f, "cached"),
            Self::Rebuilt => write!(f, "rebuild"),
        }
    }
}

/// Ordered layer keys for a recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerPlan {
    layers: Vec<LayerKey>,
}

impl LayerPlan {
    /// Compute chained keys for every step of the recipe
    pub fn compute(recipe: &Recipe, inputs: &LayerInputs) -> Self {
        let mut parent = String::new();
        let mut layers = Vec::with_capacity(recipe.steps().len());

        for step in recipe.steps() {
            let mut hasher = Sha256::new();
            hasher.update(parent.as_bytes());
            hasher.update(step.instruction().as_bytes());

            match step.kind() {
                StepKind::CopyManifest => hasher.update(inputs.manifest_digest.as_bytes()),
                StepKind::CopySource => hasher.update(inputs.source_digest.as_bytes()),
                _ => {}
            }

            let key = hex::encode(hasher.finalize());
            parent.clone_from(&key);
            layers.push(LayerKey {
                step: step.kind(),
                key,
            });
        }

        Self { layers }
    }

    pub fn layers(&self) -> &[LayerKey] {
        &self.layers
    }

    /// Key of the first step of the given kind
    pub fn key_of(&self, step: StepKind) -> Option<&str> {
        self.layers
            .iter()
            .find(|l| l.step == step)
            .map(|l| l.key.as_str())
    }

    /// Key of the last step; identifies the whole image
    pub fn final_key(&self) -> &str {
        self.layers.last().map(|l| l.key.as_str()).unwrap_or_default()
    }

    /// Content-addressed image tag (`pybake-<12 hex>`)
    pub fn image_tag(&self) -> String {
        let key = self.final_key();
        format!("{}{}", IMAGE_TAG_PREFIX, &key[..12.min(key.len())])
    }

    /// Compare against the layers of a previous build.
    ///
    /// Steps keep their cache until the first differing key; everything
    /// from there on is rebuilt.
    pub fn compare(&self, previous: &[LayerKey]) -> Vec<LayerStatus> {
        let mut invalidated = false;
        self.layers
            .iter()
            .enumerate()
            .map(|(idx, layer)| {
                if !invalidated && previous.get(idx).is_some_and(|p| p == layer) {
                    LayerStatus::Reused
                } else {
                    invalidated = true;
                    LayerStatus::Rebuilt
                }
            })
            .collect()
    }
}
