//! Content-addressed layer caching
//!
//! Mirrors how the engine's build cache decides reuse so that `pybake plan`
//! can report which layers a build will rebuild before running it.
//!
//! | Input change | First invalidated step |
//! |--------------|------------------------|
//! | Base image | base runtime (everything) |
//! | System packages | system-packages |
//! | Dependency manifest | copy-manifest |
//! | Source tree only | copy-source |
//! | Port / command | expose / command |

pub mod layers;
pub mod source;

pub use layers::{LayerInputs, LayerKey, LayerPlan, LayerStatus, IMAGE_TAG_PREFIX};
pub use source::{IgnoreRules, SourceDigest, IGNORE_FILE};
