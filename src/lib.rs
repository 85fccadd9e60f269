//! pybake - container images for Python web applications
//!
//! Turns a requirements manifest and a source tree into a layer-cached,
//! least-privilege image built by Podman or Docker.

pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod history;
pub mod manifest;
pub mod recipe;
pub mod ui;
pub mod verify;

pub use error::{BakeError, BakeResult};
