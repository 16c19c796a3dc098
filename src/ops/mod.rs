//! High-level operations.
//!
//! This module contains the implementation of bazelify commands.

pub mod generate;

pub use generate::{generate, manifest_path, GenerateOptions, GenerateSummary, GeneratedManifest};
