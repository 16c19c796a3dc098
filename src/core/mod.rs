//! Core data structures for bazelify.
//!
//! This module contains the foundational types used throughout bazelify:
//! - Import references before and after classification
//! - Rule kinds and target-type resolution
//! - Existing BUILD file inspection
//! - The fatal error taxonomy

pub mod errors;
pub mod import;
pub mod manifest;
pub mod rule;

pub use errors::BazelifyError;
pub use import::{ClassifiedImports, Language, Member, RawImport};
pub use manifest::{IgnoredDeclaration, ManifestDeclaration};
pub use rule::{BazelRule, BuiltinRule, CustomRule, TargetKind};
