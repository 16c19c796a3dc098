//! BUILD file generation.
//!
//! This module renders declarations from classified imports and assembles
//! them, together with preserved content, into BUILD files.

pub mod output;
pub mod render;

pub use output::{render_manifest, ManifestParts, OutputExtension, DEFAULT_REQUIREMENT_LOAD};
pub use render::{generate_rule, module_label, sort_module_names, NameTables};
