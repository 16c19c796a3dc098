//! Import extractors, one per source language.
//!
//! Extractors only find import-like statements; what the imports refer to
//! is decided by the resolver.

pub mod proto;
pub mod python;

use crate::core::errors::BazelifyError;
use crate::core::import::{Language, RawImport};

/// Extract raw imports from source text of the given language.
pub fn extract_imports(language: Language, source: &str) -> Result<Vec<RawImport>, BazelifyError> {
    match language {
        Language::Python => python::extract_imports(source),
        Language::Proto => Ok(proto::extract_imports(source)),
    }
}
