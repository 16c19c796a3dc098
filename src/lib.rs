//! bazelify - Infer Bazel BUILD declarations from source files
//!
//! This crate provides the library side of bazelify: import extraction,
//! import classification, rule selection and BUILD file rendering.

pub mod builder;
pub mod core;
pub mod ops;
pub mod parser;
pub mod resolver;
pub mod util;

/// Test utilities for bazelify unit tests.
///
/// Project fixtures on disk and a stub import probe.
#[cfg(test)]
pub mod test_support;

pub use core::errors::BazelifyError;
pub use core::import::{ClassifiedImports, Language, RawImport};
pub use core::rule::{resolve_rule, BazelRule, BuiltinRule, CustomRule};
pub use util::config::Config;
