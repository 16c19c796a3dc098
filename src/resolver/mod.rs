//! Import resolution.
//!
//! Raw imports are classified into project modules and packages. What the
//! environment already provides (the standard library, or anything an
//! interpreter can import in pre-installed mode) is dropped.

pub mod classify;
pub mod probe;
pub mod rules;
pub mod stdlib;

pub use classify::{classify_imports, ClassifyContext};
pub use probe::{ImportProbe, PythonProbe};
pub use rules::{ImportInferenceRule, Inferred, PatternImportRule};
