//! Test utilities for bazelify unit tests.
//!
//! Provides a stub environment probe and temporary project trees so the
//! classifier and generator can be exercised without a Python interpreter.

pub mod fixtures;

use std::collections::BTreeSet;

use crate::resolver::probe::ImportProbe;

// Re-export fixtures for convenience
pub use fixtures::*;

/// Probe that reports a fixed set of top-level names as installed.
#[derive(Debug, Clone, Default)]
pub struct StubProbe {
    installed: BTreeSet<String>,
}

impl StubProbe {
    /// Probe for which exactly `names` (and their submodules) import.
    pub fn installed(names: &[&str]) -> Self {
        StubProbe {
            installed: names.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ImportProbe for StubProbe {
    fn probe(&self, base: &str, _member: Option<&str>) -> bool {
        let top = base.split('.').next().unwrap_or(base);
        self.installed.contains(top)
    }
}

/// Assertion helpers for testing.
pub mod assertions {
    use std::path::Path;

    /// Assert that a result is Err and return the error.
    pub fn assert_err<T: std::fmt::Debug, E>(result: Result<T, E>) -> E {
        match result {
            Ok(v) => panic!("expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    }

    /// Assert that a file contains specific content.
    pub fn assert_file_contains(path: impl AsRef<Path>, content: &str) {
        let path = path.as_ref();
        let actual = std::fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("file not found: {}", path.display()));
        assert!(
            actual.contains(content),
            "file {} does not contain '{}'\nactual content:\n{}",
            path.display(),
            content,
            actual
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_probe_matches_top_level() {
        let probe = StubProbe::installed(&["numpy"]);

        assert!(probe.probe("numpy", None));
        assert!(probe.probe("numpy.linalg", Some("norm")));
        assert!(!probe.probe("pandas", None));
    }

    #[test]
    fn test_assertions() {
        use assertions::*;

        let err_result: Result<i32, &str> = Err("error");
        assert_eq!(assert_err(err_result), "error");
    }
}
