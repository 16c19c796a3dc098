//! Test fixtures for common test scenarios.
//!
//! Project trees live in a temporary directory that is removed when the
//! fixture is dropped.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Fixture for a project tree on disk.
#[derive(Debug)]
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    /// Create an empty project root.
    pub fn new() -> Self {
        ProjectFixture {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Add a file (parent directories are created).
    pub fn file(self, rel_path: impl AsRef<Path>, content: &str) -> Self {
        let full_path = self.dir.path().join(rel_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create dir");
        }
        std::fs::write(&full_path, content).expect("failed to write file");
        self
    }

    /// Project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file inside the project.
    pub fn path(&self, rel_path: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(rel_path)
    }

    /// Read a file inside the project.
    pub fn read(&self, rel_path: impl AsRef<Path>) -> String {
        std::fs::read_to_string(self.path(rel_path)).expect("failed to read file")
    }
}

impl Default for ProjectFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Canned Python sources.
pub mod sources {
    /// A script with a `__main__` guard.
    pub fn binary(imports: &str) -> String {
        format!(
            "{imports}\n\ndef main():\n    pass\n\n\nif __name__ == \"__main__\":\n    main()\n"
        )
    }

    /// A module with only definitions.
    pub fn library(imports: &str) -> String {
        format!("{imports}\n\n\nclass Thing(object):\n    pass\n")
    }

    /// A `unittest` test module.
    pub fn unit_test(imports: &str) -> String {
        format!(
            "import unittest\n{imports}\n\n\nclass ThingTest(unittest.TestCase):\n    def test_it(self):\n        pass\n\n\nunittest.main()\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_writes_nested_files() {
        let project = ProjectFixture::new().file("a/b/c.py", "x = 1\n");

        assert!(project.path("a/b").is_dir());
        assert_eq!(project.read("a/b/c.py"), "x = 1\n");
    }

    #[test]
    fn test_canned_sources() {
        assert!(sources::binary("import os").contains("__main__"));
        assert!(sources::unit_test("").contains("unittest.TestCase"));
        assert!(!sources::library("").contains("__main__"));
    }
}
