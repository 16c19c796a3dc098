//! Import references, before and after classification.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Source language of a target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python module (`.py`)
    #[default]
    Python,
    /// Protocol buffer definition (`.proto`)
    Proto,
}

impl Language {
    /// Detect the language from a file extension.
    pub fn from_path(path: &Path) -> Option<Language> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("py") => Some(Language::Python),
            Some("proto") => Some(Language::Proto),
            _ => None,
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::Proto => "proto",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Python => write!(f, "python"),
            Language::Proto => write!(f, "proto"),
        }
    }
}

/// Imported member of a `from base import member` statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Member {
    /// A named symbol, submodule, or subpackage
    Name(String),
    /// `*`
    Wildcard,
}

/// One import reference as written in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawImport {
    /// Dotted base path (`a.b` in `from a.b import c`)
    pub base: String,
    /// Imported member, `None` for `import base`
    pub member: Option<Member>,
    /// Number of leading dots of a relative import (0 = absolute)
    pub level: usize,
}

impl RawImport {
    /// `import base`
    pub fn module(base: impl Into<String>) -> Self {
        RawImport {
            base: base.into(),
            member: None,
            level: 0,
        }
    }

    /// `from base import member`
    pub fn from(base: impl Into<String>, member: impl Into<String>) -> Self {
        RawImport {
            base: base.into(),
            member: Some(Member::Name(member.into())),
            level: 0,
        }
    }

    /// Member name, if it is a plain name.
    pub fn member_name(&self) -> Option<&str> {
        match &self.member {
            Some(Member::Name(name)) => Some(name),
            _ => None,
        }
    }

    /// Whether this is a relative import.
    pub fn is_relative(&self) -> bool {
        self.level > 0
    }
}

impl fmt::Display for RawImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // An absolute import with an empty base names the project root package.
        let dots = if self.level == 0 && self.base.is_empty() {
            ".".to_string()
        } else {
            ".".repeat(self.level)
        };
        match &self.member {
            None => write!(f, "import {}{}", dots, self.base),
            Some(Member::Name(name)) => write!(f, "from {}{} import {}", dots, self.base, name),
            Some(Member::Wildcard) => write!(f, "from {}{} import *", dots, self.base),
        }
    }
}

/// Dependencies of one source file after classification.
///
/// Both sets are deduplicated; rendering decides the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedImports {
    /// Dotted package names, resolved later through the name tables
    pub packages: BTreeSet<String>,
    /// Dotted module names inside the project (or an `@repo` prefix)
    pub modules: BTreeSet<String>,
}

impl ClassifiedImports {
    /// Create an empty set of imports.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.packages.len() + self.modules.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.modules.is_empty()
    }

    /// Merge another classification into this one.
    pub fn extend(&mut self, other: ClassifiedImports) {
        self.packages.extend(other.packages);
        self.modules.extend(other.modules);
    }
}

/// Split a leading `@repo` segment off a dotted path.
///
/// `"@ext.abc.def"` becomes `(Some("@ext"), "abc.def")`.
pub fn split_repository(dotted: &str) -> (Option<&str>, &str) {
    if dotted.starts_with('@') {
        match dotted.split_once('.') {
            Some((repo, rest)) => (Some(repo), rest),
            None => (Some(dotted), ""),
        }
    } else {
        (None, dotted)
    }
}

/// Filesystem location of a dotted path below `root`, ignoring any `@repo` prefix.
pub fn dotted_to_path(root: &Path, dotted: &str) -> PathBuf {
    let (_, local) = split_repository(dotted);
    let mut path = root.to_path_buf();
    for segment in local.split('.').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}
