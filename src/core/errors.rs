//! Fatal error taxonomy.
//!
//! None of these are retried or repaired; the run stops at the first one.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while inferring or writing BUILD declarations.
#[derive(Debug, Error)]
pub enum BazelifyError {
    #[error("invalid input path `{}`", path.display())]
    InvalidInputPath { path: PathBuf },

    #[error("unsupported import `{statement}` in `{}`", path.display())]
    UnsupportedImport {
        path: PathBuf,
        statement: String,
        reason: String,
    },

    #[error("multiple rule kinds apply to `{}`", path.display())]
    AmbiguousTargetType {
        path: PathBuf,
        candidates: Vec<String>,
    },

    #[error("no rule kind applies to `{}`", path.display())]
    NoTargetTypeMatched {
        path: PathBuf,
        candidates: Vec<String>,
    },

    #[error("malformed BUILD file `{}`: {message}", path.display())]
    MalformedManifest { path: PathBuf, message: String },

    #[error("invalid extension config `{}`: {message}", path.display())]
    InvalidExtensionConfig { path: PathBuf, message: String },
}

impl BazelifyError {
    /// Attach a file path to an error raised by a path-agnostic text function.
    pub fn at(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match self {
            BazelifyError::InvalidInputPath { .. } => BazelifyError::InvalidInputPath { path },
            BazelifyError::UnsupportedImport {
                statement, reason, ..
            } => BazelifyError::UnsupportedImport {
                path,
                statement,
                reason,
            },
            BazelifyError::AmbiguousTargetType { candidates, .. } => {
                BazelifyError::AmbiguousTargetType { path, candidates }
            }
            BazelifyError::NoTargetTypeMatched { candidates, .. } => {
                BazelifyError::NoTargetTypeMatched { path, candidates }
            }
            BazelifyError::MalformedManifest { message, .. } => {
                BazelifyError::MalformedManifest { path, message }
            }
            BazelifyError::InvalidExtensionConfig { message, .. } => {
                BazelifyError::InvalidExtensionConfig { path, message }
            }
        }
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            BazelifyError::InvalidInputPath { path } => {
                Diagnostic::error(format!("invalid input path `{}`", path.display()))
                    .with_context("expected a Python/Proto source file or a directory")
                    .with_suggestion(suggestions::INVALID_INPUT)
            }

            BazelifyError::UnsupportedImport {
                path,
                statement,
                reason,
            } => Diagnostic::error(format!("unsupported import `{}`", statement))
                .with_location(path)
                .with_context(reason.clone())
                .with_suggestion(suggestions::WILDCARD_IMPORT),

            BazelifyError::AmbiguousTargetType { path, candidates } => {
                Diagnostic::error("multiple rule kinds apply to this file")
                    .with_location(path)
                    .with_context(format!("matched: {}", candidates.join(", ")))
                    .with_suggestion(suggestions::AMBIGUOUS_RULE)
            }

            BazelifyError::NoTargetTypeMatched { path, candidates } => {
                Diagnostic::error("no rule kind applies to this file")
                    .with_location(path)
                    .with_context(format!("tried: {}", candidates.join(", ")))
                    .with_suggestion(suggestions::NO_RULE)
            }

            BazelifyError::MalformedManifest { path, message } => {
                Diagnostic::error("cannot parse existing BUILD file")
                    .with_location(path)
                    .with_context(message.clone())
                    .with_suggestion(suggestions::MALFORMED_MANIFEST)
            }

            BazelifyError::InvalidExtensionConfig { path, message } => {
                Diagnostic::error("invalid extension config")
                    .with_location(path)
                    .with_context(message.clone())
                    .with_suggestion(suggestions::INVALID_CONFIG)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_diagnostic_names_candidates() {
        let err = BazelifyError::AmbiguousTargetType {
            path: PathBuf::from("a/tool.py"),
            candidates: vec!["rule_a".to_string(), "rule_b".to_string()],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("multiple rule kinds"));
        assert!(output.contains("matched: rule_a, rule_b"));
        assert!(output.contains("--> a/tool.py"));
    }

    #[test]
    fn test_at_replaces_path() {
        let err = BazelifyError::MalformedManifest {
            path: PathBuf::new(),
            message: "unbalanced `(`".to_string(),
        }
        .at("pkg/BUILD");

        assert_eq!(
            err.to_string(),
            "malformed BUILD file `pkg/BUILD`: unbalanced `(`"
        );
    }
}
