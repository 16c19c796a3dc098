//! Existing BUILD file inspection.
//!
//! BUILD files are hand-edited, so they are not parsed with a grammar.
//! Declarations are found by regex and delimited by a balanced scan that
//! skips string literals and comments.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::BazelifyError;
use crate::core::rule::BazelRule;

/// Tag that marks a declaration as hand-maintained.
pub const IGNORE_TAG: &str = "bazelify-ignore";

static IGNORE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^#[ \t]+{}\s+", regex::escape(IGNORE_TAG)))
        .expect("valid ignore regex")
});

static DECLARATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*[A-Za-z_]\w*\s*\(").expect("valid declaration regex")
});

static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bsize\s*=\s*"(small|medium|large|enormous)""#).expect("valid size regex")
});

static DATA_LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdata\s*=\s*\[").expect("valid data regex"));

static DATA_GLOB_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdata\s*=\s*glob\s*\(").expect("valid glob regex"));

/// Attributes of an existing declaration that survive regeneration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extras {
    /// Full `data = ...` attribute text
    pub data: Option<String>,
    /// Test size (`small`, `medium`, ...)
    pub test_size: Option<String>,
}

/// A declaration found in an existing BUILD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDeclaration {
    pub kind_identifier: String,
    pub source_text: String,
    pub extras: Extras,
}

/// Declaration the user marked with the ignore tag, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoredDeclaration {
    /// Text from the marker comment to the closing parenthesis
    pub text: String,
}

impl IgnoredDeclaration {
    /// Whether this is a `load(...)` statement.
    pub fn is_load(&self) -> bool {
        self.text.contains("load(")
    }

    /// Whether the declaration lists `filename` as its source.
    pub fn covers(&self, filename: &str) -> bool {
        let quoted = format!("\"{}\"", filename);
        let srcs = format!(r#"\bsrcs\s*=\s*\[[^\]]*{}"#, regex::escape(&quoted));
        if Regex::new(&srcs).is_ok_and(|re| re.is_match(&self.text)) {
            return true;
        }

        // `rule("file.py", ...)`
        let body = IGNORE_MARKER_RE.replace(&self.text, "");
        body.split_once('(')
            .is_some_and(|(_, args)| args.trim_start().starts_with(&quoted))
    }
}

fn malformed(message: impl Into<String>) -> BazelifyError {
    BazelifyError::MalformedManifest {
        path: Default::default(),
        message: message.into(),
    }
}

/// Text from `start` through the delimiter that closes the first `open` after it.
///
/// String literals and `#` comments are skipped while counting.
pub fn enclosed_expression(text: &str, start: usize, open: char) -> Result<&str, BazelifyError> {
    let close = match open {
        '(' => b')',
        '[' => b']',
        '{' => b'}',
        other => return Err(malformed(format!("no closing token for `{}`", other))),
    };
    let open_byte = open as u8;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                i = skip_quoted(bytes, i);
                continue;
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b if b == open_byte => depth += 1,
            b if b == close && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=i]);
                }
            }
            _ => {}
        }
        i += 1;
    }

    if depth == 0 {
        Err(malformed(format!("could not locate the opening `{}`", open)))
    } else {
        Err(malformed(format!("unbalanced `{}`", open)))
    }
}

fn skip_quoted(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let mut i = if triple { start + 3 } else { start + 1 };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if !triple {
                    return i + 1;
                }
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    return i + 3;
                }
                i += 1;
            }
            b'\n' if !triple => return i,
            _ => i += 1,
        }
    }

    bytes.len()
}

/// Find the declaration of `rule` whose sources name `filename`.
///
/// Returns `None` when no declaration lists the file, or when the file is
/// declared by a different rule kind.
pub fn locate(
    manifest: &str,
    filename: &str,
    rule: &dyn BazelRule,
) -> Result<Option<ManifestDeclaration>, BazelifyError> {
    let Some(at) = rule.find_existing(manifest, filename) else {
        return Ok(None);
    };

    let identifier = rule.identifier();
    let start = if manifest[at..].starts_with(identifier) {
        at
    } else {
        let opener = Regex::new(&format!(r"(?m)^[ \t]*{}\s*\(", regex::escape(identifier)))
            .map_err(|e| malformed(e.to_string()))?;
        match opener.find_iter(&manifest[..at]).last() {
            Some(m) => m.start() + (m.as_str().len() - m.as_str().trim_start().len()),
            None if DECLARATION_RE.is_match(&manifest[..at]) => {
                tracing::debug!("`{}` is declared by another rule kind", filename);
                return Ok(None);
            }
            None => {
                return Err(malformed(format!(
                    "could not locate the start of the `{}` declaration for `{}`",
                    identifier, filename
                )))
            }
        }
    };

    let source_text = enclosed_expression(manifest, start, '(')?;
    if start + source_text.len() <= at {
        // The nearest opener closes before the match: another kind owns the file.
        return Ok(None);
    }

    let extras = Extras {
        data: find_data(source_text)?,
        test_size: if rule.is_test_rule() {
            find_test_size(source_text)?
        } else {
            None
        },
    };

    Ok(Some(ManifestDeclaration {
        kind_identifier: identifier.to_string(),
        source_text: source_text.to_string(),
        extras,
    }))
}

/// The `size` of a test declaration.
pub fn find_test_size(declaration: &str) -> Result<Option<String>, BazelifyError> {
    let sizes: Vec<&str> = SIZE_RE
        .captures_iter(declaration)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();

    match sizes.as_slice() {
        [] => Ok(None),
        [size] => Ok(Some(size.to_string())),
        _ => Err(malformed(format!(
            "found multiple test sizes in `{}`",
            first_line(declaration)
        ))),
    }
}

/// The `data` attribute of a declaration, either a list or a `glob(...)` call.
pub fn find_data(declaration: &str) -> Result<Option<String>, BazelifyError> {
    if let Some(m) = DATA_GLOB_RE.find(declaration) {
        return enclosed_expression(declaration, m.start(), '(').map(|s| Some(s.to_string()));
    }
    if let Some(m) = DATA_LIST_RE.find(declaration) {
        return enclosed_expression(declaration, m.start(), '[').map(|s| Some(s.to_string()));
    }
    Ok(None)
}

/// All declarations marked with the ignore tag, in file order.
pub fn find_ignored(manifest: &str) -> Result<Vec<IgnoredDeclaration>, BazelifyError> {
    IGNORE_MARKER_RE
        .find_iter(manifest)
        .map(|m| {
            enclosed_expression(manifest, m.start(), '(').map(|text| IgnoredDeclaration {
                text: text.to_string(),
            })
        })
        .collect()
}

/// Whether an ignored declaration already covers `filename`.
pub fn is_ignored(filename: &str, ignored: &[IgnoredDeclaration]) -> bool {
    ignored.iter().any(|decl| decl.covers(filename))
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::import::Language;
    use crate::core::rule::{BuiltinRule, CustomRule};

    const MANIFEST: &str = r#"load("@my_deps//:requirements.bzl", "requirement")

py_library(
    name = "util",
    srcs = ["util.py"],
    data = glob(["data/*.json", "extra/(x).txt"]),
    deps = [requirement("numpy")],
)

py_test(
    name = "test_util",
    srcs = ["test_util.py"],
    size = "medium",
    data = [
        "fixtures/a.txt",
    ],
    deps = [":util"],
)
"#;

    #[test]
    fn test_enclosed_expression_nested() {
        let start = MANIFEST.find("py_library").unwrap();
        let decl = enclosed_expression(MANIFEST, start, '(').unwrap();

        assert!(decl.starts_with("py_library("));
        assert!(decl.ends_with("deps = [requirement(\"numpy\")],\n)"));
    }

    #[test]
    fn test_enclosed_expression_skips_strings_and_comments() {
        let text = "rule(\n    name = \")\",  # (\n    srcs = [\"a.py\"],\n)\nafter";
        let decl = enclosed_expression(text, 0, '(').unwrap();
        assert!(decl.ends_with("],\n)"));
    }

    #[test]
    fn test_enclosed_expression_errors() {
        assert!(enclosed_expression("rule(\n  srcs = [", 0, '(').is_err());
        assert!(enclosed_expression("no parens here", 0, '(').is_err());
    }

    #[test]
    fn test_locate_extracts_glob_data() {
        let decl = locate(MANIFEST, "util.py", &BuiltinRule::PyLibrary)
            .unwrap()
            .unwrap();

        assert_eq!(decl.kind_identifier, "py_library");
        assert!(decl.source_text.starts_with("py_library("));
        assert_eq!(
            decl.extras.data.as_deref(),
            Some(r#"data = glob(["data/*.json", "extra/(x).txt"])"#)
        );
        assert_eq!(decl.extras.test_size, None);
    }

    #[test]
    fn test_locate_test_size_and_list_data() {
        let decl = locate(MANIFEST, "test_util.py", &BuiltinRule::PyTest)
            .unwrap()
            .unwrap();

        assert_eq!(decl.extras.test_size.as_deref(), Some("medium"));
        assert_eq!(
            decl.extras.data.as_deref(),
            Some("data = [\n        \"fixtures/a.txt\",\n    ]")
        );
    }

    #[test]
    fn test_locate_missing_file() {
        assert!(locate(MANIFEST, "other.py", &BuiltinRule::PyLibrary)
            .unwrap()
            .is_none());
        assert!(locate("", "util.py", &BuiltinRule::PyLibrary)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_locate_with_changed_kind() {
        // util.py is now a binary; the library declaration belongs to another kind.
        assert!(locate(MANIFEST, "util.py", &BuiltinRule::PyBinary)
            .unwrap()
            .is_none());
        // test_util.py is now a library; the nearest py_library closes before it.
        assert!(locate(MANIFEST, "test_util.py", &BuiltinRule::PyLibrary)
            .unwrap()
            .is_none());
    }

    fn cli_rule() -> CustomRule {
        CustomRule {
            identifier: "py_cli".to_string(),
            language: Language::Python,
            test: false,
            load: None,
            template: CustomRule::default_template("py_cli", Language::Python, false),
            existing: None,
            name_prefix: Vec::new(),
            name_suffix: vec!["_cli".to_string()],
            contains: Vec::new(),
            excludes: Vec::new(),
            matches: Vec::new(),
        }
    }

    #[test]
    fn test_locate_changed_kind_for_proto_and_custom_rules() {
        let manifest = r#"py_library(
    name = "api",
    srcs = ["api.proto"],
    data = ["api.json"],
)

py_binary(
    name = "deploy_cli",
    srcs = ["deploy_cli.py"],
    data = ["deploy.yaml"],
)
"#;

        assert!(locate(manifest, "api.proto", &BuiltinRule::ProtoLibrary)
            .unwrap()
            .is_none());
        assert!(locate(manifest, "deploy_cli.py", &cli_rule())
            .unwrap()
            .is_none());

        let kept = manifest.replace("py_binary(", "py_cli(");
        let decl = locate(&kept, "deploy_cli.py", &cli_rule()).unwrap().unwrap();
        assert_eq!(decl.kind_identifier, "py_cli");
        assert_eq!(decl.extras.data.as_deref(), Some(r#"data = ["deploy.yaml"]"#));
    }

    #[test]
    fn test_locate_without_opener_is_malformed() {
        let err = locate("srcs = [\"a.py\"]\n", "a.py", &BuiltinRule::PyLibrary).unwrap_err();
        assert!(matches!(err, BazelifyError::MalformedManifest { .. }));
    }

    #[test]
    fn test_multiple_sizes_are_malformed() {
        let decl = "py_test(\n    size = \"small\",\n    size = \"large\",\n)";
        assert!(find_test_size(decl).is_err());
    }

    #[test]
    fn test_find_ignored() {
        let manifest = r#"# bazelify-ignore
load("//tools:defs.bzl", "custom_rule")

py_library(
    name = "a",
    srcs = ["a.py"],
)

# bazelify-ignore
custom_rule(
    name = "b",
    srcs = ["b.py", "b_extra.py"],
)

#   bazelify-ignore
genrule("c.py", cmd = "echo")
"#;
        let ignored = find_ignored(manifest).unwrap();

        assert_eq!(ignored.len(), 3);
        assert!(ignored[0].is_load());
        assert!(ignored[0].text.starts_with("# bazelify-ignore\nload("));
        assert!(!ignored[1].is_load());
        assert!(ignored[1].text.ends_with("],\n)"));

        assert!(is_ignored("b.py", &ignored));
        assert!(is_ignored("b_extra.py", &ignored));
        assert!(is_ignored("c.py", &ignored));
        assert!(!is_ignored("a.py", &ignored));
    }

    #[test]
    fn test_ignore_marker_must_start_line() {
        let manifest = "x = 1  # bazelify-ignore\npy_library(name = \"a\")\n";
        assert!(find_ignored(manifest).unwrap().is_empty());
    }
}
