//! Rule kinds and target-type resolution.
//!
//! Built-in kinds form a closed enum; user-defined kinds come from the
//! extension config. Both are consulted through the [`BazelRule`] trait.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::BazelifyError;
use crate::core::import::Language;
use crate::parser::python::{logical_lines, LogicalLine};

const PY_BINARY_TEMPLATE: &str = r#"py_binary(
    name = "{name}",
    srcs = ["{name}.py"],
    {data}
    {deps}
)"#;

const PY_LIBRARY_TEMPLATE: &str = r#"py_library(
    name = "{name}",
    srcs = ["{name}.py"],
    {data}
    {deps}
)"#;

const PY_TEST_TEMPLATE: &str = r#"py_test(
    name = "{name}",
    srcs = ["{name}.py"],
    size = "{size}",
    {data}
    {deps}
)"#;

const PROTO_LIBRARY_TEMPLATE: &str = r#"proto_library(
    name = "{name}_proto",
    srcs = ["{name}.proto"],
    {data}
    {deps}
)

py_proto_library(
    name = "{name}_py_pb2",
    deps = [":{name}_proto"],
)"#;

const PROTO_LIBRARY_LOAD: &str = r#"load("@rules_proto//proto:defs.bzl", "proto_library")"#;
const PY_PROTO_LIBRARY_LOAD: &str =
    r#"load("@com_github_grpc_grpc//bazel:python_rules.bzl", "py_proto_library")"#;

/// `if __name__ == "__main__":` after string contents are emptied.
static MAIN_GUARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^if\s*\(?\s*__name__\s*==\s*""\s*\)?\s*:"#).expect("valid main regex")
});

static BARE_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][\w.]*)\s*\(.*\)$").expect("valid call regex")
});

static UNITTEST_IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bimport\s+unittest\b|\bfrom\s+unittest\b").expect("valid unittest regex")
});

static TEST_CASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTestCase\b").expect("valid test case regex"));

const KEYWORDS: &[&str] = &[
    "and", "assert", "await", "del", "elif", "else", "except", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "raise", "return", "while", "with",
    "yield",
];

/// Category of build output a source file produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Binary,
    Library,
    Test,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Binary => write!(f, "binary"),
            TargetKind::Library => write!(f, "library"),
            TargetKind::Test => write!(f, "test"),
        }
    }
}

/// A `load(...)` statement required by a rule kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RuleLoad {
    /// Symbol the statement loads
    pub symbol: String,
    /// The full statement
    pub statement: String,
}

impl RuleLoad {
    pub fn new(symbol: impl Into<String>, statement: impl Into<String>) -> Self {
        RuleLoad {
            symbol: symbol.into(),
            statement: statement.into(),
        }
    }
}

/// A kind of declaration that can represent a source file.
pub trait BazelRule: fmt::Debug {
    /// Rule name as written in BUILD files (`py_binary`).
    fn identifier(&self) -> &str;

    /// Language of the sources this rule accepts.
    fn language(&self) -> Language;

    /// Declaration template with `{name}`, `{data}`, `{deps}` and `{size}` slots.
    fn template(&self) -> &str;

    /// Whether the rule is a test rule (and so carries a `size`).
    fn is_test_rule(&self) -> bool;

    /// Whether the rule represents a file named `name` (no extension) with `source`.
    fn applies_to(&self, name: &str, source: &str) -> bool;

    /// Whether the rule was supplied by the user.
    fn is_custom(&self) -> bool {
        false
    }

    /// Load statements the rule needs, if it is not native to Bazel.
    fn loads(&self) -> Vec<RuleLoad> {
        Vec::new()
    }

    /// Byte offset inside `manifest` of a declaration listing `filename` in its sources.
    fn find_existing(&self, manifest: &str, filename: &str) -> Option<usize> {
        find_in_srcs(manifest, filename)
    }
}

/// Offset of a single-element `srcs` list naming `filename`.
pub fn find_in_srcs(manifest: &str, filename: &str) -> Option<usize> {
    let pattern = format!(r#"srcs\s*=\s*\[\s*"{}"\s*,?\s*\]"#, regex::escape(filename));
    let re = Regex::new(&pattern).ok()?;
    re.find(manifest).map(|m| m.start())
}

/// Rule kinds known without any configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinRule {
    PyBinary,
    PyLibrary,
    PyTest,
    ProtoLibrary,
}

/// All built-in rules, in evaluation order.
pub static BUILTIN_RULES: [BuiltinRule; 4] = [
    BuiltinRule::PyBinary,
    BuiltinRule::PyLibrary,
    BuiltinRule::PyTest,
    BuiltinRule::ProtoLibrary,
];

impl BuiltinRule {
    /// Target kind the rule produces.
    pub fn kind(&self) -> TargetKind {
        match self {
            BuiltinRule::PyBinary => TargetKind::Binary,
            BuiltinRule::PyLibrary | BuiltinRule::ProtoLibrary => TargetKind::Library,
            BuiltinRule::PyTest => TargetKind::Test,
        }
    }
}

impl BazelRule for BuiltinRule {
    fn identifier(&self) -> &str {
        match self {
            BuiltinRule::PyBinary => "py_binary",
            BuiltinRule::PyLibrary => "py_library",
            BuiltinRule::PyTest => "py_test",
            BuiltinRule::ProtoLibrary => "proto_library",
        }
    }

    fn language(&self) -> Language {
        match self {
            BuiltinRule::ProtoLibrary => Language::Proto,
            _ => Language::Python,
        }
    }

    fn template(&self) -> &str {
        match self {
            BuiltinRule::PyBinary => PY_BINARY_TEMPLATE,
            BuiltinRule::PyLibrary => PY_LIBRARY_TEMPLATE,
            BuiltinRule::PyTest => PY_TEST_TEMPLATE,
            BuiltinRule::ProtoLibrary => PROTO_LIBRARY_TEMPLATE,
        }
    }

    fn is_test_rule(&self) -> bool {
        self.kind() == TargetKind::Test
    }

    fn applies_to(&self, name: &str, source: &str) -> bool {
        match self {
            BuiltinRule::PyTest => is_unittest(name, source),
            BuiltinRule::PyBinary => has_entrypoint(source) && !is_unittest(name, source),
            BuiltinRule::PyLibrary => !is_unittest(name, source) && !has_entrypoint(source),
            BuiltinRule::ProtoLibrary => true,
        }
    }

    fn loads(&self) -> Vec<RuleLoad> {
        match self {
            BuiltinRule::ProtoLibrary => vec![
                RuleLoad::new("proto_library", PROTO_LIBRARY_LOAD),
                RuleLoad::new("py_proto_library", PY_PROTO_LIBRARY_LOAD),
            ],
            _ => Vec::new(),
        }
    }
}

fn is_unittest(name: &str, source: &str) -> bool {
    (name.starts_with("test_") || name.ends_with("_test"))
        && UNITTEST_IMPORT_RE.is_match(source)
        && TEST_CASE_RE.is_match(source)
}

fn is_main_guard(line: &LogicalLine) -> bool {
    MAIN_GUARD_RE.is_match(&line.text) && line.literals.first().is_some_and(|l| l == "__main__")
}

fn has_entrypoint(source: &str) -> bool {
    logical_lines(source)
        .iter()
        .filter(|line| !line.indented)
        .any(|line| is_main_guard(line) || is_bare_call(line))
}

fn is_bare_call(line: &LogicalLine) -> bool {
    BARE_CALL_RE
        .captures(&line.text)
        .and_then(|caps| caps.get(1))
        .is_some_and(|callee| {
            let head = callee.as_str().split('.').next().unwrap_or_default();
            !KEYWORDS.contains(&head)
        })
}

/// Rule kind declared in the extension config.
#[derive(Debug, Clone)]
pub struct CustomRule {
    pub identifier: String,
    pub language: Language,
    pub test: bool,
    pub load: Option<String>,
    pub template: String,
    /// Regex locating an existing declaration; `{filename}` is replaced by the escaped file name
    pub existing: Option<String>,
    pub name_prefix: Vec<String>,
    pub name_suffix: Vec<String>,
    pub contains: Vec<String>,
    pub excludes: Vec<String>,
    pub matches: Vec<Regex>,
}

impl CustomRule {
    /// Template used when the config gives none.
    pub fn default_template(identifier: &str, language: Language, test: bool) -> String {
        let mut template = format!(
            "{}(\n    name = \"{{name}}\",\n    srcs = [\"{{name}}.{}\"],\n",
            identifier,
            language.extension()
        );
        if test {
            template.push_str("    size = \"{size}\",\n");
        }
        template.push_str("    {data}\n    {deps}\n)");
        template
    }

    /// Whether any predicate is configured.
    pub fn has_predicate(&self) -> bool {
        !(self.name_prefix.is_empty()
            && self.name_suffix.is_empty()
            && self.contains.is_empty()
            && self.excludes.is_empty()
            && self.matches.is_empty())
    }
}

impl BazelRule for CustomRule {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn language(&self) -> Language {
        self.language
    }

    fn template(&self) -> &str {
        &self.template
    }

    fn is_test_rule(&self) -> bool {
        self.test
    }

    fn applies_to(&self, name: &str, source: &str) -> bool {
        if !self.name_prefix.is_empty() || !self.name_suffix.is_empty() {
            let named = self.name_prefix.iter().any(|p| name.starts_with(p.as_str()))
                || self.name_suffix.iter().any(|s| name.ends_with(s.as_str()));
            if !named {
                return false;
            }
        }

        self.contains.iter().all(|c| source.contains(c.as_str()))
            && !self.excludes.iter().any(|e| source.contains(e.as_str()))
            && self.matches.iter().all(|re| re.is_match(source))
    }

    fn is_custom(&self) -> bool {
        true
    }

    fn loads(&self) -> Vec<RuleLoad> {
        self.load
            .iter()
            .map(|statement| RuleLoad::new(self.identifier.clone(), statement.clone()))
            .collect()
    }

    fn find_existing(&self, manifest: &str, filename: &str) -> Option<usize> {
        let Some(ref existing) = self.existing else {
            return find_in_srcs(manifest, filename);
        };

        let pattern = existing.replace("{filename}", &regex::escape(filename));
        let re = Regex::new(&pattern).ok()?;
        re.find(manifest).map(|m| m.start())
    }
}

/// Select the one rule kind that represents a source file.
///
/// Every candidate for the language is evaluated. A single match wins; among
/// several matches a single custom rule overrides the built-ins.
pub fn resolve_rule<'a>(
    path: &Path,
    source: &str,
    language: Language,
    custom: &'a [CustomRule],
) -> Result<&'a dyn BazelRule, BazelifyError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let candidates: Vec<&'a dyn BazelRule> = BUILTIN_RULES
        .iter()
        .map(|rule| rule as &'a dyn BazelRule)
        .chain(custom.iter().map(|rule| rule as &'a dyn BazelRule))
        .filter(|rule| rule.language() == language)
        .collect();

    let matched: Vec<&'a dyn BazelRule> = candidates
        .iter()
        .copied()
        .filter(|rule| rule.applies_to(name, source))
        .collect();

    if let [only] = matched.as_slice() {
        return Ok(*only);
    }

    let custom_matches: Vec<&'a dyn BazelRule> =
        matched.iter().copied().filter(|rule| rule.is_custom()).collect();
    if matched.len() > 1 {
        if let [only] = custom_matches.as_slice() {
            tracing::debug!(
                "custom rule `{}` overrides built-in matches for {}",
                only.identifier(),
                path.display()
            );
            return Ok(*only);
        }

        return Err(BazelifyError::AmbiguousTargetType {
            path: path.to_path_buf(),
            candidates: identifiers(&matched),
        });
    }

    Err(BazelifyError::NoTargetTypeMatched {
        path: path.to_path_buf(),
        candidates: identifiers(&candidates),
    })
}

fn identifiers(rules: &[&dyn BazelRule]) -> Vec<String> {
    rules.iter().map(|r| r.identifier().to_string()).collect()
}
