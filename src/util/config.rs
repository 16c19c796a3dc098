//! Extension configuration (`.bazelify.toml`).
//!
//! The file is parsed once into [`ConfigFile`], validated, and compiled into
//! an immutable [`Config`] that every generation step receives by reference.
//!
//! ```toml
//! header = "# Generated by bazelify"
//! requirement = 'load("@pip//:requirements.bzl", "requirement")'
//!
//! [import_name_to_pip_name]
//! yaml = "pyyaml"
//!
//! [local_import_name_to_dep]
//! mypkg = "//mypkg"
//!
//! [[rules]]
//! identifier = "py_doctest"
//! test = true
//! load = 'load("//tools:doctest.bzl", "py_doctest")'
//! name_prefix = ["test_doctest"]
//! contains = ["import doctest"]
//!
//! [[import_rules]]
//! base = 'google\.protobuf(\..*)?'
//! packages = ["protobuf"]
//! ```

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::builder::output::{OutputExtension, DEFAULT_REQUIREMENT_LOAD};
use crate::builder::render::NameTables;
use crate::core::errors::BazelifyError;
use crate::core::import::Language;
use crate::core::rule::CustomRule;
use crate::resolver::rules::{full_match_regex, ImportInferenceRule, PatternImportRule};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".bazelify.toml";

/// Default BUILD file name.
pub const DEFAULT_BUILD_FILE_NAME: &str = "BUILD";

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*$").expect("valid identifier regex"));

/// On-disk shape of the config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Text placed at the top of every BUILD file
    pub header: String,
    /// Text placed at the bottom of every BUILD file
    pub footer: String,
    /// Statement loading the pip `requirement` macro
    pub requirement: Option<String>,
    /// BUILD file name to write
    pub build_file_name: Option<String>,
    pub import_name_to_pip_name: BTreeMap<String, String>,
    pub local_import_name_to_dep: BTreeMap<String, String>,
    /// Additional rule kinds
    pub rules: Vec<RuleConfig>,
    /// Additional import inference rules
    pub import_rules: Vec<ImportRuleConfig>,
}

/// A user-defined rule kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub identifier: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub test: bool,
    pub load: Option<String>,
    pub template: Option<String>,
    pub existing: Option<String>,
    #[serde(default)]
    pub name_prefix: Vec<String>,
    #[serde(default)]
    pub name_suffix: Vec<String>,
    #[serde(default)]
    pub contains: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub matches: Vec<String>,
}

/// A user-defined import inference rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportRuleConfig {
    pub base: String,
    pub member: Option<String>,
    pub packages: Option<Vec<String>>,
    pub modules: Option<Vec<String>>,
}

/// Validated, immutable configuration for one run.
#[derive(Debug)]
pub struct Config {
    pub output: OutputExtension,
    pub requirement_load: String,
    pub build_file_name: String,
    pub tables: NameTables,
    pub rules: Vec<CustomRule>,
    pub import_rules: Vec<Box<dyn ImportInferenceRule>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            output: OutputExtension::default(),
            requirement_load: DEFAULT_REQUIREMENT_LOAD.to_string(),
            build_file_name: DEFAULT_BUILD_FILE_NAME.to_string(),
            tables: NameTables::default(),
            rules: Vec::new(),
            import_rules: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults unless the path was given explicitly.
    pub fn load(path: &Path, explicit: bool) -> Result<Config, BazelifyError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound && !explicit => {
                tracing::debug!("no config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => return Err(invalid(path, format!("cannot read file: {}", e))),
        };

        let config = Self::from_toml(&contents, path)?;
        tracing::debug!(
            "loaded {} custom rule(s) and {} import rule(s) from {}",
            config.rules.len(),
            config.import_rules.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate config text; `path` is used for error reporting.
    pub fn from_toml(contents: &str, path: &Path) -> Result<Config, BazelifyError> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| invalid(path, e.message().to_string()))?;
        Self::compile(file, path)
    }

    fn compile(file: ConfigFile, path: &Path) -> Result<Config, BazelifyError> {
        let build_file_name = file
            .build_file_name
            .unwrap_or_else(|| DEFAULT_BUILD_FILE_NAME.to_string());
        if build_file_name.is_empty() || build_file_name.contains(['/', '\\']) {
            return Err(invalid(
                path,
                format!("`build_file_name` must be a plain file name, got `{}`", build_file_name),
            ));
        }

        let rules = file
            .rules
            .into_iter()
            .map(|rule| compile_rule(rule, path))
            .collect::<Result<Vec<_>, _>>()?;

        let import_rules = file
            .import_rules
            .into_iter()
            .map(|rule| compile_import_rule(rule, path))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            output: OutputExtension {
                header: file.header,
                footer: file.footer,
            },
            requirement_load: file
                .requirement
                .unwrap_or_else(|| DEFAULT_REQUIREMENT_LOAD.to_string()),
            build_file_name,
            tables: NameTables {
                import_name_to_pip_name: file.import_name_to_pip_name,
                local_import_name_to_dep: file.local_import_name_to_dep,
            },
            rules,
            import_rules,
        })
    }
}

fn invalid(path: &Path, message: impl Into<String>) -> BazelifyError {
    BazelifyError::InvalidExtensionConfig {
        path: PathBuf::from(path),
        message: message.into(),
    }
}

fn compile_regex(path: &Path, what: &str, pattern: &str) -> Result<Regex, BazelifyError> {
    Regex::new(pattern).map_err(|e| invalid(path, format!("invalid {} regex `{}`: {}", what, pattern, e)))
}

/// Import rule patterns must match the whole name.
fn compile_full_match(path: &Path, what: &str, pattern: &str) -> Result<Regex, BazelifyError> {
    compile_regex(path, what, pattern)?;
    full_match_regex(pattern)
        .map_err(|e| invalid(path, format!("invalid {} regex `{}`: {}", what, pattern, e)))
}

fn compile_rule(rule: RuleConfig, path: &Path) -> Result<CustomRule, BazelifyError> {
    if !IDENTIFIER_RE.is_match(&rule.identifier) {
        return Err(invalid(
            path,
            format!("rule identifier `{}` is not a valid name", rule.identifier),
        ));
    }

    let template = rule.template.unwrap_or_else(|| {
        CustomRule::default_template(&rule.identifier, rule.language, rule.test)
    });
    if !template.contains("{name}") {
        return Err(invalid(
            path,
            format!("template of rule `{}` has no `{{name}}` slot", rule.identifier),
        ));
    }

    if let Some(ref existing) = rule.existing {
        compile_regex(path, "existing", &existing.replace("{filename}", "x"))?;
    }

    let matches = rule
        .matches
        .iter()
        .map(|pattern| compile_regex(path, "matches", pattern))
        .collect::<Result<Vec<_>, _>>()?;

    let compiled = CustomRule {
        identifier: rule.identifier,
        language: rule.language,
        test: rule.test,
        load: rule.load,
        template,
        existing: rule.existing,
        name_prefix: rule.name_prefix,
        name_suffix: rule.name_suffix,
        contains: rule.contains,
        excludes: rule.excludes,
        matches,
    };

    if !compiled.has_predicate() {
        return Err(invalid(
            path,
            format!(
                "rule `{}` needs at least one of name_prefix, name_suffix, contains, excludes, matches",
                compiled.identifier
            ),
        ));
    }

    Ok(compiled)
}

fn compile_import_rule(
    rule: ImportRuleConfig,
    path: &Path,
) -> Result<Box<dyn ImportInferenceRule>, BazelifyError> {
    if rule.packages.is_none() && rule.modules.is_none() {
        return Err(invalid(
            path,
            format!("import rule for `{}` has neither packages nor modules", rule.base),
        ));
    }

    let base = compile_full_match(path, "base", &rule.base)?;
    let member = rule
        .member
        .as_deref()
        .map(|pattern| compile_full_match(path, "member", pattern))
        .transpose()?;

    Ok(Box::new(PatternImportRule::new(
        base,
        member,
        rule.packages,
        rule.modules,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::BazelRule;
    use crate::test_support::assertions::assert_err;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<Config, BazelifyError> {
        Config::from_toml(text, Path::new(".bazelify.toml"))
    }

    #[test]
    fn test_missing_default_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load(&tmp.path().join(CONFIG_FILE_NAME), false).unwrap();

        assert_eq!(config.build_file_name, "BUILD");
        assert_eq!(config.requirement_load, DEFAULT_REQUIREMENT_LOAD);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = assert_err(Config::load(&tmp.path().join("custom.toml"), true));
        assert!(matches!(err, BazelifyError::InvalidExtensionConfig { .. }));
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse(
            r##"
header = "# header"
footer = "# footer"
requirement = 'load("@pip//:requirements.bzl", "requirement")'
build_file_name = "BUILD.bazel"

[import_name_to_pip_name]
yaml = "pyyaml"

[local_import_name_to_dep]
mypkg = "//mypkg"

[[rules]]
identifier = "py_doctest"
test = true
load = 'load("//tools:doctest.bzl", "py_doctest")'
name_prefix = ["test_doctest"]
contains = ["import doctest"]

[[import_rules]]
base = 'google\.protobuf(\..*)?'
packages = ["protobuf"]
"##,
        )
        .unwrap();

        assert_eq!(config.output.header, "# header");
        assert_eq!(config.output.footer, "# footer");
        assert_eq!(config.build_file_name, "BUILD.bazel");
        assert_eq!(config.tables.import_name_to_pip_name["yaml"], "pyyaml");
        assert_eq!(config.tables.local_import_name_to_dep["mypkg"], "//mypkg");

        let rule = &config.rules[0];
        assert_eq!(rule.identifier(), "py_doctest");
        assert!(rule.is_test_rule());
        assert!(rule.template().contains("size = \"{size}\""));
        assert!(rule.applies_to("test_doctest_x", "import doctest\n"));
        assert!(!rule.applies_to("other", "import doctest\n"));

        let inferred = config.import_rules[0].holds(Path::new("/"), "google.protobuf", None);
        assert_eq!(inferred.packages, Some(vec!["protobuf".to_string()]));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = assert_err(parse("headr = \"x\"\n"));
        assert!(err.to_string().contains("invalid extension config"));
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        assert_err(parse("header = 3\n"));
        assert_err(parse("[[rules]]\nidentifier = \"x\"\nlanguage = \"cobol\"\ncontains = [\"a\"]\n"));
    }

    #[test]
    fn test_rule_without_predicate_is_rejected() {
        let err = assert_err(parse("[[rules]]\nidentifier = \"py_app\"\n"));
        assert!(err.to_diagnostic().format(false).contains("needs at least one of"));
    }

    #[test]
    fn test_bad_regex_is_rejected() {
        assert_err(parse("[[rules]]\nidentifier = \"x\"\nmatches = [\"(\"]\n"));
        assert_err(parse("[[import_rules]]\nbase = \"[\"\npackages = []\n"));
    }

    #[test]
    fn test_template_needs_name_slot() {
        assert_err(parse(
            "[[rules]]\nidentifier = \"x\"\ncontains = [\"a\"]\ntemplate = \"x(srcs = [])\"\n",
        ));
    }

    #[test]
    fn test_import_rule_patterns_match_whole_names() {
        let config = parse(
            "[[import_rules]]\nbase = 'foo|foo\\.bar'\nmodules = [\"//vendor:{base}\"]\n",
        )
        .unwrap();
        let rule = &config.import_rules[0];

        assert!(rule.holds(Path::new("/"), "foo.bar", None).is_match());
        assert!(!rule.holds(Path::new("/"), "foo.barn", None).is_match());
        assert!(!rule.holds(Path::new("/"), "xfoo", None).is_match());
    }

    #[test]
    fn test_import_rule_needs_output() {
        assert_err(parse("[[import_rules]]\nbase = \"foo\"\n"));
    }
}
