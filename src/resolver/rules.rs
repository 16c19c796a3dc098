//! User-defined import inference rules.
//!
//! A rule maps an import that the built-in inference gets wrong to explicit
//! packages and/or modules. The first rule that holds wins.

use std::fmt;
use std::path::Path;

use regex::Regex;

/// Outcome of a rule that holds for an import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inferred {
    /// Packages the import depends on, if the rule says so
    pub packages: Option<Vec<String>>,
    /// Modules the import depends on, if the rule says so
    pub modules: Option<Vec<String>>,
}

impl Inferred {
    /// A rule matched when it produced either list.
    pub fn is_match(&self) -> bool {
        self.packages.is_some() || self.modules.is_some()
    }
}

/// A custom import inference rule.
pub trait ImportInferenceRule: fmt::Debug {
    /// Evaluate the rule for `base` and the optional imported `member`.
    fn holds(&self, project_root: &Path, base: &str, member: Option<&str>) -> Inferred;
}

/// Rule driven by regular expressions over the import, with templated outputs.
///
/// Outputs may use `{base}`, `{member}` and `{top}` (first segment of base).
#[derive(Debug, Clone)]
pub struct PatternImportRule {
    base: Regex,
    member: Option<Regex>,
    packages: Option<Vec<String>>,
    modules: Option<Vec<String>>,
}

impl PatternImportRule {
    /// Create a rule from patterns built with [`full_match_regex`].
    pub fn new(
        base: Regex,
        member: Option<Regex>,
        packages: Option<Vec<String>>,
        modules: Option<Vec<String>>,
    ) -> Self {
        PatternImportRule {
            base,
            member,
            packages,
            modules,
        }
    }

    fn matches(&self, base: &str, member: Option<&str>) -> bool {
        if !self.base.is_match(base) {
            return false;
        }
        match (&self.member, member) {
            (None, _) => true,
            (Some(re), Some(member)) => re.is_match(member),
            (Some(_), None) => false,
        }
    }

    fn expand(templates: &[String], base: &str, member: Option<&str>) -> Vec<String> {
        let top = base.split('.').next().unwrap_or(base);
        templates
            .iter()
            .map(|t| {
                t.replace("{base}", base)
                    .replace("{member}", member.unwrap_or(""))
                    .replace("{top}", top)
            })
            .collect()
    }
}

impl ImportInferenceRule for PatternImportRule {
    fn holds(&self, _project_root: &Path, base: &str, member: Option<&str>) -> Inferred {
        if !self.matches(base, member) {
            return Inferred::default();
        }

        Inferred {
            packages: self
                .packages
                .as_ref()
                .map(|p| Self::expand(p, base, member)),
            modules: self
                .modules
                .as_ref()
                .map(|m| Self::expand(m, base, member)),
        }
    }
}

/// Compile `pattern` so that it only matches a whole name.
pub fn full_match_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}
