//! BUILD file assembly.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::manifest::IgnoredDeclaration;
use crate::core::rule::RuleLoad;

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid newline regex"));

/// Default statement loading the pip `requirement` macro.
pub const DEFAULT_REQUIREMENT_LOAD: &str = r#"load("@my_deps//:requirements.bzl", "requirement")"#;

/// User text placed around generated content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputExtension {
    pub header: String,
    pub footer: String,
}

/// Everything that goes into one BUILD file.
#[derive(Debug, Clone, Copy)]
pub struct ManifestParts<'a> {
    /// Rendered declarations, in file order
    pub rules: &'a [String],
    /// Load statements of the rule kinds used by `rules`
    pub loads: &'a [RuleLoad],
    /// Hand-maintained declarations from the existing file
    pub ignored: &'a [IgnoredDeclaration],
    pub extension: &'a OutputExtension,
    /// Statement loading the `requirement` macro
    pub requirement_load: &'a str,
}

fn push_block(out: &mut String, block: &str) {
    out.push_str(block);
    if !block.ends_with('\n') {
        out.push('\n');
    }
}

/// Assemble the final BUILD file text.
pub fn render_manifest(parts: &ManifestParts<'_>) -> String {
    let body = parts.rules.join("\n\n");
    let (ignored_loads, ignored_other): (Vec<&IgnoredDeclaration>, Vec<&IgnoredDeclaration>) =
        parts.ignored.iter().partition(|decl| decl.is_load());

    let mut header = String::new();
    if !parts.extension.header.is_empty() {
        push_block(&mut header, &parts.extension.header);
    }

    let requirement_loaded = ignored_loads
        .iter()
        .any(|decl| decl.text.contains("requirement"));
    if body.contains("requirement(\"") && !requirement_loaded {
        push_block(&mut header, parts.requirement_load);
    }

    let statements: BTreeSet<&str> = parts
        .loads
        .iter()
        .filter(|load| {
            !ignored_loads
                .iter()
                .any(|decl| decl.text.contains(load.symbol.as_str()))
        })
        .map(|load| load.statement.as_str())
        .collect();
    for statement in statements {
        push_block(&mut header, statement);
    }

    for decl in &ignored_loads {
        push_block(&mut header, &decl.text);
    }

    let mut output = header;
    if !output.is_empty() {
        output.push('\n');
    }
    output.push_str(&body);

    if !ignored_other.is_empty() {
        let kept: Vec<&str> = ignored_other.iter().map(|decl| decl.text.as_str()).collect();
        let trimmed = output.trim_end().len();
        output.truncate(trimmed);
        if !output.is_empty() {
            output.push_str("\n\n");
        }
        output.push_str(&kept.join("\n\n"));
    }

    if !parts.extension.footer.is_empty() {
        output.push_str("\n\n");
        push_block(&mut output, &parts.extension.footer);
    }

    let mut output = BLANK_RUN_RE.replace_all(&output, "\n\n").into_owned();
    if !output.ends_with('\n') {
        output.push('\n');
    }
    output
}
