//! Rule rendering.
//!
//! Fills a rule template with the file name, dependencies and the extras
//! preserved from an existing declaration.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::import::{split_repository, ClassifiedImports};
use crate::core::manifest::Extras;

static SLOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(name|data|deps|size)\}").expect("valid slot regex"));

const INDENT: &str = "    ";

/// Test size used when no existing declaration sets one.
pub const DEFAULT_TEST_SIZE: &str = "small";

/// Tables mapping top-level import names to dependency names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTables {
    /// External import name to pip distribution name (`yaml` -> `pyyaml`)
    pub import_name_to_pip_name: BTreeMap<String, String>,
    /// Local import name to Bazel label (`mypkg` -> `//mypkg`)
    pub local_import_name_to_dep: BTreeMap<String, String>,
}

/// Translate a dotted module name into a Bazel label.
///
/// `abc` -> `:abc`, `abc.def.xyz` -> `//abc/def:xyz`, `abc.abc` -> `//abc`,
/// `@ext.abc.def` -> `@ext//abc:def`.
pub fn module_label(dotted: &str) -> String {
    let (repo, local) = split_repository(dotted);
    let repo = repo.unwrap_or_default();
    if local.is_empty() {
        return repo.to_string();
    }

    let segments: Vec<&str> = local.split('.').collect();
    let Some((last, dirs)) = segments.split_last() else {
        return repo.to_string();
    };

    if dirs.is_empty() {
        return if repo.is_empty() {
            format!(":{}", last)
        } else {
            format!("{}//:{}", repo, last)
        };
    }

    let package = dirs.join("/");
    if dirs.last() == Some(last) {
        format!("{}//{}", repo, package)
    } else {
        format!("{}//{}:{}", repo, package, last)
    }
}

/// Order modules so that each level's direct members precede anything nested deeper.
pub fn compare_modules(a: &str, b: &str) -> Ordering {
    let a: Vec<&str> = a.split('.').collect();
    let b: Vec<&str> = b.split('.').collect();

    for (i, (sa, sb)) in a.iter().zip(&b).enumerate() {
        let leaf_a = i + 1 == a.len();
        let leaf_b = i + 1 == b.len();
        if leaf_a != leaf_b {
            return if leaf_a {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        match sa.cmp(sb) {
            Ordering::Equal if leaf_a => return Ordering::Equal,
            Ordering::Equal => {}
            other => return other,
        }
    }

    a.len().cmp(&b.len())
}

/// Sort module names in directory-aware order.
pub fn sort_module_names<S: AsRef<str>>(modules: &mut [S]) {
    modules.sort_by(|a, b| compare_modules(a.as_ref(), b.as_ref()));
}

/// Dependency entries in rendering order: modules, local packages, external packages.
pub fn dependency_entries(classified: &ClassifiedImports, tables: &NameTables) -> Vec<String> {
    let mut modules: Vec<&str> = classified.modules.iter().map(String::as_str).collect();
    sort_module_names(&mut modules);

    let mut entries: Vec<String> = modules
        .into_iter()
        .map(|m| format!("\"{}\"", module_label(m)))
        .collect();

    // A submodule of a package still depends on the whole package.
    let packages: BTreeSet<&str> = classified
        .packages
        .iter()
        .map(|p| p.split('.').next().unwrap_or(p))
        .collect();

    let (local, external): (Vec<&str>, Vec<&str>) = packages
        .into_iter()
        .partition(|p| tables.local_import_name_to_dep.contains_key(*p));

    entries.extend(local.into_iter().filter_map(|p| {
        tables
            .local_import_name_to_dep
            .get(p)
            .map(|label| format!("\"{}\"", label))
    }));
    entries.extend(external.into_iter().map(|p| {
        let pip = tables
            .import_name_to_pip_name
            .get(p)
            .map(String::as_str)
            .unwrap_or(p);
        format!("requirement(\"{}\")", pip)
    }));

    entries
}

/// The `deps = ...` attribute, or an empty string without dependencies.
pub fn render_deps(classified: &ClassifiedImports, tables: &NameTables) -> String {
    let entries = dependency_entries(classified, tables);
    match entries.as_slice() {
        [] => String::new(),
        [only] => format!("deps = [{}],", only),
        _ => {
            let mut deps = String::from("deps = [\n");
            for entry in &entries {
                deps.push_str(INDENT);
                deps.push_str(INDENT);
                deps.push_str(entry);
                deps.push_str(",\n");
            }
            deps.push_str(INDENT);
            deps.push_str("],");
            deps
        }
    }
}

/// Fill a rule template for the target `name`.
///
/// Template lines whose slots filled to nothing are dropped.
pub fn generate_rule(
    name: &str,
    template: &str,
    classified: &ClassifiedImports,
    extras: &Extras,
    tables: &NameTables,
) -> String {
    let deps = render_deps(classified, tables);
    let data = extras
        .data
        .as_ref()
        .map(|d| format!("{},", d))
        .unwrap_or_default();
    let size = extras.test_size.as_deref().unwrap_or(DEFAULT_TEST_SIZE);

    let mut lines = Vec::new();
    for line in template.lines() {
        if !SLOT_RE.is_match(line) {
            lines.push(line.to_string());
            continue;
        }

        let filled = SLOT_RE.replace_all(line, |caps: &Captures<'_>| match &caps[1] {
            "name" => name.to_string(),
            "data" => data.clone(),
            "deps" => deps.clone(),
            _ => size.to_string(),
        });
        if !filled.trim().is_empty() {
            lines.push(filled.into_owned());
        }
    }

    lines.join("\n")
}
