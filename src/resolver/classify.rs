//! Import classification.
//!
//! Each raw import becomes nothing (already satisfied), one or more modules
//! inside the project, or a package to be mapped through the name tables.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::errors::BazelifyError;
use crate::core::import::{dotted_to_path, ClassifiedImports, Language, RawImport};
use crate::core::manifest::enclosed_expression;
use crate::resolver::probe::ImportProbe;
use crate::resolver::rules::ImportInferenceRule;
use crate::resolver::stdlib::is_stdlib;

static ALL_ASSIGN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^__all__\s*=\s*[\[(]").expect("valid __all__ regex"));

static QUOTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"\\]*)"|'([^'\\]*)'"#).expect("valid string regex"));

/// Everything classification needs besides the imports themselves.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Base directory for dotted local paths
    pub project_root: &'a Path,
    /// Whether third-party packages may already be installed in the target environment
    pub pre_installed: bool,
    /// Custom inference rules, in priority order
    pub rules: &'a [Box<dyn ImportInferenceRule>],
    /// Environment probe used in pre-installed mode
    pub probe: &'a dyn ImportProbe,
}

/// Classify every import of one source file.
///
/// Fails when an import of the project root package names nothing there.
/// The returned error carries no path.
pub fn classify_imports(
    imports: &[RawImport],
    language: Language,
    ctx: &ClassifyContext<'_>,
) -> Result<ClassifiedImports, BazelifyError> {
    let mut classified = ClassifiedImports::new();
    for import in imports {
        classify_one(import, language, ctx, &mut classified)?;
    }
    Ok(classified)
}

fn classify_one(
    import: &RawImport,
    language: Language,
    ctx: &ClassifyContext<'_>,
    out: &mut ClassifiedImports,
) -> Result<(), BazelifyError> {
    let base = import.base.as_str();
    let member = import.member_name();

    if language == Language::Python && is_satisfied(base, member, ctx) {
        tracing::debug!("skipping `{}`: provided by the environment", import);
        return Ok(());
    }

    for rule in ctx.rules {
        let inferred = rule.holds(ctx.project_root, base, member);
        if inferred.is_match() {
            tracing::debug!("`{}` resolved by {:?}", import, rule);
            out.packages.extend(inferred.packages.unwrap_or_default());
            out.modules.extend(inferred.modules.unwrap_or_default());
            return Ok(());
        }
    }

    if language == Language::Proto {
        out.modules.insert(join(base, member.unwrap_or_default()));
        return Ok(());
    }

    if !base.is_empty() && module_file(ctx.project_root, base).is_file() {
        out.modules.insert(base.to_string());
        return Ok(());
    }

    if let Some(member) = member {
        let dotted = join(base, member);

        let package_dir = dotted_to_path(ctx.project_root, &dotted);
        if package_dir.is_dir() && contains_module_file(&package_dir) {
            // A package `foo` is assumed to export a target also named `foo`.
            out.modules.insert(format!("{}.{}", dotted, member));
            return Ok(());
        }

        if module_file(ctx.project_root, &dotted).is_file() {
            out.modules.insert(dotted);
            return Ok(());
        }

        let base_dir = dotted_to_path(ctx.project_root, base);
        if base_dir.is_dir() && in_public_interface(&base_dir, member) {
            out.modules.insert(join(base, "__init__"));
            return Ok(());
        }
    }

    if base.is_empty() {
        // `from . import x` at the project root
        if ctx.project_root.join("__init__.py").is_file() {
            out.modules.insert("__init__".to_string());
            return Ok(());
        }
        return Err(BazelifyError::UnsupportedImport {
            path: Default::default(),
            statement: import.to_string(),
            reason: "the name is not a module of the project root and the root has no `__init__.py`"
                .to_string(),
        });
    }

    out.packages.insert(base.to_string());
    Ok(())
}

fn is_satisfied(base: &str, member: Option<&str>, ctx: &ClassifyContext<'_>) -> bool {
    if base.is_empty() {
        return false;
    }
    if ctx.pre_installed {
        ctx.probe.probe(base, member) || is_stdlib(base)
    } else {
        is_stdlib(base)
    }
}

fn join(base: &str, member: &str) -> String {
    if base.is_empty() {
        member.to_string()
    } else {
        format!("{}.{}", base, member)
    }
}

fn module_file(root: &Path, dotted: &str) -> std::path::PathBuf {
    dotted_to_path(root, dotted).with_extension("py")
}

/// Whether a directory directly contains a Python module (source or bytecode).
pub fn contains_module_file(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    entries.flatten().any(|entry| {
        let path = entry.path();
        path.is_file()
            && matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("py") | Some("pyc")
            )
    })
}

/// Whether `member` is listed in the `__all__` of the package's `__init__.py`.
pub fn in_public_interface(package_dir: &Path, member: &str) -> bool {
    let Ok(source) = fs::read_to_string(package_dir.join("__init__.py")) else {
        return false;
    };

    let Some(m) = ALL_ASSIGN_RE.find(&source) else {
        return false;
    };
    let open = if source[..m.end()].ends_with('[') { '[' } else { '(' };

    let Ok(list) = enclosed_expression(&source, m.start(), open) else {
        return false;
    };

    QUOTED_RE.captures_iter(list).any(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .is_some_and(|name| name.as_str() == member)
    })
}
