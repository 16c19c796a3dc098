//! Implementation of `bazelify generate`.

use std::path::{Component, Path, PathBuf};

use anyhow::Result;

use crate::builder::output::{render_manifest, ManifestParts};
use crate::builder::render::generate_rule;
use crate::core::errors::BazelifyError;
use crate::core::import::{Language, RawImport};
use crate::core::manifest::{find_ignored, is_ignored, locate, IgnoredDeclaration};
use crate::core::rule::{resolve_rule, RuleLoad};
use crate::parser::extract_imports;
use crate::resolver::classify::{classify_imports, ClassifyContext};
use crate::resolver::probe::ImportProbe;
use crate::util::config::{Config, DEFAULT_BUILD_FILE_NAME};
use crate::util::fs::{
    list_files, normalize_path, read_optional, read_to_string, relative_path, walk_dirs, write_string,
};

/// Name Bazel also accepts for a BUILD file.
pub const ALTERNATE_BUILD_FILE_NAME: &str = "BUILD.bazel";

/// Options for the generate command.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Source file or directory to generate BUILD files for
    pub input: PathBuf,

    /// Base directory of dotted imports
    pub project_root: PathBuf,

    /// Whether third-party packages may already be installed
    pub pre_installed: bool,

    /// Compute BUILD files without writing them
    pub dry_run: bool,
}

/// One BUILD file produced by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedManifest {
    pub path: PathBuf,
    pub contents: String,
    /// Number of declarations generated (ignored ones excluded)
    pub rules: usize,
}

/// Result of a generate run.
#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    pub manifests: Vec<GeneratedManifest>,
}

impl GenerateSummary {
    /// Total number of generated declarations.
    pub fn rule_count(&self) -> usize {
        self.manifests.iter().map(|m| m.rules).sum()
    }
}

/// Generate BUILD files for a source file or a directory tree.
///
/// The first fatal error aborts the run; BUILD files already written stay.
pub fn generate(
    opts: &GenerateOptions,
    config: &Config,
    probe: &dyn ImportProbe,
) -> Result<GenerateSummary> {
    let generator = Generator {
        opts,
        config,
        probe,
        project_root: normalize_path(&opts.project_root),
    };
    let mut summary = GenerateSummary::default();

    if opts.input.is_dir() {
        for dir in walk_dirs(&opts.input)? {
            let sources: Vec<PathBuf> = list_files(&dir)?
                .into_iter()
                .filter(|f| Language::from_path(f).is_some())
                .collect();
            if let Some(manifest) = generator.generate_dir(&dir, &sources)? {
                summary.manifests.push(manifest);
            }
        }
    } else if opts.input.is_file() && Language::from_path(&opts.input).is_some() {
        let dir = match opts.input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if let Some(manifest) = generator.generate_dir(&dir, std::slice::from_ref(&opts.input))? {
            summary.manifests.push(manifest);
        }
    } else {
        return Err(BazelifyError::InvalidInputPath {
            path: opts.input.clone(),
        }
        .into());
    }

    Ok(summary)
}

/// BUILD file path for a directory.
///
/// An existing `BUILD.bazel` is reused when the default `BUILD` is absent.
pub fn manifest_path(dir: &Path, build_file_name: &str) -> PathBuf {
    let primary = dir.join(build_file_name);
    if build_file_name == DEFAULT_BUILD_FILE_NAME && !primary.exists() {
        let alternate = dir.join(ALTERNATE_BUILD_FILE_NAME);
        if alternate.is_file() {
            return alternate;
        }
    }
    primary
}

struct Generator<'a> {
    opts: &'a GenerateOptions,
    config: &'a Config,
    probe: &'a dyn ImportProbe,
    project_root: PathBuf,
}

impl Generator<'_> {
    fn generate_dir(&self, dir: &Path, sources: &[PathBuf]) -> Result<Option<GeneratedManifest>> {
        let path = manifest_path(dir, &self.config.build_file_name);
        let existing = read_optional(&path)?.unwrap_or_default();
        let ignored = find_ignored(&existing).map_err(|e| e.at(&path))?;

        let mut rules = Vec::new();
        let mut loads = Vec::new();
        for source in sources {
            let filename = file_name(source);
            if is_ignored(filename, &ignored) {
                tracing::debug!("{} is hand-maintained, skipping", source.display());
                continue;
            }

            let (rule, rule_loads) = self.generate_file(source, &path, &existing)?;
            rules.push(rule);
            loads.extend(rule_loads);
        }

        if rules.is_empty() && ignored.is_empty() {
            return Ok(None);
        }

        let contents = self.assemble(&rules, &loads, &ignored);
        if self.opts.dry_run {
            tracing::debug!("dry run, not writing {}", path.display());
        } else {
            write_string(&path, &contents)?;
            tracing::info!(
                "wrote {} ({} rule(s))",
                relative_path(&self.project_root, &normalize_path(&path)).display(),
                rules.len()
            );
        }

        Ok(Some(GeneratedManifest {
            path,
            contents,
            rules: rules.len(),
        }))
    }

    fn assemble(&self, rules: &[String], loads: &[RuleLoad], ignored: &[IgnoredDeclaration]) -> String {
        render_manifest(&ManifestParts {
            rules,
            loads,
            ignored,
            extension: &self.config.output,
            requirement_load: &self.config.requirement_load,
        })
    }

    fn generate_file(
        &self,
        source_path: &Path,
        manifest_path: &Path,
        manifest: &str,
    ) -> Result<(String, Vec<RuleLoad>)> {
        let language = Language::from_path(source_path).ok_or_else(|| {
            BazelifyError::InvalidInputPath {
                path: source_path.to_path_buf(),
            }
        })?;
        let source = read_to_string(source_path)?;

        let imports = extract_imports(language, &source)
            .map_err(|e| e.at(source_path))?
            .into_iter()
            .map(|import| self.absolute_import(import, source_path))
            .collect::<Result<Vec<_>, _>>()?;

        let ctx = ClassifyContext {
            project_root: &self.project_root,
            pre_installed: self.opts.pre_installed,
            rules: &self.config.import_rules,
            probe: self.probe,
        };
        let classified =
            classify_imports(&imports, language, &ctx).map_err(|e| e.at(source_path))?;

        let rule = resolve_rule(source_path, &source, language, &self.config.rules)?;
        tracing::debug!(
            "{} -> {} with {} dependency name(s)",
            source_path.display(),
            rule.identifier(),
            classified.len()
        );

        let extras = locate(manifest, file_name(source_path), rule)
            .map_err(|e| e.at(manifest_path))?
            .map(|decl| decl.extras)
            .unwrap_or_default();

        let name = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let text = generate_rule(name, rule.template(), &classified, &extras, &self.config.tables);

        Ok((text, rule.loads()))
    }

    /// Rewrite a relative import against the project root.
    fn absolute_import(&self, import: RawImport, source_path: &Path) -> Result<RawImport, BazelifyError> {
        if !import.is_relative() {
            return Ok(import);
        }

        let unsupported = |reason: &str| BazelifyError::UnsupportedImport {
            path: source_path.to_path_buf(),
            statement: import.to_string(),
            reason: reason.to_string(),
        };

        let dir = normalize_path(source_path.parent().unwrap_or(Path::new(".")));
        let Ok(relative) = dir.strip_prefix(&self.project_root) else {
            return Err(unsupported("the file is outside the project root"));
        };

        let mut segments: Vec<String> = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_string_lossy().into_owned()),
                _ => return Err(unsupported("the file path cannot be expressed as a package")),
            }
        }

        let climb = import.level - 1;
        if climb > segments.len() {
            return Err(unsupported("the import climbs above the project root"));
        }
        segments.truncate(segments.len() - climb);
        if !import.base.is_empty() {
            segments.push(import.base.clone());
        }

        Ok(RawImport {
            base: segments.join("."),
            member: import.member.clone(),
            level: 0,
        })
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::assertions::assert_file_contains;
    use crate::test_support::{sources, ProjectFixture, StubProbe};

    fn options(project: &ProjectFixture, input: &str) -> GenerateOptions {
        GenerateOptions {
            input: project.path(input),
            project_root: project.root().to_path_buf(),
            pre_installed: false,
            dry_run: false,
        }
    }

    fn run(project: &ProjectFixture, input: &str, config: &Config) -> Result<GenerateSummary> {
        generate(&options(project, input), config, &StubProbe::default())
    }

    #[test]
    fn test_generate_directory_tree() {
        let project = ProjectFixture::new()
            .file("app/main.py", &sources::binary("import yaml\nfrom app import util"))
            .file("app/util.py", &sources::library("import os"))
            .file(
                "app/tests/test_util.py",
                &sources::unit_test("from app.util import Thing"),
            )
            .file("app/README.md", "docs\n");

        let summary = run(&project, "", &Config::default()).unwrap();

        assert_eq!(summary.manifests.len(), 2);
        assert_eq!(summary.rule_count(), 3);

        let expected = r#"load("@my_deps//:requirements.bzl", "requirement")

py_binary(
    name = "main",
    srcs = ["main.py"],
    deps = [
        "//app:util",
        requirement("yaml"),
    ],
)

py_library(
    name = "util",
    srcs = ["util.py"],
)
"#;
        assert_eq!(project.read("app/BUILD"), expected);

        assert_file_contains(project.path("app/tests/BUILD"), "py_test(\n    name = \"test_util\",");
        assert_file_contains(project.path("app/tests/BUILD"), "size = \"small\",");
        assert_file_contains(project.path("app/tests/BUILD"), "deps = [\"//app:util\"],");
        assert!(!project.path("BUILD").exists());
    }

    #[test]
    fn test_regeneration_preserves_extras_and_ignored() {
        let project = ProjectFixture::new()
            .file("pkg/test_io.py", &sources::unit_test("import numpy"))
            .file("pkg/legacy.py", "print(\"hi\")\n")
            .file(
                "pkg/BUILD",
                r#"py_test(
    name = "test_io",
    srcs = ["test_io.py"],
    size = "large",
    data = glob(["testdata/**"]),
    deps = [":stale"],
)

# bazelify-ignore
py_binary(
    name = "legacy",
    srcs = ["legacy.py"],
    main = "legacy.py",
)
"#,
            );

        run(&project, "pkg", &Config::default()).unwrap();
        let first = project.read("pkg/BUILD");

        assert!(first.contains("    size = \"large\",\n    data = glob([\"testdata/**\"]),\n"));
        assert!(first.contains("deps = [requirement(\"numpy\")],"));
        assert!(!first.contains(":stale"));
        assert!(first.contains("# bazelify-ignore\npy_binary(\n    name = \"legacy\","));
        assert_eq!(first.matches("name = \"legacy\"").count(), 1);

        run(&project, "pkg", &Config::default()).unwrap();
        assert_eq!(project.read("pkg/BUILD"), first);
    }

    #[test]
    fn test_single_file_mode() {
        let project = ProjectFixture::new().file("tools/run.py", &sources::binary(""));

        let summary = run(&project, "tools/run.py", &Config::default()).unwrap();

        assert_eq!(summary.rule_count(), 1);
        assert_eq!(
            project.read("tools/BUILD"),
            "py_binary(\n    name = \"run\",\n    srcs = [\"run.py\"],\n)\n"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let project = ProjectFixture::new().file("lib.py", &sources::library(""));
        let mut opts = options(&project, "");
        opts.dry_run = true;

        let summary = generate(&opts, &Config::default(), &StubProbe::default()).unwrap();

        assert_eq!(summary.manifests.len(), 1);
        assert!(summary.manifests[0].contents.starts_with("py_library("));
        assert!(!project.path("BUILD").exists());
    }

    #[test]
    fn test_invalid_input_path() {
        let project = ProjectFixture::new().file("notes.txt", "x");

        for input in ["missing", "notes.txt"] {
            let err = run(&project, input, &Config::default()).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<BazelifyError>(),
                Some(BazelifyError::InvalidInputPath { .. })
            ));
        }
    }

    #[test]
    fn test_wildcard_import_aborts_run() {
        let project = ProjectFixture::new()
            .file("a/good.py", &sources::library(""))
            .file("b/bad.py", "from os.path import *\n");

        let err = run(&project, "", &Config::default()).unwrap_err();

        match err.downcast_ref::<BazelifyError>() {
            Some(BazelifyError::UnsupportedImport { path, .. }) => {
                assert!(path.ends_with("b/bad.py"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(project.path("a/BUILD").exists());
        assert!(!project.path("b/BUILD").exists());
    }

    #[test]
    fn test_relative_imports() {
        let project = ProjectFixture::new()
            .file("pkg/sub/helper.py", "")
            .file("pkg/core.py", "")
            .file(
                "pkg/sub/mod.py",
                "from . import helper\nfrom ..core import Engine\n",
            )
            .file("top.py", "from .. import nothing\n");

        run(&project, "pkg", &Config::default()).unwrap();
        assert_file_contains(
            project.path("pkg/sub/BUILD"),
            "deps = [\n        \"//pkg:core\",\n        \"//pkg/sub:helper\",\n    ],",
        );

        let err = run(&project, "top.py", &Config::default()).unwrap_err();
        assert!(err.to_string().contains("unsupported import"));
    }

    #[test]
    fn test_existing_build_bazel_is_reused() {
        let project = ProjectFixture::new()
            .file("lib.py", &sources::library(""))
            .file("BUILD.bazel", "# old\n");

        run(&project, "", &Config::default()).unwrap();

        assert!(!project.path("BUILD").exists());
        assert!(project.read("BUILD.bazel").starts_with("py_library("));
    }

    #[test]
    fn test_config_header_and_tables() {
        let project = ProjectFixture::new().file("app.py", &sources::binary("import yaml\nimport mylib"));
        let config = Config::from_toml(
            "header = \"# Auto-generated\"\n[import_name_to_pip_name]\nyaml = \"pyyaml\"\n[local_import_name_to_dep]\nmylib = \"//third_party/mylib\"\n",
            Path::new(".bazelify.toml"),
        )
        .unwrap();

        run(&project, "", &config).unwrap();
        let build = project.read("BUILD");

        assert!(build.starts_with("# Auto-generated\nload(\"@my_deps//:requirements.bzl\", \"requirement\")\n\n"));
        assert!(build.contains("        \"//third_party/mylib\",\n        requirement(\"pyyaml\"),\n"));
    }

    #[test]
    fn test_malformed_existing_manifest() {
        let project = ProjectFixture::new()
            .file("lib.py", &sources::library(""))
            .file("BUILD", "py_library(\n    srcs = [\"lib.py\"],\n");

        let err = run(&project, "", &Config::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BazelifyError>(),
            Some(BazelifyError::MalformedManifest { .. })
        ));
    }

    #[test]
    fn test_proto_sources() {
        let project = ProjectFixture::new()
            .file("protos/common.proto", "syntax = \"proto3\";\n")
            .file(
                "protos/api.proto",
                "syntax = \"proto3\";\nimport \"protos/common.proto\";\n",
            );

        run(&project, "protos", &Config::default()).unwrap();
        let build = project.read("protos/BUILD");

        assert!(build.starts_with(
            "load(\"@com_github_grpc_grpc//bazel:python_rules.bzl\", \"py_proto_library\")\nload(\"@rules_proto//proto:defs.bzl\", \"proto_library\")\n\nproto_library(\n    name = \"api_proto\","
        ));
        assert!(build.contains("deps = [\"//protos:common_proto\"],"));
        assert_eq!(build.matches("py_proto_library(\n").count(), 2);
    }

    #[test]
    fn test_relative_import_of_project_root_package() {
        let project = ProjectFixture::new()
            .file("__init__.py", "VALUE = 1\n")
            .file("helper.py", "")
            .file("app.py", "from . import VALUE\nfrom . import helper\n");

        run(&project, "app.py", &Config::default()).unwrap();
        let build = project.read("BUILD");

        assert!(build.contains("deps = [\n        \":__init__\",\n        \":helper\",\n    ],"));
        assert!(!build.contains("requirement("));
    }

    #[test]
    fn test_relative_import_of_missing_root_name() {
        let project = ProjectFixture::new().file("app.py", "from . import VALUE\n");

        let err = run(&project, "app.py", &Config::default()).unwrap_err();

        match err.downcast_ref::<BazelifyError>() {
            Some(BazelifyError::UnsupportedImport { path, statement, .. }) => {
                assert!(path.ends_with("app.py"));
                assert_eq!(statement, "from . import VALUE");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!project.path("BUILD").exists());
    }
}
