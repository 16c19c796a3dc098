//! `bazelify generate` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::GenerateArgs;
use bazelify::ops::generate::{generate, GenerateOptions};
use bazelify::resolver::PythonProbe;
use bazelify::util::config::{Config, CONFIG_FILE_NAME};
use bazelify::util::diagnostic::{self, Diagnostic};

pub fn execute(args: GenerateArgs, color: bool) -> Result<()> {
    // Config errors surface before any source file is read
    let (config_path, explicit) = match args.config {
        Some(path) => (path, true),
        None => (PathBuf::from(CONFIG_FILE_NAME), false),
    };
    let config = Config::load(&config_path, explicit)?;

    let probe = if args.pre_installed {
        PythonProbe::detect()
    } else {
        PythonProbe::with_interpreter(None)
    };
    if args.pre_installed && !probe.is_available() {
        let warning = Diagnostic::warning("no Python interpreter found")
            .with_context("only standard library imports count as installed")
            .with_suggestion("set PYTHON or put `python3` on PATH");
        diagnostic::emit(&warning, color);
    }

    let opts = GenerateOptions {
        input: args.input.clone(),
        project_root: args.project_root,
        pre_installed: args.pre_installed,
        dry_run: args.dry_run,
    };

    let summary = generate(&opts, &config, &probe)?;

    if args.dry_run {
        for manifest in &summary.manifests {
            println!("# {}", manifest.path.display());
            print!("{}", manifest.contents);
            println!();
        }
        return Ok(());
    }

    tracing::debug!(
        "{} rule(s) in {} BUILD file(s)",
        summary.rule_count(),
        summary.manifests.len()
    );
    println!("Generated BUILD files for {}.", args.input.display());

    Ok(())
}
