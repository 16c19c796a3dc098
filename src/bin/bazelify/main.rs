//! bazelify CLI - Infer Bazel BUILD declarations from source files

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bazelify::core::errors::BazelifyError;
use bazelify::util::diagnostic;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color && io::stderr().is_terminal();

    if let Err(e) = run(cli, color) {
        match e.downcast_ref::<BazelifyError>() {
            Some(err) => diagnostic::emit(&err.to_diagnostic(), color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, color: bool) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("bazelify=debug")
    } else {
        EnvFilter::new("bazelify=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args, color),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
