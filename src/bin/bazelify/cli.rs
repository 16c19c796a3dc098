//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// bazelify - Infer Bazel BUILD declarations for Python and Proto sources
#[derive(Parser)]
#[command(name = "bazelify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate BUILD files for a source file or directory
    Generate(GenerateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Source file or directory (defaults to the current directory)
    #[arg(default_value = ".")]
    pub input: PathBuf,

    /// Base directory of dotted imports
    #[arg(short = 'r', long, default_value = ".")]
    pub project_root: PathBuf,

    /// Treat installed third-party packages like the standard library
    #[arg(short = 'p', long = "pre-installed-packages")]
    pub pre_installed: bool,

    /// Extension config file (defaults to ./.bazelify.toml)
    #[arg(short, long, env = "BAZELIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print BUILD files instead of writing them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
