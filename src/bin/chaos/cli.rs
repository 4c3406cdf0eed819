//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use chaos::deps::ModuleReaderKind;

/// chaos - generate a Bazel build graph and HTTP servers from a manifest
#[derive(Parser)]
#[command(name = "chaos")]
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
    /// Generate a Bazel workspace from a manifest
    Generate(GenerateArgs),

    /// Generate into a temporary directory and run one server
    Run(RunArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags shared by commands that generate a workspace.
#[derive(Args)]
pub struct ManifestArgs {
    /// Path to the manifest
    #[arg(long, env = "CHAOS_MANIFEST")]
    pub manifest: PathBuf,

    /// Listen port of generated servers
    #[arg(long)]
    pub port: Option<u16>,

    /// How go.mod files are read (command, native)
    #[arg(long)]
    pub go_reader: Option<ModuleReaderKind>,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Directory to write the workspace to
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Write into a non-empty output directory
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Server target (`python3_10_server`) or language (`python3.10`)
    #[arg(long)]
    pub target: String,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
