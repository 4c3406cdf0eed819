//! chaos CLI - Bazel build graphs from endpoint manifests

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chaos::buildgen::GenerateError;
use chaos::core::ManifestError;
use chaos::deps::DepsError;
use chaos::util::diagnostic::{self, Diagnostic};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.use_stderr() => {
            // Usage errors exit with 1 like every other failure.
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    };

    let color = !cli.no_color && std::io::stderr().is_terminal();
    if let Err(e) = run(cli) {
        match typed_diagnostic(&e) {
            Some(diag) => diagnostic::emit(&diag, color),
            None => eprintln!("error: {:#}", e),
        }
        std::process::exit(1);
    }
}

/// Render domain errors anywhere in the chain as diagnostics.
fn typed_diagnostic(e: &anyhow::Error) -> Option<Diagnostic> {
    let diag = e.chain().find_map(|err| {
        if let Some(err) = err.downcast_ref::<ManifestError>() {
            Some(err.to_diagnostic())
        } else if let Some(err) = err.downcast_ref::<GenerateError>() {
            Some(err.to_diagnostic())
        } else {
            err.downcast_ref::<DepsError>().map(DepsError::to_diagnostic)
        }
    })?;

    // Keep the outermost context, e.g. which manifest was being generated.
    let outer = e.to_string();
    if outer != diag.message {
        Some(diag.with_context(outer))
    } else {
        Some(diag)
    }
}

fn run(cli: Cli) -> Result<()> {
    let filter = if cli.verbose {
        EnvFilter::new("chaos=debug")
    } else {
        EnvFilter::new("chaos=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli.command {
        Commands::Generate(args) => commands::generate::execute(args),
        Commands::Run(args) => commands::run::execute(args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
