//! `chaos run` command

use anyhow::Result;

use chaos::ops::{run, RunOptions};

use crate::cli::RunArgs;
use crate::commands::effective_config;

pub fn execute(args: RunArgs) -> Result<()> {
    let opts = RunOptions {
        target: args.target,
        config: effective_config(&args.manifest),
    };

    run(&args.manifest.manifest, &opts)
}
