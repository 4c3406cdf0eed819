//! `chaos generate` command

use anyhow::Result;

use chaos::ops::{generate, GenerateOptions};

use crate::cli::GenerateArgs;
use crate::commands::effective_config;

pub fn execute(args: GenerateArgs) -> Result<()> {
    let opts = GenerateOptions {
        output_dir: args.output_dir,
        force: args.force,
        config: effective_config(&args.manifest),
    };

    let result = generate(&args.manifest.manifest, &opts)?;

    for server in &result.servers {
        println!(
            "{} server: {}",
            server.language.display_name(),
            result.output_dir.join(&server.filename).display()
        );
    }
    println!(
        "Generated {} files in {}",
        result.files.len(),
        result.output_dir.display()
    );

    Ok(())
}
