//! Command implementations

pub mod completions;
pub mod generate;
pub mod run;

use chaos::util::config::{global_config_path, load_config, project_config_path, Config};

use crate::cli::ManifestArgs;

/// Merged config for the manifest's project with CLI overrides applied.
pub fn effective_config(args: &ManifestArgs) -> Config {
    let project_root = match args.manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };

    let global = global_config_path();
    let mut config = load_config(global.as_deref(), &project_config_path(&project_root));

    if let Some(port) = args.port {
        config.server.port = Some(port);
    }
    if let Some(reader) = args.go_reader {
        config.go.module_reader = Some(reader.to_string());
    }
    config
}
