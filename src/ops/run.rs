//! Implementation of `chaos run`.
//!
//! Generates the workspace into a temporary directory and hands one server
//! target to the build executor.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::core::language::Language;
use crate::core::manifest::Manifest;
use crate::core::naming::server_target_name;
use crate::ops::generate::{generate_manifest, GenerateOptions};
use crate::util::config::Config;
use crate::util::diagnostic::suggestions;
use crate::util::process::{find_executable, ProcessBuilder};

/// Options for running a generated server.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Server target name (`python3_10_server`) or language (`python3.10`)
    pub target: String,

    /// Effective configuration, CLI overrides applied
    pub config: Config,
}

/// Server targets a manifest produces, in build order.
pub fn available_targets(manifest: &Manifest) -> Vec<String> {
    manifest
        .languages()
        .into_iter()
        .map(server_target_name)
        .collect()
}

/// Resolve a `--target` value to the language whose server it names.
pub fn resolve_target(manifest: &Manifest, target: &str) -> Result<Language> {
    if manifest.is_empty() {
        bail!("manifest has no groups, so there is no server to run");
    }

    let found = manifest
        .languages()
        .into_iter()
        .find(|language| server_target_name(*language) == target || language.canonical() == target);

    match found {
        Some(language) => Ok(language),
        None => bail!(
            "unknown target `{}`; available targets: {}",
            target,
            available_targets(manifest).join(", ")
        ),
    }
}

/// Generate into a temporary directory and run one server target.
pub fn run(manifest_path: &Path, opts: &RunOptions) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let language = resolve_target(&manifest, &opts.target)?;

    let program = opts.config.executor_program();
    let executor = match find_executable(program) {
        Some(path) => path,
        None => bail!("`{}` not found in PATH\n\n{}", program, suggestions::NO_EXECUTOR),
    };

    let workdir = tempfile::Builder::new()
        .prefix("chaos-")
        .tempdir()
        .context("failed to create a temporary workspace")?;

    let generate_opts = GenerateOptions {
        output_dir: workdir.path().to_path_buf(),
        force: false,
        config: opts.config.clone(),
    };
    generate_manifest(&manifest, &generate_opts)?;

    let label = format!("//:{}", server_target_name(language));
    let cmd = ProcessBuilder::new(executor)
        .arg("run")
        .args(&opts.config.executor.args)
        .arg(&label)
        .cwd(workdir.path());

    tracing::info!("Running {} ({})", label, language.display_name());
    tracing::debug!("$ {}", cmd.display_command());

    let status = cmd.status()?;
    if !status.success() {
        bail!("`{}` exited with {}", cmd.display_command(), status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::Group;

    fn manifest() -> Manifest {
        Manifest::new(
            vec![
                Group::new("a", Language::Python3_10, "a.py", "requirements.txt"),
                Group::new("b", Language::Go1_19, "b/main.go", "b/go.mod"),
            ],
            "/project",
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_by_server_target() {
        let language = resolve_target(&manifest(), "python3_10_server").unwrap();
        assert_eq!(language, Language::Python3_10);
    }

    #[test]
    fn test_resolve_by_language() {
        let language = resolve_target(&manifest(), "go1.19.3").unwrap();
        assert_eq!(language, Language::Go1_19);
    }

    #[test]
    fn test_unknown_target_lists_available() {
        let err = resolve_target(&manifest(), "python3_11_server").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown target `python3_11_server`; available targets: go1_19_3_server, python3_10_server"
        );
    }

    #[test]
    fn test_empty_manifest_has_no_targets() {
        let empty = Manifest::new(vec![], "/project").unwrap();
        assert!(available_targets(&empty).is_empty());
        assert!(resolve_target(&empty, "python3_10_server").is_err());
    }

    #[test]
    fn test_missing_executor() {
        let tmp = tempfile::TempDir::new().unwrap();
        let manifest_path = tmp.path().join("manifest.yaml");
        std::fs::write(
            &manifest_path,
            "groups:\n  - name: a\n    language: python3.10\n    filename: a.py\n    dependencies: requirements.txt\n    endpoints: []\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.executor.program = Some("chaos-no-such-bazelisk-xyz".to_string());
        let opts = RunOptions {
            target: "python3_10_server".to_string(),
            config,
        };

        let err = run(&manifest_path, &opts).unwrap_err();
        assert!(err.to_string().contains("not found in PATH"));
    }
}
