//! Implementation of `chaos generate`.
//!
//! The build graph is assembled fully in memory before anything is written,
//! so a failed run leaves the output directory untouched.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::buildgen::{GenContext, GeneratorRegistry, ServerSettings};
use crate::core::manifest::Manifest;
use crate::deps::DependencyCache;
use crate::ops::assemble::{assemble, BuildGraph, ServerSource};
use crate::util::config::Config;
use crate::util::diagnostic::suggestions;
use crate::util::fs::{copy_file, is_empty_dir, write_string};

/// Options for generating an output tree.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directory the Bazel workspace is written to
    pub output_dir: PathBuf,

    /// Write into a non-empty output directory
    pub force: bool,

    /// Effective configuration, CLI overrides applied
    pub config: Config,
}

/// Summary of a generation run.
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub output_dir: PathBuf,
    /// Written files, relative to the output directory
    pub files: Vec<PathBuf>,
    pub servers: Vec<ServerSource>,
}

/// Build a generation context from configuration.
pub fn context_for(manifest: &Manifest, config: &Config) -> GenContext {
    let reader = config.module_reader().reader(config.go_program());
    let server = ServerSettings {
        host: config.host().to_string(),
        port: config.port(),
        requirements: config.server_requirements().to_string(),
    };
    GenContext::new(manifest.root(), DependencyCache::new(reader), server)
}

/// Assemble the build graph of a manifest with a fresh cache.
pub fn build_graph(manifest: &Manifest, config: &Config) -> Result<BuildGraph> {
    check_sources(manifest)?;
    let mut cx = context_for(manifest, config);
    let graph = assemble(manifest, &GeneratorRegistry::new(), &mut cx)?;
    Ok(graph)
}

/// Load a manifest and write its Bazel workspace to the output directory.
pub fn generate(manifest_path: &Path, opts: &GenerateOptions) -> Result<GenerateResult> {
    let manifest = Manifest::load(manifest_path)?;
    generate_manifest(&manifest, opts)
}

/// Write the Bazel workspace of an already loaded manifest.
pub fn generate_manifest(manifest: &Manifest, opts: &GenerateOptions) -> Result<GenerateResult> {
    let output_dir = &opts.output_dir;
    if !is_empty_dir(output_dir)? {
        if !opts.force {
            bail!(
                "output directory `{}` is not empty\n\n{}",
                output_dir.display(),
                suggestions::OUTPUT_NOT_EMPTY
            );
        }
        tracing::warn!("Overwriting generated files in {}", output_dir.display());
    }

    let graph = build_graph(manifest, &opts.config)
        .with_context(|| format!("failed to generate build graph for {}", manifest.root().display()))?;

    let mut files = Vec::new();
    let mut write = |relative: PathBuf, contents: &str| -> Result<()> {
        write_string(&output_dir.join(&relative), contents)?;
        tracing::debug!("wrote {}", relative.display());
        files.push(relative);
        Ok(())
    };

    write(PathBuf::from("WORKSPACE"), &graph.workspace)?;
    write(PathBuf::from("BUILD"), &graph.build)?;
    for server in &graph.servers {
        write(PathBuf::from(&server.filename), &server.contents)?;
    }
    for (directory, contents) in &graph.exports {
        write(directory.join("BUILD"), contents)?;
    }

    for relative in &graph.files {
        let src = manifest.root().join(relative);
        copy_file(&src, &output_dir.join(relative))?;
        files.push(PathBuf::from(relative));
    }

    tracing::info!("Wrote {} files to {}", files.len(), output_dir.display());

    Ok(GenerateResult {
        output_dir: output_dir.clone(),
        files,
        servers: graph.servers,
    })
}

/// Every group's source file must exist before anything is generated.
fn check_sources(manifest: &Manifest) -> Result<()> {
    for group in manifest.groups() {
        let path = manifest.root().join(&group.filename);
        if !path.is_file() {
            bail!(
                "source file `{}` of group `{}` not found",
                group.filename,
                group.name
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
groups:
  - name: hello
    language: python3.10
    filename: fixtures/hello_world.py
    dependencies: fixtures/requirements.txt
    endpoints:
      - name: hello_world
"#;

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir(root.join("fixtures")).unwrap();
        std::fs::write(root.join("manifest.yaml"), MANIFEST).unwrap();
        std::fs::write(root.join("requirements.txt"), "fastapi==0.88.0\n").unwrap();
        std::fs::write(root.join("fixtures/requirements.txt"), "requests==2.28.1\n").unwrap();
        std::fs::write(
            root.join("fixtures/hello_world.py"),
            "import fastapi\n\nrouter = fastapi.APIRouter()\n",
        )
        .unwrap();
        tmp
    }

    fn options(output_dir: &Path) -> GenerateOptions {
        GenerateOptions {
            output_dir: output_dir.to_path_buf(),
            force: false,
            config: Config::default(),
        }
    }

    #[test]
    fn test_generate_writes_tree() {
        let project = project();
        let out = TempDir::new().unwrap();

        let result = generate(&project.path().join("manifest.yaml"), &options(out.path())).unwrap();

        for file in [
            "WORKSPACE",
            "BUILD",
            "python3_10_server.py",
            "fixtures/BUILD",
            "fixtures/hello_world.py",
            "fixtures/requirements.txt",
            "requirements.txt",
        ] {
            assert!(out.path().join(file).is_file(), "{file} missing");
        }
        assert_eq!(result.files.len(), 7);
        assert_eq!(
            std::fs::read_to_string(out.path().join("fixtures/BUILD")).unwrap(),
            "exports_files([\"hello_world.py\",\"requirements.txt\"])\n"
        );
    }

    #[test]
    fn test_refuses_non_empty_output() {
        let project = project();
        let out = TempDir::new().unwrap();
        std::fs::write(out.path().join("WORKSPACE"), "# old\n").unwrap();

        let err = generate(&project.path().join("manifest.yaml"), &options(out.path())).unwrap_err();
        assert!(err.to_string().contains("is not empty"));
        assert_eq!(
            std::fs::read_to_string(out.path().join("WORKSPACE")).unwrap(),
            "# old\n"
        );
    }

    #[test]
    fn test_force_overwrites() {
        let project = project();
        let out = TempDir::new().unwrap();
        std::fs::write(out.path().join("WORKSPACE"), "# old\n").unwrap();

        let mut opts = options(out.path());
        opts.force = true;
        generate(&project.path().join("manifest.yaml"), &opts).unwrap();

        let workspace = std::fs::read_to_string(out.path().join("WORKSPACE")).unwrap();
        assert!(workspace.contains("rules_python"));
    }

    #[test]
    fn test_missing_source_file_writes_nothing() {
        let project = project();
        std::fs::remove_file(project.path().join("fixtures/hello_world.py")).unwrap();
        let out = TempDir::new().unwrap();

        let err = generate(&project.path().join("manifest.yaml"), &options(out.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("source file `fixtures/hello_world.py`"));
        assert!(is_empty_dir(out.path()).unwrap());
    }

    #[test]
    fn test_missing_server_requirements() {
        let project = project();
        std::fs::remove_file(project.path().join("requirements.txt")).unwrap();
        let out = TempDir::new().unwrap();

        let err = generate(&project.path().join("manifest.yaml"), &options(out.path())).unwrap_err();
        assert!(format!("{:#}", err).contains("dependency file not found"));
    }

    #[test]
    fn test_absolute_server_requirements_rejected() {
        let project = project();
        let reqs = project.path().join("requirements.txt");
        let out = TempDir::new().unwrap();
        let mut opts = options(out.path());
        opts.config.server.requirements = Some(reqs.display().to_string());

        let err = generate(&project.path().join("manifest.yaml"), &opts).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid server requirements path"));
        assert_eq!(std::fs::read_to_string(&reqs).unwrap(), "fastapi==0.88.0\n");
        assert!(is_empty_dir(out.path()).unwrap());
    }

    #[test]
    fn test_escaping_server_requirements_rejected() {
        let project = project();
        let out = TempDir::new().unwrap();
        let mut opts = options(out.path());
        opts.config.server.requirements = Some("../requirements.txt".to_string());

        let err = generate(&project.path().join("manifest.yaml"), &opts).unwrap_err();
        assert!(format!("{:#}", err).contains("path escapes the project root"));
    }

    #[test]
    fn test_nested_server_requirements_exported() {
        let project = project();
        std::fs::create_dir(project.path().join("deps")).unwrap();
        std::fs::write(project.path().join("deps/server.txt"), "fastapi==0.88.0\n").unwrap();
        let out = TempDir::new().unwrap();
        let mut opts = options(out.path());
        opts.config.server.requirements = Some("deps/server.txt".to_string());

        generate(&project.path().join("manifest.yaml"), &opts).unwrap();
        assert!(out.path().join("deps/server.txt").is_file());
        assert_eq!(
            std::fs::read_to_string(out.path().join("deps/BUILD")).unwrap(),
            "exports_files([\"server.txt\"])\n"
        );
        let workspace = std::fs::read_to_string(out.path().join("WORKSPACE")).unwrap();
        assert!(workspace.contains("requirements_lock = \"//deps:server.txt\""));
    }

    #[test]
    fn test_configured_port() {
        let project = project();
        let out = TempDir::new().unwrap();
        let mut opts = options(out.path());
        opts.config.server.port = Some(9000);

        generate(&project.path().join("manifest.yaml"), &opts).unwrap();
        let server = std::fs::read_to_string(out.path().join("python3_10_server.py")).unwrap();
        assert!(server.contains("port=9000"));
    }

    #[test]
    fn test_empty_manifest_writes_empty_documents() {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join("manifest.yaml"), "groups: []\n").unwrap();
        let out = TempDir::new().unwrap();

        let result = generate(&project.path().join("manifest.yaml"), &options(out.path())).unwrap();
        assert_eq!(result.files, vec![PathBuf::from("WORKSPACE"), PathBuf::from("BUILD")]);
        assert_eq!(std::fs::read_to_string(out.path().join("WORKSPACE")).unwrap(), "");
    }
}
