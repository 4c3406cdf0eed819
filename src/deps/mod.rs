//! Dependency descriptor parsing.
//!
//! Each ecosystem keeps its dependencies in its own file format:
//! `requirements.txt` for Python, `go.mod` plus a sibling `go.sum` for Go.
//! Parsed results are memoized per absolute path in a [`DependencyCache`]
//! owned by one generation run.

pub mod go_mod;
pub mod go_sum;
pub mod requirements;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

pub use go_mod::{GoCommand, GoMod, GoRequire, ModuleReader, ModuleReaderKind, NativeModReader};

/// One dependency as read from a dependency file.
///
/// `version` and `integrity` are empty when the format does not carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEntry {
    /// Package name or module path
    pub coordinate: String,
    pub version: String,
    /// Checksum as written in the file
    pub integrity: String,
}

impl DependencyEntry {
    pub fn new(
        coordinate: impl Into<String>,
        version: impl Into<String>,
        integrity: impl Into<String>,
    ) -> Self {
        DependencyEntry {
            coordinate: coordinate.into(),
            version: version.into(),
            integrity: integrity.into(),
        }
    }
}

/// Errors from reading dependency files.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum DepsError {
    #[error("dependency file not found: {}", path.display())]
    #[diagnostic(code(chaos::deps::missing_file))]
    MissingDependencyFile { path: PathBuf },

    #[error("failed to read {}", path.display())]
    #[diagnostic(code(chaos::deps::read))]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    #[diagnostic(code(chaos::deps::malformed_line))]
    MalformedLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("malformed version `{version}`: {reason}")]
    #[diagnostic(
        code(chaos::deps::malformed_version),
        help("expected `vX.Y.Z` or a pseudo-version like `v0.0.0-20191204190536-9bdfabe68543`")
    )]
    MalformedVersion { version: String, reason: String },

    #[error("failed to read module {}: {message}", path.display())]
    #[diagnostic(code(chaos::deps::toolchain))]
    ToolchainInvocation { path: PathBuf, message: String },
}

impl DepsError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            DepsError::MissingDependencyFile { .. } => {
                diag.with_suggestion(suggestions::MISSING_DEPENDENCY_FILE)
            }
            DepsError::ToolchainInvocation { .. } => diag.with_suggestion(suggestions::GO_TOOLCHAIN),
            _ => diag,
        }
    }
}

/// Per-run memo of parsed dependency files, keyed by canonical path.
///
/// There is no invalidation: a file is read at most once per cache.
pub struct DependencyCache {
    reader: Box<dyn ModuleReader>,
    requirements: HashMap<PathBuf, Vec<DependencyEntry>>,
    go_sums: HashMap<PathBuf, Vec<DependencyEntry>>,
    go_mods: HashMap<PathBuf, GoMod>,
}

impl DependencyCache {
    pub fn new(reader: Box<dyn ModuleReader>) -> Self {
        DependencyCache {
            reader,
            requirements: HashMap::new(),
            go_sums: HashMap::new(),
            go_mods: HashMap::new(),
        }
    }

    /// Entries of a `requirements.txt`, in file order.
    pub fn requirements(&mut self, path: &Path) -> Result<Vec<DependencyEntry>, DepsError> {
        let key = cache_key(path)?;
        if let Some(entries) = self.requirements.get(&key) {
            tracing::debug!("requirements cache hit: {}", key.display());
            return Ok(entries.clone());
        }

        tracing::debug!("requirements cache miss: {}", key.display());
        let content = read(&key)?;
        let entries = requirements::parse(&content, &key)?;
        self.requirements.insert(key, entries.clone());
        Ok(entries)
    }

    /// Raw `go.sum` entries, before version selection.
    pub fn go_sum(&mut self, path: &Path) -> Result<Vec<DependencyEntry>, DepsError> {
        let key = cache_key(path)?;
        if let Some(entries) = self.go_sums.get(&key) {
            tracing::debug!("go.sum cache hit: {}", key.display());
            return Ok(entries.clone());
        }

        tracing::debug!("go.sum cache miss: {}", key.display());
        let content = read(&key)?;
        let entries = go_sum::parse(&content, &key)?;
        self.go_sums.insert(key, entries.clone());
        Ok(entries)
    }

    /// Module path and requirements of a `go.mod`.
    pub fn go_mod(&mut self, path: &Path) -> Result<GoMod, DepsError> {
        let key = cache_key(path)?;
        if let Some(go_mod) = self.go_mods.get(&key) {
            tracing::debug!("go.mod cache hit: {}", key.display());
            return Ok(go_mod.clone());
        }

        tracing::debug!("go.mod cache miss: {}", key.display());
        let go_mod = self.reader.read(&key)?;
        self.go_mods.insert(key, go_mod.clone());
        Ok(go_mod)
    }
}

fn cache_key(path: &Path) -> Result<PathBuf, DepsError> {
    path.canonicalize().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DepsError::MissingDependencyFile {
            path: path.to_path_buf(),
        },
        _ => DepsError::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn read(path: &Path) -> Result<String, DepsError> {
    std::fs::read_to_string(path).map_err(|source| DepsError::Read {
        path: path.to_path_buf(),
        source,
    })
}
