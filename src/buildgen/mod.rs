//! Per-ecosystem Bazel build generation.
//!
//! A [`BuildGenerator`] renders the Starlark documents for one ecosystem.
//! Generators are pure renderers: they read dependency files through the
//! [`GenContext`]'s cache and return strings, and never write files.
//! The [`GeneratorRegistry`] picks the generator for a language.

pub mod go;
pub mod python;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::language::{Ecosystem, Language};
use crate::core::manifest::{check_relative_path, Group};
use crate::deps::{DependencyCache, DepsError};
use crate::util::config::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_SERVER_REQUIREMENTS};
use crate::util::diagnostic::Diagnostic;

pub use go::GoGenerator;
pub use python::PythonGenerator;

/// Error raised while rendering build documents.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum GenerateError {
    #[error("no build generator supports `{name}`")]
    #[diagnostic(code(chaos::generate::unsupported_language))]
    UnsupportedLanguage { name: String },

    #[error("Go groups `{first}` and `{second}` both declare module `{module}`")]
    #[diagnostic(
        code(chaos::generate::duplicate_go_module),
        help("a Go module is one library; list all of its endpoints in a single group")
    )]
    DuplicateGoModule {
        module: String,
        first: String,
        second: String,
    },

    #[error("invalid server requirements path `{path}`: {reason}")]
    #[diagnostic(code(chaos::generate::invalid_server_requirements))]
    InvalidServerRequirements { path: String, reason: &'static str },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Deps(#[from] DepsError),
}

impl GenerateError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            GenerateError::Deps(err) => err.to_diagnostic(),
            GenerateError::InvalidServerRequirements { .. } => Diagnostic::error(self.to_string())
                .with_suggestion(
                    "set `requirements` under [server] to a path inside the project directory",
                ),
            GenerateError::DuplicateGoModule { .. } => Diagnostic::error(self.to_string()),
            GenerateError::UnsupportedLanguage { .. } => {
                let valid: Vec<String> = Language::ALL.iter().map(|l| l.canonical()).collect();
                Diagnostic::error(self.to_string())
                    .with_context(format!("supported languages: {}", valid.join(", ")))
            }
        }
    }
}

/// Listen address and dependencies of generated servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Project-wide Python server requirements, relative to the project root
    pub requirements: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            requirements: DEFAULT_SERVER_REQUIREMENTS.to_string(),
        }
    }
}

impl ServerSettings {
    /// `host:port` as written into server sources.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The requirements file becomes a label and is copied into the output,
    /// so it must stay inside the project root.
    pub fn check_requirements(&self) -> Result<(), GenerateError> {
        check_relative_path(&self.requirements).map_err(|reason| {
            GenerateError::InvalidServerRequirements {
                path: self.requirements.clone(),
                reason,
            }
        })
    }
}

/// Per-run state handed to generators.
pub struct GenContext {
    /// Directory group paths are relative to
    pub root: PathBuf,
    pub cache: DependencyCache,
    pub server: ServerSettings,
}

impl GenContext {
    pub fn new(root: impl Into<PathBuf>, cache: DependencyCache, server: ServerSettings) -> Self {
        GenContext {
            root: root.into(),
            cache,
            server,
        }
    }

    /// Resolve a manifest-relative path.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }
}

/// Renders the Bazel documents of one ecosystem.
///
/// Every document ends with a newline; callers join documents with `"\n"`.
pub trait BuildGenerator {
    fn ecosystem(&self) -> Ecosystem;

    /// WORKSPACE rules that fetch the ecosystem's rule set.
    fn repository_rules(&self) -> String;

    /// WORKSPACE declaration of a language's toolchain.
    fn toolchain(&self, language: Language, cx: &mut GenContext) -> Result<String, GenerateError>;

    /// WORKSPACE declarations of one group's third-party dependencies.
    fn target_deps(&self, group: &Group, cx: &mut GenContext) -> Result<String, GenerateError>;

    /// WORKSPACE declarations of the dependencies of all groups of a language.
    fn toolchain_deps(
        &self,
        language: Language,
        groups: &[&Group],
        cx: &mut GenContext,
    ) -> Result<String, GenerateError> {
        self.check_language(language)?;
        let documents = groups
            .iter()
            .map(|group| self.target_deps(group, cx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents.join("\n"))
    }

    /// Root BUILD loads of the ecosystem's rules.
    fn build_rules(&self) -> String;

    /// Root BUILD library target of one group.
    fn target(&self, group: &Group, cx: &mut GenContext) -> Result<String, GenerateError>;

    /// Root BUILD binary target serving all groups of a language.
    fn server_target(
        &self,
        language: Language,
        groups: &[&Group],
        cx: &mut GenContext,
    ) -> Result<String, GenerateError>;

    /// Source of the server entrypoint of a language.
    fn server(
        &self,
        language: Language,
        groups: &[&Group],
        cx: &mut GenContext,
    ) -> Result<String, GenerateError>;

    /// Reject languages of another ecosystem.
    fn check_language(&self, language: Language) -> Result<(), GenerateError> {
        if language.ecosystem() == self.ecosystem() {
            Ok(())
        } else {
            Err(GenerateError::UnsupportedLanguage {
                name: language.canonical(),
            })
        }
    }
}

/// Registry of build generators keyed by ecosystem.
pub struct GeneratorRegistry {
    generators: HashMap<Ecosystem, Box<dyn BuildGenerator>>,
}

impl GeneratorRegistry {
    /// Create a registry with every built-in generator.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PythonGenerator));
        registry.register(Box::new(GoGenerator));
        registry
    }

    /// Create a registry with no generators.
    pub fn empty() -> Self {
        GeneratorRegistry {
            generators: HashMap::new(),
        }
    }

    /// Register a generator, replacing any for the same ecosystem.
    pub fn register(&mut self, generator: Box<dyn BuildGenerator>) {
        self.generators.insert(generator.ecosystem(), generator);
    }

    pub fn get(&self, ecosystem: Ecosystem) -> Result<&dyn BuildGenerator, GenerateError> {
        self.generators
            .get(&ecosystem)
            .map(|g| g.as_ref())
            .ok_or_else(|| GenerateError::UnsupportedLanguage {
                name: ecosystem.to_string(),
            })
    }

    /// Generator for a language's ecosystem.
    pub fn for_language(&self, language: Language) -> Result<&dyn BuildGenerator, GenerateError> {
        self.generators
            .get(&language.ecosystem())
            .map(|g| g.as_ref())
            .ok_or_else(|| GenerateError::UnsupportedLanguage {
                name: language.canonical(),
            })
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a list of quoted strings one per line, as in `deps = [...]`.
pub(crate) fn push_list(out: &mut String, field: &str, items: &[String]) {
    if items.is_empty() {
        out.push_str(&format!("    {} = [],\n", field));
        return;
    }
    out.push_str(&format!("    {} = [\n", field));
    for item in items {
        out.push_str(&format!("        {},\n", item));
    }
    out.push_str("    ],\n");
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = GeneratorRegistry::new();
        assert_eq!(
            registry.for_language(Language::Python3_9).unwrap().ecosystem(),
            Ecosystem::Python
        );
        assert_eq!(registry.get(Ecosystem::Go).unwrap().ecosystem(), Ecosystem::Go);
    }

    #[test]
    fn test_empty_registry_rejects() {
        let registry = GeneratorRegistry::empty();
        let err = registry.for_language(Language::Go1_19).err().unwrap();
        assert_eq!(err.to_string(), "no build generator supports `go1.19.3`");
        assert!(err.to_diagnostic().format(false).contains("supported languages"));
    }

    #[test]
    fn test_generator_rejects_foreign_language() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut cx = test_support::context(tmp.path());
        let err = PythonGenerator.toolchain(Language::Go1_19, &mut cx).unwrap_err();
        assert!(matches!(err, GenerateError::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_server_address() {
        assert_eq!(ServerSettings::default().address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_server_requirements_must_stay_in_project() {
        let mut settings = ServerSettings::default();
        assert!(settings.check_requirements().is_ok());

        settings.requirements = "deps/server.txt".to_string();
        assert!(settings.check_requirements().is_ok());

        for path in ["/tmp/server.txt", "../server.txt", "./server.txt", "deps/"] {
            settings.requirements = path.to_string();
            let err = settings.check_requirements().unwrap_err();
            assert!(
                matches!(err, GenerateError::InvalidServerRequirements { .. }),
                "{path:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_push_list() {
        let mut out = String::new();
        push_list(&mut out, "deps", &[]);
        push_list(&mut out, "deps", &["\":a\"".to_string()]);
        assert_eq!(out, "    deps = [],\n    deps = [\n        \":a\",\n    ],\n");
    }
}
