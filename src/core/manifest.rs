//! Manifest parsing and validation.
//!
//! The manifest is a YAML document listing endpoint groups:
//!
//! ```yaml
//! groups:
//!   - name: hello
//!     language: python3.10
//!     filename: fixtures/hello_world.py
//!     dependencies: fixtures/requirements.txt
//!     endpoints:
//!       - name: hello_world
//! ```
//!
//! A manifest either loads completely or not at all.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use serde::Deserialize;
use thiserror::Error;

use crate::core::language::{Ecosystem, Language, UnknownLanguageError};
use crate::core::naming::{split_path, toolchain_name};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while loading or validating a manifest.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ManifestError {
    #[error("failed to read manifest {}", path.display())]
    #[diagnostic(code(chaos::manifest::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed manifest {}: {message}", path.display())]
    #[diagnostic(
        code(chaos::manifest::malformed),
        help("expected `groups: [{{name, language, filename, dependencies, endpoints}}]`")
    )]
    Malformed { path: PathBuf, message: String },

    #[error("group {group} is missing required field `{field}`")]
    #[diagnostic(code(chaos::manifest::missing_field))]
    MissingField { group: String, field: &'static str },

    #[error("group `{group}`: {source}")]
    #[diagnostic(code(chaos::manifest::unknown_language))]
    UnknownLanguage {
        group: String,
        #[source]
        source: UnknownLanguageError,
    },

    #[error("duplicate group name `{name}`")]
    #[diagnostic(
        code(chaos::manifest::duplicate_group),
        help("group names become Bazel target names and must be unique")
    )]
    DuplicateGroupName { name: String },

    #[error("invalid group name `{name}`: {reason}")]
    #[diagnostic(code(chaos::manifest::invalid_group_name))]
    InvalidGroupName { name: String, reason: &'static str },

    #[error("languages `{first}` and `{second}` share the toolchain name `{toolchain}`")]
    #[diagnostic(code(chaos::manifest::toolchain_collision))]
    ToolchainCollision {
        first: String,
        second: String,
        toolchain: String,
    },

    #[error("groups `{first}` and `{second}` share the source file `{path}`")]
    #[diagnostic(
        code(chaos::manifest::shared_source),
        help("each group is imported once by its server; merge the groups instead")
    )]
    SharedSourceFile {
        first: String,
        second: String,
        path: String,
    },

    #[error("Go groups `{first}` and `{second}` share the module file `{path}`")]
    #[diagnostic(
        code(chaos::manifest::shared_go_module),
        help("a Go module is one library; list all of its endpoints in a single group")
    )]
    SharedGoModule {
        first: String,
        second: String,
        path: String,
    },

    #[error("group `{group}`: invalid path `{path}`: {reason}")]
    #[diagnostic(code(chaos::manifest::invalid_path))]
    InvalidPath {
        group: String,
        path: String,
        reason: &'static str,
    },
}

impl ManifestError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            ManifestError::Read { path, source } => diag
                .with_location(path)
                .with_context(source.to_string())
                .with_suggestion(suggestions::NO_MANIFEST),
            ManifestError::Malformed { path, .. } => diag.with_location(path),
            ManifestError::UnknownLanguage { .. } => {
                let valid: Vec<String> = Language::ALL.iter().map(|l| l.canonical()).collect();
                diag.with_context(format!("supported languages: {}", valid.join(", ")))
            }
            ManifestError::DuplicateGroupName { name } => {
                diag.with_suggestion(format!("rename one of the groups called `{}`", name))
            }
            _ => diag,
        }
    }
}

/// An HTTP route handler exposed by a group.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoint {
    pub name: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Endpoint { name: name.into() }
    }
}

/// One unit of source code compiled to one build target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Unique name, used as the Bazel target name
    pub name: String,

    /// Language and exact version
    pub language: Language,

    /// Path of the single source file, relative to the project root
    pub filename: String,

    /// Path of the dependency file, relative to the project root
    pub dependencies: String,

    /// Exposed endpoints
    pub endpoints: Vec<Endpoint>,
}

impl Group {
    /// Create a group with no endpoints.
    pub fn new(
        name: impl Into<String>,
        language: Language,
        filename: impl Into<String>,
        dependencies: impl Into<String>,
    ) -> Self {
        Group {
            name: name.into(),
            language,
            filename: filename.into(),
            dependencies: dependencies.into(),
            endpoints: Vec::new(),
        }
    }

    /// Add endpoints.
    pub fn with_endpoints(mut self, endpoints: impl IntoIterator<Item = Endpoint>) -> Self {
        self.endpoints.extend(endpoints);
        self
    }

    /// Directory of the dependency file, relative to the project root.
    pub fn dependencies_dir(&self) -> &str {
        split_path(&self.dependencies).0
    }
}

/// The parsed manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    groups: Vec<Group>,

    /// Directory that group paths are relative to
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    groups: Option<Vec<RawGroup>>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    name: Option<String>,
    language: Option<String>,
    filename: Option<String>,
    dependencies: Option<String>,
    endpoints: Option<Vec<Endpoint>>,
}

impl Manifest {
    /// Create a validated manifest from groups.
    pub fn new(groups: Vec<Group>, root: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let manifest = Manifest {
            groups,
            root: root.into(),
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest from a file path.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content, path)
    }

    /// Parse manifest content. `path` locates the project root.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let raw: RawManifest =
            serde_yaml::from_str(content).map_err(|e| ManifestError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let raw_groups = raw.groups.ok_or_else(|| ManifestError::Malformed {
            path: path.to_path_buf(),
            message: "missing top-level `groups` list".to_string(),
        })?;

        let groups = raw_groups
            .into_iter()
            .enumerate()
            .map(|(index, raw_group)| Self::convert_group(index, raw_group))
            .collect::<Result<Vec<_>, _>>()?;

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Self::new(groups, root)
    }

    fn convert_group(index: usize, raw: RawGroup) -> Result<Group, ManifestError> {
        let label = match raw.name {
            Some(ref name) => format!("`{}`", name),
            None => format!("#{}", index + 1),
        };
        let missing = |field| ManifestError::MissingField {
            group: label.clone(),
            field,
        };

        let name = raw.name.clone().ok_or_else(|| missing("name"))?;
        let language_raw = raw.language.ok_or_else(|| missing("language"))?;
        let filename = raw.filename.ok_or_else(|| missing("filename"))?;
        let dependencies = raw.dependencies.ok_or_else(|| missing("dependencies"))?;
        let endpoints = raw.endpoints.ok_or_else(|| missing("endpoints"))?;

        let language = language_raw
            .parse()
            .map_err(|source| ManifestError::UnknownLanguage {
                group: name.clone(),
                source,
            })?;

        Ok(Group {
            name,
            language,
            filename,
            dependencies,
            endpoints,
        })
    }

    fn validate(&self) -> Result<(), ManifestError> {
        let mut seen = BTreeSet::new();
        let mut sources: HashMap<&str, &str> = HashMap::new();
        let mut go_modules: HashMap<&str, &str> = HashMap::new();
        for group in &self.groups {
            validate_group_name(&group.name)?;
            if !seen.insert(group.name.as_str()) {
                return Err(ManifestError::DuplicateGroupName {
                    name: group.name.clone(),
                });
            }
            validate_relative_path(&group.name, &group.filename)?;
            validate_relative_path(&group.name, &group.dependencies)?;

            if let Some(first) = sources.insert(&group.filename, &group.name) {
                return Err(ManifestError::SharedSourceFile {
                    first: first.to_string(),
                    second: group.name.clone(),
                    path: group.filename.clone(),
                });
            }
            if group.language.ecosystem() == Ecosystem::Go {
                if let Some(first) = go_modules.insert(&group.dependencies, &group.name) {
                    return Err(ManifestError::SharedGoModule {
                        first: first.to_string(),
                        second: group.name.clone(),
                        path: group.dependencies.clone(),
                    });
                }
            }
        }

        check_toolchain_names(
            self.languages()
                .into_iter()
                .map(|language| (language.canonical(), toolchain_name(language))),
        )
    }

    /// Groups in declaration order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Project root that group paths are relative to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a group by name.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Groups ordered by name.
    pub fn sorted_groups(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.iter().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    /// Distinct languages in use, in (ecosystem, version) order.
    pub fn languages(&self) -> BTreeSet<Language> {
        self.groups.iter().map(|g| g.language).collect()
    }

    /// Distinct ecosystems in use, ordered by id.
    pub fn ecosystems(&self) -> BTreeSet<Ecosystem> {
        self.groups.iter().map(|g| g.language.ecosystem()).collect()
    }

    /// Groups of one language, ordered by name.
    pub fn groups_for(&self, language: Language) -> Vec<&Group> {
        self.sorted_groups()
            .into_iter()
            .filter(|g| g.language == language)
            .collect()
    }

    /// Groups bucketed by language; each bucket is ordered by name.
    pub fn groups_by_language(&self) -> BTreeMap<Language, Vec<&Group>> {
        let mut buckets: BTreeMap<Language, Vec<&Group>> = BTreeMap::new();
        for group in self.sorted_groups() {
            buckets.entry(group.language).or_default().push(group);
        }
        buckets
    }

    /// Every file a group references (source file, then dependency file).
    pub fn iter_files(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups
            .iter()
            .flat_map(|g| [g.filename.as_str(), g.dependencies.as_str()])
    }
}

/// Reject two distinct languages that derive the same toolchain name.
///
/// Takes `(canonical language, toolchain name)` pairs.
pub fn check_toolchain_names(
    languages: impl IntoIterator<Item = (String, String)>,
) -> Result<(), ManifestError> {
    let mut owners: HashMap<String, String> = HashMap::new();
    for (language, toolchain) in languages {
        match owners.get(&toolchain) {
            Some(existing) if *existing != language => {
                return Err(ManifestError::ToolchainCollision {
                    first: existing.clone(),
                    second: language,
                    toolchain,
                });
            }
            Some(_) => {}
            None => {
                owners.insert(toolchain, language);
            }
        }
    }
    Ok(())
}

/// Group names become Bazel target names, Python identifiers and repository
/// prefixes; `*_server` is reserved for the aggregate targets.
fn validate_group_name(name: &str) -> Result<(), ManifestError> {
    let invalid = |reason| ManifestError::InvalidGroupName {
        name: name.to_string(),
        reason,
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("name is empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("must start with a letter or underscore"))
        }
        _ => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only ASCII letters, digits and underscores are allowed"));
    }
    if name.ends_with("_server") {
        return Err(invalid("the `_server` suffix is reserved for generated targets"));
    }
    Ok(())
}

fn validate_relative_path(group: &str, path: &str) -> Result<(), ManifestError> {
    check_relative_path(path).map_err(|reason| ManifestError::InvalidPath {
        group: group.to_string(),
        path: path.to_string(),
        reason,
    })
}

/// Check that `path` names a file inside the project root.
///
/// Generated labels and output copies are built by joining these paths onto
/// a directory, so anything absolute or escaping is rejected.
pub fn check_relative_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("path is empty");
    }
    if path.ends_with('/') {
        return Err("path names a directory");
    }
    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => return Err("`.` components are not allowed"),
            Component::ParentDir => return Err("path escapes the project root"),
            Component::RootDir | Component::Prefix(_) => {
                return Err("path must be relative to the project root")
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BASIC: &str = r#"
groups:
  - name: hello
    language: python3.10
    filename: fixtures/hello_world.py
    dependencies: fixtures/requirements.txt
    endpoints:
      - name: hello_world
  - name: echo
    language: python3.11
    filename: echo.py
    dependencies: requirements.txt
    endpoints: []
"#;

    fn parse(content: &str) -> Result<Manifest, ManifestError> {
        Manifest::parse(content, Path::new("/project/manifest.yaml"))
    }

    #[test]
    fn test_parse_basic_manifest() {
        let manifest = parse(BASIC).unwrap();
        assert_eq!(manifest.groups().len(), 2);
        assert_eq!(manifest.root(), Path::new("/project"));

        let hello = manifest.group("hello").unwrap();
        assert_eq!(hello.language, Language::Python3_10);
        assert_eq!(hello.endpoints, vec![Endpoint::new("hello_world")]);
        assert_eq!(hello.dependencies_dir(), "fixtures");
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("manifest.yaml");
        std::fs::write(&path, BASIC).unwrap();

        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.root(), tmp.path());
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = Manifest::load(&tmp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }

    #[test]
    fn test_relative_manifest_path_root() {
        let manifest = Manifest::parse(BASIC, Path::new("manifest.yaml")).unwrap();
        assert_eq!(manifest.root(), Path::new("."));
    }

    #[test]
    fn test_derived_views() {
        let manifest = parse(BASIC).unwrap();

        let languages: Vec<Language> = manifest.languages().into_iter().collect();
        assert_eq!(languages, vec![Language::Python3_10, Language::Python3_11]);
        assert_eq!(manifest.ecosystems().len(), 1);

        let names: Vec<&str> = manifest.sorted_groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "hello"]);

        let files: Vec<&str> = manifest.iter_files().collect();
        assert_eq!(
            files,
            vec![
                "fixtures/hello_world.py",
                "fixtures/requirements.txt",
                "echo.py",
                "requirements.txt",
            ]
        );

        let by_language = manifest.groups_by_language();
        assert_eq!(by_language[&Language::Python3_11][0].name, "echo");
        assert_eq!(manifest.groups_for(Language::Python3_10).len(), 1);
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse("groups: [").unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { .. }));

        let err = parse("other: 1\n").unwrap_err();
        assert!(err.to_string().contains("groups"));
    }

    #[test]
    fn test_missing_field() {
        let content = r#"
groups:
  - name: hello
    language: python3.10
    filename: hello.py
    endpoints: []
"#;
        let err = parse(content).unwrap_err();
        match err {
            ManifestError::MissingField { group, field } => {
                assert_eq!(group, "`hello`");
                assert_eq!(field, "dependencies");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_name_uses_position() {
        let content = r#"
groups:
  - language: python3.10
    filename: hello.py
    dependencies: requirements.txt
    endpoints: []
"#;
        let err = parse(content).unwrap_err();
        assert_eq!(err.to_string(), "group #1 is missing required field `name`");
    }

    #[test]
    fn test_unknown_language() {
        let content = r#"
groups:
  - name: hello
    language: ruby3.2
    filename: hello.rb
    dependencies: Gemfile.lock
    endpoints: []
"#;
        let err = parse(content).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownLanguage { .. }));
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("supported languages"));
    }

    #[test]
    fn test_duplicate_group_name() {
        let groups = vec![
            Group::new("hello", Language::Python3_10, "a.py", "requirements.txt"),
            Group::new("hello", Language::Python3_11, "b.py", "requirements.txt"),
        ];
        let err = Manifest::new(groups, "/project").unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateGroupName { ref name } if name == "hello"));
    }

    #[test]
    fn test_reserved_and_invalid_group_names() {
        for name in ["python3_10_server", "1hello", "hello-world", ""] {
            let groups = vec![Group::new(name, Language::Python3_10, "a.py", "r.txt")];
            let err = Manifest::new(groups, "/project").unwrap_err();
            assert!(
                matches!(err, ManifestError::InvalidGroupName { .. }),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_invalid_paths() {
        for path in ["/abs/a.py", "../a.py", "a/../../b.py", "./a.py", "dir/", ""] {
            let groups = vec![Group::new("g", Language::Python3_10, path, "r.txt")];
            let err = Manifest::new(groups, "/project").unwrap_err();
            assert!(
                matches!(err, ManifestError::InvalidPath { .. }),
                "{path:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_shared_source_file_rejected() {
        let groups = vec![
            Group::new("a", Language::Python3_10, "api.py", "requirements.txt"),
            Group::new("b", Language::Python3_11, "api.py", "requirements.txt"),
        ];
        let err = Manifest::new(groups, "/project").unwrap_err();
        assert_eq!(err.to_string(), "groups `a` and `b` share the source file `api.py`");
    }

    #[test]
    fn test_go_groups_sharing_go_mod_rejected() {
        let groups = vec![
            Group::new("a", Language::Go1_19, "svc/a.go", "svc/go.mod"),
            Group::new("b", Language::Go1_19, "svc/b.go", "svc/go.mod"),
        ];
        let err = Manifest::new(groups, "/project").unwrap_err();
        assert!(matches!(
            err,
            ManifestError::SharedGoModule { ref first, ref second, ref path }
                if first == "a" && second == "b" && path == "svc/go.mod"
        ));
    }

    #[test]
    fn test_python_groups_may_share_requirements() {
        let groups = vec![
            Group::new("a", Language::Python3_10, "a.py", "requirements.txt"),
            Group::new("b", Language::Python3_10, "b.py", "requirements.txt"),
        ];
        assert!(Manifest::new(groups, "/project").is_ok());
    }

    #[test]
    fn test_check_relative_path() {
        assert!(check_relative_path("deps/server.txt").is_ok());
        assert_eq!(
            check_relative_path("/tmp/server.txt"),
            Err("path must be relative to the project root")
        );
        assert_eq!(check_relative_path("../server.txt"), Err("path escapes the project root"));
    }

    #[test]
    fn test_toolchain_collision_rejected() {
        let err = check_toolchain_names([
            ("python3.10".to_string(), "python3_10".to_string()),
            ("python3_10".to_string(), "python3_10".to_string()),
        ])
        .unwrap_err();
        assert!(matches!(err, ManifestError::ToolchainCollision { .. }));
    }

    #[test]
    fn test_toolchain_names_same_language_ok() {
        check_toolchain_names([
            ("python3.10".to_string(), "python3_10".to_string()),
            ("python3.10".to_string(), "python3_10".to_string()),
            ("python3.11".to_string(), "python3_11".to_string()),
        ])
        .unwrap();
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = parse("groups: []\n").unwrap();
        assert!(manifest.is_empty());
        assert!(manifest.languages().is_empty());
    }
}
