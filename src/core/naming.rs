//! Identifier and path normalization.
//!
//! Everything here is a pure string transformation. These functions decide the
//! names of generated Bazel targets, repositories and import aliases, so their
//! output must be stable across runs.
//!
//! `target_name` and `module_import_identifier` are not injective: `a.b` and
//! `a_b` both become `a_b`. Coordinates in scope (reverse-DNS module paths,
//! PyPI names) do not collide in practice.

use crate::core::language::Language;

/// Split a relative path into `(directory, filename)` on the last `/`.
///
/// The directory is empty for root-level paths.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((directory, filename)) => (directory, filename),
        None => ("", path),
    }
}

/// Bazel label for a file in the generated tree.
///
/// `requirements.txt` becomes `//:requirements.txt` and `subdir/a.py`
/// becomes `//subdir:a.py`.
pub fn filename_as_target(path: &str) -> String {
    let (directory, filename) = split_path(path);
    format!("//{}:{}", directory, filename)
}

/// Repository-safe identifier for a dependency coordinate.
pub fn target_name(coordinate: &str) -> String {
    coordinate
        .chars()
        .map(|c| match c {
            '.' | '-' | '_' | '/' => '_',
            other => other,
        })
        .collect()
}

/// Toolchain name for a language, e.g. `python3_10` or `go1_19_3`.
pub fn toolchain_name(language: Language) -> String {
    format!(
        "{}{}",
        language.ecosystem().as_str(),
        language.formatted_version().replace('.', "_")
    )
}

/// Name of the aggregate server target for a language.
pub fn server_target_name(language: Language) -> String {
    format!("{}_server", toolchain_name(language))
}

/// File name of the generated server entrypoint for a language.
pub fn server_filename(language: Language) -> String {
    format!("{}.{}", server_target_name(language), language.file_suffix())
}

/// Strip the last extension from a file name.
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Import alias for a group's source file.
///
/// `subdir/something.py` becomes `subdir_something`; a root-level
/// `something.py` becomes `_something`.
pub fn module_import_identifier(path: &str) -> String {
    let (directory, filename) = split_path(path);
    format!("{}_{}", directory.replace('/', "_"), file_stem(filename))
}

/// Dotted Python package path of a file's directory (`a/b/c.py` -> `a.b`).
pub fn module_import_path(path: &str) -> String {
    split_path(path).0.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_as_target() {
        assert_eq!(filename_as_target("requirements.txt"), "//:requirements.txt");
        assert_eq!(filename_as_target("subdir/a.py"), "//subdir:a.py");
        assert_eq!(filename_as_target("a/b/c.go"), "//a/b:c.go");
    }

    #[test]
    fn test_target_name() {
        assert_eq!(
            target_name("github.com/Code-Hex/Neo-cowsay/v2"),
            "github_com_Code_Hex_Neo_cowsay_v2"
        );
        assert_eq!(target_name("golang.org/x/xerrors"), "golang_org_x_xerrors");
    }

    #[test]
    fn test_target_name_known_collision() {
        assert_eq!(target_name("a.b"), target_name("a_b"));
    }

    #[test]
    fn test_toolchain_name() {
        assert_eq!(toolchain_name(Language::Python3_10), "python3_10");
        assert_eq!(toolchain_name(Language::Go1_19), "go1_19_3");
        assert_eq!(server_target_name(Language::Python3_9), "python3_9_server");
        assert_eq!(server_filename(Language::Go1_19), "go1_19_3_server.go");
    }

    #[test]
    fn test_toolchain_names_distinct_across_catalog() {
        let mut names: Vec<String> = Language::ALL.iter().map(|l| toolchain_name(*l)).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Language::ALL.len());
    }

    #[test]
    fn test_module_import_identifier() {
        assert_eq!(module_import_identifier("subdir/something.py"), "subdir_something");
        assert_eq!(module_import_identifier("a/b/handler.py"), "a_b_handler");
        assert_eq!(module_import_identifier("something.py"), "_something");
    }

    #[test]
    fn test_module_import_path() {
        assert_eq!(module_import_path("a/b/c.py"), "a.b");
        assert_eq!(module_import_path("c.py"), "");
    }
}
