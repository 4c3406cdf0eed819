//! Per-directory `exports_files` documents.
//!
//! Bazel only lets the root package reference files in another directory if
//! that directory's BUILD exports them. Root-level files need no export.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::buildgen::ServerSettings;
use crate::core::language::Ecosystem;
use crate::core::manifest::Manifest;
use crate::core::naming::split_path;

/// Project files the generated workspace references by label.
///
/// Every group's source and dependency file, plus the server requirements
/// when any Python group is present.
pub fn referenced_files(manifest: &Manifest, server: &ServerSettings) -> BTreeSet<String> {
    let mut files: BTreeSet<String> = manifest.iter_files().map(str::to_string).collect();
    if manifest.ecosystems().contains(&Ecosystem::Python) {
        files.insert(server.requirements.clone());
    }
    files
}

/// Map each non-root directory holding referenced files to its BUILD document.
pub fn generate_export_builds<'a>(
    files: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<PathBuf, String> {
    let mut directories: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for path in files {
        let (directory, filename) = split_path(path);
        if directory.is_empty() {
            continue;
        }
        directories.entry(directory).or_default().insert(filename);
    }

    directories
        .into_iter()
        .map(|(directory, files)| {
            let quoted: Vec<String> = files.iter().map(|f| format!("\"{}\"", f)).collect();
            let document = format!("exports_files([{}])\n", quoted.join(","));
            (PathBuf::from(directory), document)
        })
        .collect()
}
