//! Build graph assembly.
//!
//! Runs every generator over the manifest once and stitches the documents
//! into a WORKSPACE, a root BUILD and one server source per language.
//! Output order is fixed: ecosystems by id, languages by
//! (ecosystem, version), groups by name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::buildgen::{GenContext, GenerateError, GeneratorRegistry};
use crate::core::language::Language;
use crate::core::manifest::Manifest;
use crate::core::naming::server_filename;
use crate::ops::exports::{generate_export_builds, referenced_files};

/// Load of `http_archive`, required before any repository rule.
pub const HTTP_ARCHIVE: &str =
    "load(\"@bazel_tools//tools/build_defs/repo:http.bzl\", \"http_archive\")\n";

/// Generated entrypoint of one language's server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSource {
    pub language: Language,
    /// `{toolchain}_server.{suffix}`
    pub filename: String,
    pub contents: String,
}

/// Every generated document, held in memory until written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildGraph {
    /// WORKSPACE contents
    pub workspace: String,
    /// Root BUILD contents
    pub build: String,
    pub servers: Vec<ServerSource>,
    /// BUILD contents per exported directory
    pub exports: BTreeMap<PathBuf, String>,
    /// Project files to copy next to the documents
    pub files: BTreeSet<String>,
}

/// Join documents with a blank line between them, skipping empty ones.
fn join_documents(documents: Vec<String>) -> String {
    documents
        .into_iter()
        .filter(|doc| !doc.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble the build graph of a manifest.
pub fn assemble(
    manifest: &Manifest,
    registry: &GeneratorRegistry,
    cx: &mut GenContext,
) -> Result<BuildGraph, GenerateError> {
    tracing::info!("Generating build graph for {} groups", manifest.groups().len());

    if manifest.is_empty() {
        return Ok(BuildGraph::default());
    }

    let by_language = manifest.groups_by_language();
    let ecosystems = manifest.ecosystems();

    let mut workspace = vec![HTTP_ARCHIVE.to_string()];
    for ecosystem in &ecosystems {
        workspace.push(registry.get(*ecosystem)?.repository_rules());
    }
    for language in by_language.keys() {
        tracing::debug!("toolchain {}", language);
        workspace.push(registry.for_language(*language)?.toolchain(*language, cx)?);
    }
    for (language, groups) in &by_language {
        let generator = registry.for_language(*language)?;
        workspace.push(generator.toolchain_deps(*language, groups, cx)?);
    }

    let mut build = Vec::new();
    for ecosystem in &ecosystems {
        build.push(registry.get(*ecosystem)?.build_rules());
    }
    for group in manifest.sorted_groups() {
        tracing::debug!("target {}", group.name);
        build.push(registry.for_language(group.language)?.target(group, cx)?);
    }
    for (language, groups) in &by_language {
        build.push(registry.for_language(*language)?.server_target(*language, groups, cx)?);
    }

    let mut servers = Vec::new();
    for (language, groups) in &by_language {
        let contents = registry.for_language(*language)?.server(*language, groups, cx)?;
        servers.push(ServerSource {
            language: *language,
            filename: server_filename(*language),
            contents,
        });
    }

    let files = referenced_files(manifest, &cx.server);
    Ok(BuildGraph {
        workspace: join_documents(workspace),
        build: join_documents(build),
        servers,
        exports: generate_export_builds(files.iter().map(String::as_str)),
        files,
    })
}
