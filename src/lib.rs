//! chaos - generate a Bazel build graph from a manifest of endpoint groups
//!
//! A manifest lists groups of HTTP endpoints, each a single source file in
//! some language with its own dependency file. This crate turns it into a
//! Bazel workspace: toolchains and third-party repositories in `WORKSPACE`,
//! one library per group plus one server binary per language in `BUILD`,
//! and the server entrypoints that mount every group's handlers.

pub mod buildgen;
pub mod core;
pub mod deps;
pub mod ops;
pub mod util;

pub use buildgen::{BuildGenerator, GenContext, GenerateError, GeneratorRegistry};
pub use crate::core::{Ecosystem, Endpoint, Group, Language, Manifest, ManifestError};
pub use deps::{DependencyCache, DependencyEntry, DepsError};
pub use ops::{BuildGraph, ServerSource};
