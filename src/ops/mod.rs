//! High-level operations.
//!
//! This module contains the implementation of chaos commands.

pub mod assemble;
pub mod exports;
pub mod generate;
pub mod run;

pub use assemble::{assemble, BuildGraph, ServerSource};
pub use exports::{generate_export_builds, referenced_files};
pub use generate::{generate, generate_manifest, GenerateOptions, GenerateResult};
pub use run::{resolve_target, run, RunOptions};
