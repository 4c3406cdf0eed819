//! Core data structures for chaos.
//!
//! This module contains the foundational types used throughout chaos:
//! - The language catalog
//! - Manifests, groups and endpoints
//! - Naming of generated targets and imports

pub mod language;
pub mod manifest;
pub mod naming;

pub use language::{Ecosystem, Language, UnknownLanguageError};
pub use manifest::{Endpoint, Group, Manifest, ManifestError};
