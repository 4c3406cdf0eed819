//! Language catalog.
//!
//! A [`Language`] is an exact (ecosystem, version) pair. The catalog is closed:
//! manifests name languages by their canonical string (`python3.10`, `go1.19.3`)
//! and anything else is rejected at load time.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Language family that owns a build generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Go,
    Python,
}

impl Ecosystem {
    /// Get the ecosystem id as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Go => "go",
            Ecosystem::Python => "python",
        }
    }

    /// Source file suffix (without the dot).
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Ecosystem::Go => "go",
            Ecosystem::Python => "py",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supported language at an exact version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// Go 1.19.3
    Go1_19,
    /// Python 3.9
    Python3_9,
    /// Python 3.10
    Python3_10,
    /// Python 3.11
    Python3_11,
}

impl Language {
    /// Every language in the catalog.
    pub const ALL: [Language; 4] = [
        Language::Go1_19,
        Language::Python3_9,
        Language::Python3_10,
        Language::Python3_11,
    ];

    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            Language::Go1_19 => Ecosystem::Go,
            Language::Python3_9 | Language::Python3_10 | Language::Python3_11 => {
                Ecosystem::Python
            }
        }
    }

    /// Version tuple, most significant component first.
    pub fn version(&self) -> &'static [u32] {
        match self {
            Language::Go1_19 => &[1, 19, 3],
            Language::Python3_9 => &[3, 9],
            Language::Python3_10 => &[3, 10],
            Language::Python3_11 => &[3, 11],
        }
    }

    /// Dotted version, e.g. `3.10`.
    pub fn formatted_version(&self) -> String {
        self.version()
            .iter()
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Canonical manifest form, e.g. `python3.10`.
    pub fn canonical(&self) -> String {
        format!("{}{}", self.ecosystem().as_str(), self.formatted_version())
    }

    /// Human-readable name, e.g. `Python 3.10`.
    pub fn display_name(&self) -> String {
        let family = match self.ecosystem() {
            Ecosystem::Go => "Go",
            Ecosystem::Python => "Python",
        };
        format!("{} {}", family, self.formatted_version())
    }

    /// Source file suffix for this language.
    pub fn file_suffix(&self) -> &'static str {
        self.ecosystem().file_suffix()
    }

    /// Sort key: ecosystem id first, then the version tuple.
    fn sort_key(&self) -> (&'static str, &'static [u32]) {
        (self.ecosystem().as_str(), self.version())
    }
}

impl PartialOrd for Language {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Language {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl std::str::FromStr for Language {
    type Err = UnknownLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .iter()
            .copied()
            .find(|language| language.canonical() == s)
            .ok_or_else(|| UnknownLanguageError(s.to_string()))
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when parsing a language string outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLanguageError(pub String);

impl fmt::Display for UnknownLanguageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let valid: Vec<String> = Language::ALL.iter().map(|l| l.canonical()).collect();
        write!(
            f,
            "unknown language '{}', valid values: {}",
            self.0,
            valid.join(", ")
        )
    }
}

impl std::error::Error for UnknownLanguageError {}
