//! `go.sum` reader and version selection.
//!
//! A go.sum lists every module version the build has ever hashed, often
//! several per module path. Build generation needs exactly one version per
//! path, so [`max_versions`] keeps the highest.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{DependencyEntry, DepsError};

/// Pseudo-version suffix: optional pre-release prefix, UTC timestamp, revision.
static PSEUDO_VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[0-9A-Za-z]+\.)*(\d{4})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})-[0-9a-f]{12}$",
    )
    .unwrap()
});

/// Parse go.sum lines as `path version hash`.
///
/// A `/go.mod` suffix on the version is dropped, so both hashes of a module
/// version parse to the same version.
pub fn parse(content: &str, path: &Path) -> Result<Vec<DependencyEntry>, DepsError> {
    let mut entries = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [module, version, hash] = fields.as_slice() else {
            return Err(DepsError::MalformedLine {
                path: path.to_path_buf(),
                line: index + 1,
                message: format!("expected `path version hash`, found {} fields", fields.len()),
            });
        };

        let version = version.strip_suffix("/go.mod").unwrap_or(*version);
        entries.push(DependencyEntry::new(*module, version, *hash));
    }

    Ok(entries)
}

/// Comparable key of a module version.
///
/// `v0.0.13` becomes `[0, 0, 13]` and the pseudo-version
/// `v0.0.0-20191204190536-9bdfabe68543` becomes
/// `[0, 0, 0, 2019, 12, 4, 19, 5, 36]`.
pub fn version_key(version: &str) -> Result<Vec<u64>, DepsError> {
    let malformed = |reason: &str| DepsError::MalformedVersion {
        version: version.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = version.strip_prefix('v').unwrap_or(version);
    // Build metadata such as `+incompatible` does not affect precedence.
    let trimmed = trimmed.split('+').next().unwrap_or_default();
    let (release, suffix) = match trimmed.split_once('-') {
        Some((release, suffix)) => (release, Some(suffix)),
        None => (trimmed, None),
    };

    let mut key = release
        .split('.')
        .map(|part| part.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed("release components must be numeric"))?;

    if let Some(suffix) = suffix {
        let captures = PSEUDO_VERSION_PATTERN
            .captures(suffix)
            .ok_or_else(|| malformed("suffix is not a pseudo-version timestamp and revision"))?;
        for group in 1..=6usize {
            let component = captures[group]
                .parse::<u64>()
                .map_err(|_| malformed("timestamp is not numeric"))?;
            key.push(component);
        }
    }

    Ok(key)
}

/// Keep the highest version per module path, sorted by path.
///
/// Ties keep the first entry seen.
pub fn max_versions(entries: &[DependencyEntry]) -> Result<Vec<DependencyEntry>, DepsError> {
    let mut best: BTreeMap<&str, (Vec<u64>, &DependencyEntry)> = BTreeMap::new();

    for entry in entries {
        let key = version_key(&entry.version)?;
        match best.get(entry.coordinate.as_str()) {
            Some((current, _)) if key.cmp(current) != Ordering::Greater => {}
            _ => {
                best.insert(&entry.coordinate, (key, entry));
            }
        }
    }

    Ok(best.into_values().map(|(_, entry)| entry.clone()).collect())
}
