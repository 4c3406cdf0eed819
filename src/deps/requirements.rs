//! `requirements.txt` reader.
//!
//! Only the subset pip-compile emits is understood: one requirement per
//! logical line, `==` pins, `--hash=` options, environment markers and
//! `\` line continuations. Option lines (`-r`, `--index-url`, ...) are skipped.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{DependencyEntry, DepsError};

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?").unwrap());

/// Parse requirement entries, keeping file order.
///
/// `path` is only used for error messages.
pub fn parse(content: &str, path: &Path) -> Result<Vec<DependencyEntry>, DepsError> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for (line_number, line) in logical_lines(content) {
        let line = strip_comment(&line);
        if line.is_empty() {
            continue;
        }
        if line.starts_with('-') {
            tracing::debug!("skipping pip option at {}:{}: {}", path.display(), line_number, line);
            continue;
        }

        let entry = parse_line(line).ok_or_else(|| DepsError::MalformedLine {
            path: path.to_path_buf(),
            line: line_number,
            message: format!("expected a requirement, found `{}`", line),
        })?;

        if !seen.insert(entry.coordinate.to_ascii_lowercase()) {
            tracing::warn!(
                "{}:{}: duplicate requirement `{}`, keeping the first",
                path.display(),
                line_number,
                entry.coordinate
            );
            continue;
        }
        entries.push(entry);
    }

    Ok(entries)
}

/// Join `\`-continued lines. Yields the 1-based number of the first physical line.
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (index, raw) in content.lines().enumerate() {
        let (continued, text) = match raw.trim_end().strip_suffix('\\') {
            Some(text) => (true, text),
            None => (false, raw),
        };

        let (start, mut buffer) = pending.take().unwrap_or((index + 1, String::new()));
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(text.trim());

        if continued {
            pending = Some((start, buffer));
        } else {
            lines.push((start, buffer));
        }
    }

    if let Some(last) = pending {
        lines.push(last);
    }
    lines
}

fn strip_comment(line: &str) -> &str {
    let line = line.trim();
    if line.starts_with('#') {
        return "";
    }
    match line.find(" #") {
        Some(index) => line[..index].trim_end(),
        None => line,
    }
}

fn parse_line(line: &str) -> Option<DependencyEntry> {
    let (requirement, options) = match line.find(" --") {
        Some(index) => (&line[..index], &line[index..]),
        None => (line, ""),
    };
    let requirement = requirement.split(';').next().unwrap_or_default().trim();

    let name = NAME_PATTERN.find(requirement)?.as_str();
    let version = pinned_version(&requirement[name.len()..]);
    let integrity = options
        .split_whitespace()
        .find_map(|option| option.strip_prefix("--hash="))
        .unwrap_or_default();

    Some(DependencyEntry::new(name, version, integrity))
}

/// The version of a single `==` clause; anything else is unpinned.
fn pinned_version(spec: &str) -> &str {
    let mut spec = spec.trim_start();
    if spec.starts_with('[') {
        spec = match spec.find(']') {
            Some(end) => spec[end + 1..].trim_start(),
            None => return "",
        };
    }

    match spec.strip_prefix("==") {
        Some(version) if !version.starts_with('=') && !version.contains(',') => version.trim(),
        _ => "",
    }
}
