//! User-facing diagnostic messages.
//!
//! Every error shown to the user carries its cause, any context lines that
//! narrow it down, and a suggested next step where one exists.

use std::fmt;
use std::path::PathBuf;

/// Common suggestion messages.
pub mod suggestions {
    /// No manifest was found at the given path.
    pub const NO_MANIFEST: &str =
        "pass `--manifest <path>` or set CHAOS_MANIFEST to point at a manifest.yaml";

    /// A dependency file referenced by a group does not exist.
    pub const MISSING_DEPENDENCY_FILE: &str =
        "check the group's `dependencies` path; it is relative to the manifest directory";

    /// The output directory already has content.
    pub const OUTPUT_NOT_EMPTY: &str = "re-run with `--force` to overwrite generated files";

    /// The Go toolchain could not read a go.mod.
    pub const GO_TOOLCHAIN: &str =
        "install Go, or set `module_reader = \"native\"` under [go] in .chaos/config.toml";

    /// The build executor is not installed.
    pub const NO_EXECUTOR: &str =
        "install bazelisk, or set `program` under [executor] in .chaos/config.toml";
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related file
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let label = if color { "\x1b[1;31merror\x1b[0m" } else { "error" };
        output.push_str(&format!("{}: {}\n", label, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            let help = if color { "\x1b[1;32mhelp\x1b[0m" } else { "help" };
            output.push('\n');
            output.push_str(&format!("{}: consider:\n", help));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
