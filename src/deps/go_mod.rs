//! `go.mod` readers.
//!
//! Two [`ModuleReader`]s exist: [`GoCommand`] asks the Go toolchain
//! (`go mod edit -json`) and [`NativeModReader`] parses the file text itself.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use super::DepsError;
use crate::util::process::ProcessBuilder;

/// The parts of a go.mod used for build generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    /// Import path declared by the `module` directive
    pub module_path: String,
    pub requires: Vec<GoRequire>,
}

/// A `require` directive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GoRequire {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Version")]
    pub version: String,
}

impl GoRequire {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        GoRequire {
            path: path.into(),
            version: version.into(),
        }
    }
}

/// Reads a go.mod into a [`GoMod`].
pub trait ModuleReader {
    /// Read the go.mod at `go_mod`.
    fn read(&self, go_mod: &Path) -> Result<GoMod, DepsError>;
}

/// Which [`ModuleReader`] to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleReaderKind {
    /// `go mod edit -json`
    #[default]
    Command,
    /// Built-in text parser
    Native,
}

impl ModuleReaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleReaderKind::Command => "command",
            ModuleReaderKind::Native => "native",
        }
    }

    /// Construct the reader. `go_program` is only used by `Command`.
    pub fn reader(&self, go_program: &str) -> Box<dyn ModuleReader> {
        match self {
            ModuleReaderKind::Command => Box::new(GoCommand::new(go_program)),
            ModuleReaderKind::Native => Box::new(NativeModReader),
        }
    }
}

impl fmt::Display for ModuleReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown reader kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReaderKindParseError(String);

impl fmt::Display for ModuleReaderKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid go.mod reader '{}', valid values: command, native",
            self.0
        )
    }
}

impl std::error::Error for ModuleReaderKindParseError {}

impl FromStr for ModuleReaderKind {
    type Err = ModuleReaderKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "command" => Ok(ModuleReaderKind::Command),
            "native" => Ok(ModuleReaderKind::Native),
            _ => Err(ModuleReaderKindParseError(s.to_string())),
        }
    }
}

/// Reads go.mod files through `go mod edit -json`.
#[derive(Debug, Clone)]
pub struct GoCommand {
    program: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawGoMod {
    #[serde(rename = "Module")]
    module: RawModule,
    #[serde(rename = "Require", default)]
    require: Option<Vec<GoRequire>>,
}

#[derive(Debug, Deserialize)]
struct RawModule {
    #[serde(rename = "Path")]
    path: String,
}

impl GoCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        GoCommand {
            program: program.into(),
        }
    }

    /// Decode the JSON printed by `go mod edit -json`.
    pub fn parse_json(json: &str, go_mod: &Path) -> Result<GoMod, DepsError> {
        let raw: RawGoMod =
            serde_json::from_str(json).map_err(|e| DepsError::ToolchainInvocation {
                path: go_mod.to_path_buf(),
                message: format!("unexpected `go mod edit -json` output: {}", e),
            })?;

        Ok(GoMod {
            module_path: raw.module.path,
            requires: raw.require.unwrap_or_default(),
        })
    }
}

impl ModuleReader for GoCommand {
    fn read(&self, go_mod: &Path) -> Result<GoMod, DepsError> {
        let dir = go_mod.parent().unwrap_or_else(|| Path::new("."));
        let invocation_error = |message: String| DepsError::ToolchainInvocation {
            path: go_mod.to_path_buf(),
            message,
        };

        let output = ProcessBuilder::new(&self.program)
            .args(["mod", "edit", "-json"])
            .cwd(dir)
            .exec_and_check()
            .map_err(|e| invocation_error(format!("{:#}", e)))?;

        let stdout = String::from_utf8(output.stdout)
            .map_err(|_| invocation_error("output is not UTF-8".to_string()))?;
        Self::parse_json(&stdout, go_mod)
    }
}

/// Parses go.mod text directly, without a Go toolchain.
///
/// Understands `module`, single-line and block `require` directives and
/// `//` comments; every other directive is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeModReader;

impl NativeModReader {
    pub fn parse(content: &str, go_mod: &Path) -> Result<GoMod, DepsError> {
        let mut module_path = None;
        let mut requires = Vec::new();
        // Directive name of the open `(` block, if any.
        let mut block: Option<&str> = None;

        for (index, raw_line) in content.lines().enumerate() {
            let line = strip_line_comment(raw_line);
            if line.is_empty() {
                continue;
            }
            let malformed = |message: &str| DepsError::MalformedLine {
                path: go_mod.to_path_buf(),
                line: index + 1,
                message: message.to_string(),
            };

            if let Some(directive) = block {
                if line == ")" {
                    block = None;
                } else if directive == "require" {
                    let require =
                        parse_require(line).ok_or_else(|| malformed("expected `path version`"))?;
                    requires.push(require);
                }
                continue;
            }

            let (directive, rest) = match line.split_once(char::is_whitespace) {
                Some((directive, rest)) => (directive, rest.trim()),
                None => (line, ""),
            };

            if rest == "(" {
                block = Some(directive);
                continue;
            }

            match directive {
                "module" => module_path = Some(unquote(rest).to_string()),
                "require" => {
                    let require = parse_require(rest)
                        .ok_or_else(|| malformed("expected `require path version`"))?;
                    requires.push(require);
                }
                _ => {}
            }
        }

        if block.is_some() {
            return Err(DepsError::MalformedLine {
                path: go_mod.to_path_buf(),
                line: content.lines().count(),
                message: "unterminated `(` block".to_string(),
            });
        }

        let module_path = module_path.ok_or_else(|| DepsError::MalformedLine {
            path: go_mod.to_path_buf(),
            line: 1,
            message: "missing `module` directive".to_string(),
        })?;

        Ok(GoMod {
            module_path,
            requires,
        })
    }
}

impl ModuleReader for NativeModReader {
    fn read(&self, go_mod: &Path) -> Result<GoMod, DepsError> {
        let content = std::fs::read_to_string(go_mod).map_err(|source| DepsError::Read {
            path: go_mod.to_path_buf(),
            source,
        })?;
        Self::parse(&content, go_mod)
    }
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        Some(index) => line[..index].trim(),
        None => line.trim(),
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_require(spec: &str) -> Option<GoRequire> {
    let mut parts = spec.split_whitespace();
    let path = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some(GoRequire::new(unquote(path), version))
}
