//! Configuration file support for chaos.
//!
//! Two configuration file locations are read:
//! - Global: `~/.chaos/config.toml` - user-wide defaults
//! - Project: `<project>/.chaos/config.toml` - project-specific overrides
//!
//! Project config takes precedence over global config. Every field is
//! optional so that a layer only overrides what it sets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::deps::ModuleReaderKind;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_REQUIREMENTS: &str = "requirements.txt";
pub const DEFAULT_EXECUTOR: &str = "bazelisk";
pub const DEFAULT_GO: &str = "go";

/// chaos configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generated server settings
    pub server: ServerConfig,

    /// Build executor settings
    pub executor: ExecutorConfig,

    /// Go toolchain settings
    pub go: GoConfig,
}

/// Settings baked into generated server entrypoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen host
    pub host: Option<String>,

    /// Listen port
    pub port: Option<u16>,

    /// Project-wide Python server requirements, relative to the manifest
    pub requirements: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Program used to run generated targets
    pub program: Option<String>,

    /// Extra arguments placed between `run` and the target label
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GoConfig {
    /// Go toolchain program
    pub program: Option<String>,

    /// How go.mod files are read (`command` or `native`)
    pub module_reader: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.server.host.is_some() {
            self.server.host = other.server.host;
        }
        if other.server.port.is_some() {
            self.server.port = other.server.port;
        }
        if other.server.requirements.is_some() {
            self.server.requirements = other.server.requirements;
        }

        if other.executor.program.is_some() {
            self.executor.program = other.executor.program;
        }
        if !other.executor.args.is_empty() {
            self.executor.args = other.executor.args;
        }

        if other.go.program.is_some() {
            self.go.program = other.go.program;
        }
        if other.go.module_reader.is_some() {
            self.go.module_reader = other.go.module_reader;
        }
    }

    pub fn host(&self) -> &str {
        self.server.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn server_requirements(&self) -> &str {
        self.server
            .requirements
            .as_deref()
            .unwrap_or(DEFAULT_SERVER_REQUIREMENTS)
    }

    pub fn executor_program(&self) -> &str {
        self.executor.program.as_deref().unwrap_or(DEFAULT_EXECUTOR)
    }

    pub fn go_program(&self) -> &str {
        self.go.program.as_deref().unwrap_or(DEFAULT_GO)
    }

    /// Parse the go.mod reader kind; unknown values fall back to the default.
    pub fn module_reader(&self) -> ModuleReaderKind {
        match self.go.module_reader.as_deref() {
            None => ModuleReaderKind::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("{}; using `{}`", e, ModuleReaderKind::default());
                ModuleReaderKind::default()
            }),
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.chaos/config.toml)
/// 2. Global config (~/.chaos/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }
    config.merge(Config::load_or_default(project_path));

    config
}

/// Get the global chaos config directory (~/.chaos).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".chaos"))
}

/// Get the global config path (~/.chaos/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.chaos/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".chaos").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.server_requirements(), "requirements.txt");
        assert_eq!(config.executor_program(), "bazelisk");
        assert_eq!(config.go_program(), "go");
        assert_eq!(config.module_reader(), ModuleReaderKind::Command);
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[server]
host = "0.0.0.0"
port = 9000

[executor]
program = "bazel"
args = ["--config=ci"]

[go]
module_reader = "native"
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.port(), 9000);
        assert_eq!(config.executor_program(), "bazel");
        assert_eq!(config.executor.args, vec!["--config=ci"]);
        assert_eq!(config.module_reader(), ModuleReaderKind::Native);
    }

    #[test]
    fn test_broken_config_falls_back() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[server\nport = ").unwrap();

        let config = Config::load_or_default(&config_path);
        assert_eq!(config.port(), 8080);
    }

    #[test]
    fn test_unknown_module_reader_falls_back() {
        let mut config = Config::default();
        config.go.module_reader = Some("magic".to_string());
        assert_eq!(config.module_reader(), ModuleReaderKind::Command);
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = tmp.path().join("project.toml");

        std::fs::write(
            &global_path,
            r#"
[server]
host = "0.0.0.0"
port = 9000
"#,
        )
        .unwrap();
        std::fs::write(
            &project_path,
            r#"
[server]
port = 7000
"#,
        )
        .unwrap();

        let config = load_config(Some(&global_path), &project_path);
        assert_eq!(config.port(), 7000);
        assert_eq!(config.host(), "0.0.0.0");
    }

    #[test]
    fn test_project_config_path() {
        let path = project_config_path(Path::new("/project"));
        assert_eq!(path, PathBuf::from("/project/.chaos/config.toml"));
    }
}
