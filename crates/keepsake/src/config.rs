//! Configuration management for keepsake.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/keepsake/config.json`
//! 2. Environment variable: `KEEPSAKE_CONFIG_CONTENT`
//! 3. Project config: `keepsake.jsonc` or `keepsake.json` in the project directory
//!
//! Later sources override earlier ones. Files may contain `//` and `/* */`
//! comments.

use keepsake_history::DEFAULT_MAX_VERSIONS;
use keepsake_util::log::LogLevel;
use keepsake_watch::{DEFAULT_IGNORED, DEFAULT_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding inline configuration.
pub const CONFIG_CONTENT_ENV: &str = "KEEPSAKE_CONFIG_CONTENT";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// User-facing configuration. Every field is optional; accessors supply defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepsakeConfig {
    /// Versions retained per file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_versions: Option<usize>,

    /// Watcher poll interval in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Extra entry names the watcher skips, on top of the built-in list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
}

impl KeepsakeConfig {
    /// Load configuration from all sources.
    ///
    /// Returns the merged configuration and the files it was read from.
    pub async fn load(project_dir: &Path) -> ConfigResult<(Self, Vec<PathBuf>)> {
        let global_dir = keepsake_util::path::config_dir();
        let env_content = std::env::var(CONFIG_CONTENT_ENV).ok();
        Self::load_from(global_dir.as_deref(), env_content.as_deref(), project_dir).await
    }

    /// Load from explicit sources.
    pub async fn load_from(
        global_dir: Option<&Path>,
        env_content: Option<&str>,
        project_dir: &Path,
    ) -> ConfigResult<(Self, Vec<PathBuf>)> {
        let mut config = KeepsakeConfig::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = global_dir {
            let path = global_dir.join("config.json");
            if path.exists() {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
            }
        }

        if let Some(content) = env_content {
            config = config.merge(Self::parse_jsonc(content, "<env>")?);
        }

        for name in ["keepsake.jsonc", "keepsake.json"] {
            let path = project_dir.join(name);
            if path.exists() {
                config = config.merge(Self::load_file(&path).await?);
                sources.push(path);
                break;
            }
        }

        config.validate()?;
        tracing::debug!(sources = sources.len(), "Loaded configuration");
        Ok((config, sources))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> ConfigResult<Self> {
        let stripped = strip_comments(content);
        serde_json::from_str(&stripped).map_err(|e| ConfigError::InvalidJson {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Merge `other` into `self`; values in `other` win, ignore lists concatenate.
    pub fn merge(self, other: Self) -> Self {
        Self {
            max_versions: other.max_versions.or(self.max_versions),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            log_level: other.log_level.or(self.log_level),
            ignore: match (self.ignore, other.ignore) {
                (Some(mut base), Some(extra)) => {
                    base.extend(extra);
                    Some(base)
                }
                (base, None) => base,
                (None, extra) => extra,
            },
        }
    }

    /// Reject values that cannot be honored.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_versions == Some(0) {
            return Err(validation("max_versions must be at least 1"));
        }
        if self.poll_interval_ms == Some(0) {
            return Err(validation("poll_interval_ms must be at least 1"));
        }
        if let Some(level) = &self.log_level {
            if LogLevel::parse(level).is_none() {
                return Err(validation(format!("unknown log_level '{level}'")));
            }
        }
        Ok(())
    }

    pub fn max_versions(&self) -> usize {
        self.max_versions.unwrap_or(DEFAULT_MAX_VERSIONS)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Warn)
    }

    /// Built-in ignored names followed by the configured extras.
    pub fn ignored(&self) -> Vec<String> {
        let mut ignored: Vec<String> = DEFAULT_IGNORED.iter().map(|s| s.to_string()).collect();
        for extra in self.ignore.iter().flatten() {
            if !ignored.contains(extra) {
                ignored.push(extra.clone());
            }
        }
        ignored
    }
}

fn validation(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

/// Strip `//` and `/* */` comments outside of string literals.
fn strip_comments(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    let mut escape_next = false;

    while let Some(c) = chars.next() {
        if escape_next {
            result.push(c);
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            result.push(c);
            continue;
        }

        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                result.push(c);
            }
            ('/', Some('/')) => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        result.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    // Keep line numbers in parse errors accurate.
                    if c == '\n' {
                        result.push('\n');
                    }
                    prev = c;
                }
            }
            _ => result.push(c),
        }
    }

    result
}
