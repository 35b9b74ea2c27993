//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use aria_skills::ResolutionPolicy;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AriaConfig {
    /// Skill dispatch settings.
    #[serde(default)]
    pub skills: SkillsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Skill dispatch settings.
///
/// The fallback policy is fixed here for the lifetime of the run: dispatch
/// reads it once when the host is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsConfig {
    /// Language served by loaded skills, e.g. `"en-us"`.
    #[serde(default = "default_language")]
    pub language: String,

    /// When `true`, the fallback chain follows `fallback_priority` instead
    /// of numeric priorities.
    #[serde(default)]
    pub fallback_override: bool,

    /// Owner keys, most-preferred first. Only consulted when
    /// `fallback_override` is set.
    #[serde(default)]
    pub fallback_priority: Vec<String>,

    /// Bus event that triggers a fallback resolution pass.
    #[serde(default = "default_fallback_event")]
    pub fallback_event: String,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            fallback_override: false,
            fallback_priority: Vec::new(),
            fallback_event: default_fallback_event(),
        }
    }
}

impl SkillsConfig {
    /// Maps the two config keys onto the chain's resolution policy.
    pub fn resolution_policy(&self) -> ResolutionPolicy {
        if self.fallback_override {
            ResolutionPolicy::Ordered(self.fallback_priority.clone())
        } else {
            ResolutionPolicy::Priority
        }
    }
}

fn default_language() -> String {
    "en-us".to_string()
}

fn default_fallback_event() -> String {
    "intent_failure".to_string()
}

// =============================================================================
// Logging configuration
// =============================================================================

/// Log verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose.
    Trace,
    /// Debug information.
    Debug,
    /// Normal operation (default).
    #[default]
    Info,
    /// Something unexpected but recoverable.
    Warn,
    /// Failures.
    Error,
}

impl LogLevel {
    /// The lowercase name, as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, abbreviated (default).
    #[default]
    Compact,
    /// Single-line with full metadata.
    Full,
    /// Multi-line, human-oriented.
    Pretty,
}

/// Log output destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output (default).
    #[default]
    Stdout,
    /// Standard error.
    Stderr,
    /// A log file; requires `file_path`.
    File,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Output destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file path, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line number in log lines.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module level overrides, e.g. `aria_skills = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}
