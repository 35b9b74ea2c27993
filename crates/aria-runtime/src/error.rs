//! Runtime error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration could not be parsed or extracted.
    #[error("configuration parse error: {0}")]
    Parse(String),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur during host operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Configuration loading failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A skill failed to register its handlers during load.
    #[error("skill load failed: {0}")]
    SkillLoad(#[from] aria_core::SkillError),
}

/// Result type for host operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
