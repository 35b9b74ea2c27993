//! Configuration loader using figment.
//!
//! Sources are layered, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. `aria.toml` / `config.toml` found in the search paths (current
//!    directory and the user config directory by default)
//! 3. Environment variables (`ARIA_*`)
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `ARIA_` prefix with `__` as separator:
//!
//! - `ARIA_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `ARIA_SKILLS__FALLBACK_OVERRIDE=true` → `skills.fallback_override = true`
//!
//! # Example
//!
//! ```rust,ignore
//! use aria_runtime::config::ConfigLoader;
//!
//! // Default locations plus environment overrides.
//! let config = ConfigLoader::new().load()?;
//!
//! // A specific file, no environment.
//! let config = ConfigLoader::new()
//!     .file("./config/aria.toml")
//!     .without_env()
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace, warn};

use super::schema::AriaConfig;
use crate::error::{ConfigError, ConfigResult};

/// File names searched, in order, in each search path.
const CONFIG_FILE_NAMES: &[&str] = &["aria.toml", "config.toml"];

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader with default search paths and environment loading.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load, skipping the search.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<AriaConfig> {
        let figment = self.build_figment()?;

        let config: AriaConfig = figment
            .extract()
            .map_err(|e| ConfigError::Parse(format!("failed to extract configuration: {e}")))?;

        debug!(
            logging_level = %config.logging.level,
            fallback_override = config.skills.fallback_override,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Builds the figment instance with all sources.
    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(AriaConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(path));
        } else {
            figment = self.search_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with ARIA_ prefix");
            figment = figment.merge(Env::prefixed("ARIA_").split("__"));
        }

        Ok(figment)
    }

    /// Resolves the effective list of search paths.
    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("aria"));
        }
        paths
    }

    /// Searches for and merges the first configuration file found.
    fn search_config_files(&self, mut figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for name in CONFIG_FILE_NAMES {
                let path = search_path.join(name);
                if path.exists() {
                    info!(path = %path.display(), "Loading configuration file");
                    figment = figment.merge(Toml::file(path));
                    return figment;
                }
            }
        }
        warn!("No configuration file found, using defaults");
        figment
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_loads() {
        let config = ConfigLoader::new().without_env().load().unwrap();

        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.skills.language, "en-us");
        assert!(!config.skills.fallback_override);
        assert_eq!(config.skills.fallback_event, "intent_failure");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = ConfigLoader::new()
            .file("/no/such/aria.toml")
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn env_overrides_defaults() {
        // SAFETY: this test is the only writer of this variable and removes
        // it immediately after.
        unsafe {
            std::env::set_var("ARIA_SKILLS__FALLBACK_OVERRIDE", "true");
        }
        let config = ConfigLoader::new().load().unwrap();
        assert!(config.skills.fallback_override);
        unsafe {
            std::env::remove_var("ARIA_SKILLS__FALLBACK_OVERRIDE");
        }
    }
}
