//! Configuration loading and schema.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{AriaConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, SkillsConfig};

pub use crate::error::{ConfigError, ConfigResult};

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<AriaConfig> {
    ConfigLoader::new().load()
}
