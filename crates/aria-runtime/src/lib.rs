//! Aria Runtime - Orchestration layer for the Aria voice-skill platform.
//!
//! This crate provides:
//! - The [`SkillHost`]: explicit lifecycle owner of the shared fallback
//!   service, skill-id allocation, and skill loading
//! - Configuration loading (`figment`-based, TOML + environment)
//! - Logging configuration over `tracing-subscriber`
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aria_core::LocalBus;
//! use aria_runtime::{SkillHost, config::load_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let bus = Arc::new(LocalBus::new());
//!     let host = SkillHost::init(config, bus);
//!
//!     let weather = host.load(Arc::new(WeatherSkill::default()), None).await?;
//!     // … run until shutdown …
//!     weather.shutdown().await;
//!     host.shutdown();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logging;

pub use config::{AriaConfig, ConfigLoader, SkillsConfig, load_config};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult};
pub use host::{LoadedSkill, SkillHost};
pub use logging::LoggingBuilder;

// Re-export tracing for use by skills.
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::config::{AriaConfig, load_config};
    pub use super::host::{LoadedSkill, SkillHost};
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
