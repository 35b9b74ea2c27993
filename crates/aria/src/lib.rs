//! # Aria
//!
//! The dispatch core of a modular voice-skill platform.
//!
//! ## Overview
//!
//! Aria routes events published on a shared message bus to handlers owned by
//! independently loaded skills, and resolves utterances that no specific
//! intent matched through an ordered fallback chain.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────────┐    ┌──────────────────────────────┐
//! │ Intent svc  │───▶│   MessageBus    │───▶│ Skill instances              │
//! │ (external)  │    │                 │    │  · dispatch-wrapped handlers │
//! └─────────────┘    │  intent_failure │    │  · event / intent registries │
//!                    │        │        │    └──────────────────────────────┘
//!                    │        ▼        │    ┌──────────────────────────────┐
//!                    │ FallbackService │───▶│ fallback chain (shared)      │
//!                    └─────────────────┘    └──────────────────────────────┘
//! ```
//!
//! - **aria-core**: bus interface, message/context model, intent specs,
//!   error types
//! - **aria-skills**: dispatch wrapper, per-skill registries, fallback chain
//! - **aria-runtime**: skill host lifecycle, configuration, logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use aria::prelude::*;
//! use std::sync::Arc;
//!
//! struct WeatherSkill;
//!
//! #[async_trait::async_trait]
//! impl Skill for WeatherSkill {
//!     fn name(&self) -> &str { "WeatherSkill" }
//!
//!     async fn initialize(&self, skill: &SkillInstance) -> SkillResult<()> {
//!         skill.register_intent(
//!             IntentBuilder::new("weather").require("WeatherKeyword"),
//!             handler(|skill, _message| async move {
//!                 skill.speak("It is sunny", false).await;
//!                 Ok(())
//!             }),
//!         ).await
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = aria::config::load_config()?;
//!     let bus = Arc::new(LocalBus::new());
//!     let host = SkillHost::init(config, bus);
//!     let weather = host.load(Arc::new(WeatherSkill), None).await?;
//!     // … run …
//!     weather.shutdown().await;
//!     host.shutdown();
//!     Ok(())
//! }
//! ```

pub use aria_core::{
    BusCallback, HandlerError, HandlerResult, IntentBuilder, IntentError, IntentSpec, IntoIntent,
    LocalBus, Message, MessageBus, MessageContext, SkillError, SkillResult, SubscriptionId,
    callback, kinds,
};
pub use aria_runtime::{
    AriaConfig, ConfigError, ConfigResult, LoadedSkill, RuntimeError, RuntimeResult, SkillHost,
    config, logging,
};
pub use aria_skills::{
    EventRegistry, FallbackHandler, FallbackService, IntentHandler, IntentRegistrar, RemoveOutcome,
    Resolution, ResolutionPolicy, SettingsError, Skill, SkillHandle, SkillInstance, SkillSettings,
    fallback, handler, message_only, no_args,
};

/// Prelude for common imports.
pub mod prelude {
    pub use aria_core::prelude::*;
    pub use aria_runtime::prelude::*;
    pub use aria_skills::prelude::*;
}
