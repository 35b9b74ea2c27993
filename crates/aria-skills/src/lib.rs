//! # Aria Skills
//!
//! The skill framework layer of the Aria voice-skill platform: everything a
//! loaded skill needs to take part in bus dispatch.
//!
//! - **Dispatch wrapper** ([`handler`]): turns an intent handler into a bus
//!   callback bracketed by `handler.start` / `handler.complete` lifecycle
//!   events, with failures contained at the boundary.
//! - **Event registry** ([`events`]): the per-skill set of bus
//!   subscriptions, bulk-detached on shutdown, plus the scheduler-facing
//!   operations.
//! - **Intent registrar** ([`intents`]): intent and intent-file registration
//!   with id-namespaced names and enable/disable support.
//! - **Fallback chain** ([`fallback`]): the process-wide registry of
//!   last-resort handlers and its two resolution policies.
//! - **Skill identity** ([`skill`]): [`SkillHandle`], [`SkillInstance`] and
//!   the [`Skill`] trait skills implement.
//! - **Settings** ([`settings`]): per-skill persistent key/value settings.
//!
//! ```text
//!                      ┌────────────────────────────────────────────┐
//!  intent matched ────▶│ dispatch wrapper → skill handler           │
//!                      ├────────────────────────────────────────────┤
//!  nothing matched ───▶│ FallbackService::resolve → fallback chain  │
//!                      └────────────────────────────────────────────┘
//! ```

pub mod events;
pub mod fallback;
pub mod handler;
pub mod intents;
pub mod settings;
pub mod skill;

pub use events::EventRegistry;
pub use fallback::{
    FallbackFuture, FallbackHandler, FallbackService, RemoveOutcome, Resolution, ResolutionPolicy,
    fallback,
};
pub use handler::{HandlerFuture, IntentHandler, handler, message_only, no_args};
pub use intents::IntentRegistrar;
pub use settings::{SETTINGS_FILE, SettingsError, SkillSettings};
pub use skill::{Skill, SkillHandle, SkillInstance};

/// Prelude for common imports.
pub mod prelude {
    pub use super::fallback::{
        FallbackHandler, FallbackService, Resolution, ResolutionPolicy, fallback,
    };
    pub use super::handler::{IntentHandler, handler, message_only, no_args};
    pub use super::skill::{Skill, SkillHandle, SkillInstance};
}
