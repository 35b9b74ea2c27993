//! # Aria Core
//!
//! Foundation layer of the Aria voice-skill platform: the message bus
//! interface, the message/context data model, intent specifications, and the
//! unified error types shared by every other crate in the workspace.
//!
//! ## Architecture
//!
//! Everything in the platform communicates over a publish/subscribe bus:
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌──────────────────────────┐
//! │ Intent svc   │────▶│ MessageBus  │────▶│ Skill "weather" handlers │
//! │ (external)   │     │  (trait)    │────▶│ Skill "wiki" handlers    │
//! └──────────────┘     └─────────────┘────▶│ Fallback chain           │
//!                                          └──────────────────────────┘
//! ```
//!
//! - [`MessageBus`] is the transport interface; [`LocalBus`] is the
//!   in-process implementation.
//! - [`Message`] / [`MessageContext`] are the payload and routing-metadata
//!   types; well-known kinds live in [`kinds`].
//! - [`IntentSpec`] / [`IntentBuilder`] describe intents published to the
//!   intent service.
//! - [`HandlerError`] and [`SkillError`] split runtime handler failures
//!   (contained) from registration failures (raised to the caller).

pub mod bus;
pub mod error;
pub mod intent;
pub mod message;
pub mod testing;

pub use bus::{BusCallback, LocalBus, MessageBus, SubscriptionId, callback};
pub use error::{HandlerError, HandlerResult, SkillError, SkillResult};
pub use intent::{IntentBuilder, IntentError, IntentSpec, IntoIntent};
pub use message::{Message, MessageContext, kinds};

/// Prelude for common imports.
pub mod prelude {
    pub use super::bus::{BusCallback, LocalBus, MessageBus, SubscriptionId, callback};
    pub use super::error::{HandlerError, HandlerResult, SkillError, SkillResult};
    pub use super::intent::{IntentBuilder, IntentError, IntentSpec, IntoIntent};
    pub use super::message::{Message, MessageContext, kinds};
}
