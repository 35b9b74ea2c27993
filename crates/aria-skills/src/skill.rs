//! Skill identity and lifecycle.
//!
//! A [`SkillHandle`] is the cheap, clonable identity of one loaded skill:
//! its unique id, name, bus connection, cached [`MessageContext`] and
//! settings. Handlers receive a handle as their first argument.
//!
//! A [`SkillInstance`] bundles the handle with the per-skill registries
//! (events, intents) and the process-wide fallback chain, and owns the
//! shutdown path that detaches everything the skill registered.
//!
//! Skills themselves implement the [`Skill`] trait and register their
//! handlers directly in [`Skill::initialize`] — there is no hidden
//! registration queue drained behind the scenes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use aria_core::{
    IntoIntent, Message, MessageBus, MessageContext, SkillResult, SubscriptionId, callback, kinds,
};

use crate::events::EventRegistry;
use crate::fallback::{FallbackHandler, FallbackService, RemoveOutcome};
use crate::handler::IntentHandler;
use crate::intents::IntentRegistrar;
use crate::settings::SkillSettings;

// =============================================================================
// SkillHandle
// =============================================================================

struct SkillShared {
    id: u32,
    name: String,
    language: String,
    root: Option<PathBuf>,
    bus: Arc<dyn MessageBus>,
    context: RwLock<MessageContext>,
    settings: SkillSettings,
}

/// Shared identity of one loaded skill.
///
/// Cloning is cheap (a single `Arc`); every clone refers to the same cached
/// context and settings.
#[derive(Clone)]
pub struct SkillHandle {
    inner: Arc<SkillShared>,
}

impl SkillHandle {
    /// Creates a handle for a skill instance.
    ///
    /// `root` is the skill's load location; it determines both the settings
    /// file location and the fallback owner key. Skills without a root get
    /// memory-only settings and fall back to their name as owner key.
    pub fn new(
        id: u32,
        name: impl Into<String>,
        language: impl Into<String>,
        root: Option<PathBuf>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        let name = name.into();
        let settings = match &root {
            Some(dir) => SkillSettings::load(dir),
            None => SkillSettings::in_memory(),
        };
        Self {
            inner: Arc::new(SkillShared {
                id,
                context: RwLock::new(MessageContext::for_skill(&name)),
                name,
                language: language.into(),
                root,
                bus,
                settings,
            }),
        }
    }

    /// The instance's unique numeric id.
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// The skill's display name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The language this instance serves, e.g. `"en-us"`.
    pub fn language(&self) -> &str {
        &self.inner.language
    }

    /// The skill's load location, if it has one.
    pub fn root(&self) -> Option<&Path> {
        self.inner.root.as_deref()
    }

    /// The bus this skill is bound to.
    pub fn bus(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.inner.bus)
    }

    /// The skill's persistent settings.
    pub fn settings(&self) -> &SkillSettings {
        &self.inner.settings
    }

    /// Owner key for fallback registration: the last component of the load
    /// location, or the skill name when there is none.
    pub fn owner_key(&self) -> String {
        self.inner
            .root
            .as_deref()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.inner.name.clone())
    }

    /// Prefixes a local name with this instance's id: `"7:weather"`.
    ///
    /// Published intent and scheduled-event names always go through this, so
    /// two skills choosing the same local name never collide on the bus.
    pub fn scoped_name(&self, local: &str) -> String {
        format!("{}:{}", self.inner.id, local)
    }

    /// A copy of the skill's cached message context.
    pub fn message_context(&self) -> MessageContext {
        self.inner.context.read().clone()
    }

    /// Updates the cached context from an incoming message.
    ///
    /// Fields absent on the message inherit the previously cached values;
    /// `source` is always stamped with this skill's name.
    pub fn refresh_context(&self, message: &Message) {
        let mut cached = self.inner.context.write();
        let mut resolved = message.context.inherit(&cached);
        resolved.source = Some(self.inner.name.clone());
        *cached = resolved;
    }

    /// Speaks `utterance` through the speech stack, using the cached context.
    pub async fn speak(&self, utterance: &str, expect_response: bool) {
        let message = Message::new(kinds::SPEAK)
            .with_data("utterance", json!(utterance))
            .with_data("expect_response", json!(expect_response))
            .with_data("metadata", Value::Object(Map::new()))
            .with_context(self.message_context());
        self.inner.bus.emit(message).await;
    }

    /// Adds a keyword to the intent service's conversational context.
    pub async fn set_context(&self, context: &str, word: &str) {
        self.inner
            .bus
            .emit(
                Message::new(kinds::ADD_CONTEXT)
                    .with_data("context", json!(context))
                    .with_data("word", json!(word)),
            )
            .await;
    }

    /// Removes a keyword from the intent service's conversational context.
    pub async fn remove_context(&self, context: &str) {
        self.inner
            .bus
            .emit(Message::new(kinds::REMOVE_CONTEXT).with_data("context", json!(context)))
            .await;
    }

    /// Registers a vocabulary word under a keyword type.
    pub async fn register_vocabulary(&self, entity: &str, entity_type: &str) {
        self.inner
            .bus
            .emit(
                Message::new(kinds::REGISTER_VOCAB)
                    .with_data("start", json!(entity))
                    .with_data("end", json!(entity_type)),
            )
            .await;
    }

    /// Registers a regular expression with the intent service.
    ///
    /// The pattern is forwarded verbatim; compilation happens in the intent
    /// service, which owns vocabulary handling.
    pub async fn register_regex(&self, pattern: &str) {
        self.inner
            .bus
            .emit(Message::new(kinds::REGISTER_VOCAB).with_data("regex", json!(pattern)))
            .await;
    }

    /// Bumps this skill onto the intent service's active-skill list.
    pub async fn make_active(&self) {
        self.inner
            .bus
            .emit(Message::new(kinds::ACTIVE_SKILL_REQUEST).with_data("skill_id", json!(self.id())))
            .await;
    }
}

impl std::fmt::Debug for SkillHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

// =============================================================================
// Skill trait
// =============================================================================

/// Base trait implemented by every skill.
///
/// The host creates a [`SkillInstance`] and passes it to
/// [`initialize`](Skill::initialize); the skill registers its intents,
/// events and fallbacks there, directly against the instance.
#[async_trait]
pub trait Skill: Send + Sync {
    /// The skill's display name.
    fn name(&self) -> &str;

    /// Sets up intent handlers and fallbacks. Errors abort the load.
    async fn initialize(&self, skill: &SkillInstance) -> SkillResult<()>;

    /// Called during shutdown, after the instance detached its registrations.
    async fn stop(&self) {}
}

// =============================================================================
// SkillInstance
// =============================================================================

/// A live skill instance: handle plus registries.
///
/// All registration methods take `&self`; the registries use interior
/// mutability and are owned exclusively by this instance.
pub struct SkillInstance {
    handle: SkillHandle,
    events: Arc<EventRegistry>,
    intents: Arc<IntentRegistrar>,
    fallback: Arc<FallbackService>,
    own_fallbacks: Mutex<Vec<FallbackHandler>>,
    bindings: Mutex<Vec<(String, SubscriptionId)>>,
}

impl SkillInstance {
    /// Creates an instance around `handle`, wired to the shared fallback
    /// service, and binds the `enable_intent` / `disable_intent` bus events.
    pub fn new(handle: SkillHandle, fallback: Arc<FallbackService>) -> Self {
        let events = Arc::new(EventRegistry::new(handle.clone()));
        let intents = Arc::new(IntentRegistrar::new(handle.clone()));

        let mut bindings = Vec::new();
        for (event, enable) in [("enable_intent", true), ("disable_intent", false)] {
            let intents = Arc::clone(&intents);
            let id = handle.bus().on(
                event,
                callback(move |message: Message| {
                    let intents = Arc::clone(&intents);
                    async move {
                        if let Some(name) = message.data_str("intent_name") {
                            if enable {
                                intents.enable(name).await;
                            } else {
                                intents.disable(name).await;
                            }
                        }
                    }
                }),
            );
            bindings.push((event.to_string(), id));
        }

        Self {
            handle,
            events,
            intents,
            fallback,
            own_fallbacks: Mutex::new(Vec::new()),
            bindings: Mutex::new(bindings),
        }
    }

    /// The skill's shared handle.
    pub fn handle(&self) -> &SkillHandle {
        &self.handle
    }

    /// The per-skill event registry.
    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    /// The per-skill intent registrar.
    pub fn intents(&self) -> &IntentRegistrar {
        &self.intents
    }

    // ─── Event registration ──────────────────────────────────────────────────

    /// Subscribes `handler` (dispatch-wrapped) under `name`.
    pub fn add_event(&self, name: &str, handler: IntentHandler) -> SkillResult<()> {
        self.events.add(name, handler)
    }

    /// Removes a previously added event. Returns `false` if unknown.
    pub fn remove_event(&self, name: &str) -> bool {
        self.events.remove(name)
    }

    /// Schedules a one-shot timed event with the scheduler service.
    pub async fn schedule_event(
        &self,
        name: &str,
        when: SystemTime,
        data: Map<String, Value>,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        self.events.schedule(name, when, None, data, handler).await
    }

    /// Schedules a repeating timed event with the scheduler service.
    pub async fn schedule_repeating_event(
        &self,
        name: &str,
        when: SystemTime,
        interval: Duration,
        data: Map<String, Value>,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        self.events
            .schedule(name, when, Some(interval), data, handler)
            .await
    }

    /// Requests a payload change for a scheduled event.
    pub async fn update_scheduled_event(&self, name: &str, data: Map<String, Value>) {
        self.events.update_scheduled(name, data).await;
    }

    /// Cancels a scheduled event and drops its local handler.
    pub async fn cancel_scheduled_event(&self, name: &str) {
        self.events.cancel_scheduled(name).await;
    }

    // ─── Intent registration ─────────────────────────────────────────────────

    /// Registers an intent (spec or builder) with the intent service.
    pub async fn register_intent(
        &self,
        intent: impl IntoIntent,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        self.intents.register(&self.events, intent, handler).await
    }

    /// Registers an intent backed by a file of example phrases.
    pub async fn register_intent_file(
        &self,
        intent_file: &str,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        self.intents
            .register_file(&self.events, intent_file, handler)
            .await
    }

    /// Disables a registered intent. Idempotent.
    pub async fn disable_intent(&self, local_name: &str) -> bool {
        self.intents.disable(local_name).await
    }

    /// Re-enables a disabled intent. Idempotent.
    pub async fn enable_intent(&self, local_name: &str) -> bool {
        self.intents.enable(local_name).await
    }

    // ─── Fallback registration ───────────────────────────────────────────────

    /// Registers a fallback handler with the process-wide chain.
    ///
    /// Returns the priority actually assigned, which may exceed `priority`
    /// when the requested slot was taken.
    pub fn register_fallback(&self, handler: FallbackHandler, priority: u32) -> u32 {
        self.own_fallbacks.lock().push(Arc::clone(&handler));
        self.fallback.register(&self.handle, handler, priority)
    }

    /// Removes one fallback handler from the chain.
    pub fn remove_fallback(&self, handler: &FallbackHandler) -> RemoveOutcome {
        self.own_fallbacks
            .lock()
            .retain(|own| !Arc::ptr_eq(own, handler));
        self.fallback.remove(handler)
    }

    // ─── Shutdown ────────────────────────────────────────────────────────────

    /// Tears the instance down: persists settings, removes this instance's
    /// fallbacks, detaches every registered intent and event, and announces
    /// the departure with `detach_skill`.
    ///
    /// Safe to call after individual events or fallbacks were already
    /// removed.
    pub async fn shutdown(&self) {
        if let Err(error) = self.handle.settings().store() {
            warn!(skill = %self.handle.name(), %error, "Could not persist settings on shutdown");
        }

        let own: Vec<FallbackHandler> = self.own_fallbacks.lock().drain(..).collect();
        for handler in own {
            self.fallback.remove(&handler);
        }

        self.intents.detach().await;
        self.events.remove_all();

        let bus = self.handle.bus();
        for (event, id) in self.bindings.lock().drain(..) {
            bus.off(&event, id);
        }

        bus.emit(
            Message::new(kinds::DETACH_SKILL)
                .with_data("skill_id", json!(format!("{}:", self.handle.id()))),
        )
        .await;

        info!(skill = %self.handle.name(), id = self.handle.id(), "Skill shut down");
    }
}
