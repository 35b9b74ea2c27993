//! Per-skill intent registrar.
//!
//! Registers named intents and intent-file bindings with the intent service
//! over the bus. Published names are always namespaced with the owning
//! instance's id (`"7:weather"`), so two skills choosing the same local name
//! never collide.
//!
//! Enable/disable moves an intent between the enabled and disabled sets and
//! publishes `register_intent` / `detach_intent` accordingly; the underlying
//! bus subscription stays in place either way, so toggling an intent is pure
//! registration traffic with no re-subscribe churn.

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use aria_core::{IntentSpec, IntoIntent, Message, SkillError, SkillResult, kinds};

use crate::events::EventRegistry;
use crate::handler::IntentHandler;
use crate::skill::SkillHandle;

#[derive(Default)]
struct IntentState {
    enabled: Vec<(String, IntentSpec)>,
    disabled: Vec<(String, IntentSpec)>,
}

impl IntentState {
    fn knows(&self, local_name: &str) -> bool {
        self.enabled.iter().any(|(name, _)| name == local_name)
            || self.disabled.iter().any(|(name, _)| name == local_name)
    }
}

/// Records the intents one skill instance registered with the intent service.
pub struct IntentRegistrar {
    skill: SkillHandle,
    state: Mutex<IntentState>,
}

impl IntentRegistrar {
    pub(crate) fn new(skill: SkillHandle) -> Self {
        Self {
            skill,
            state: Mutex::new(IntentState::default()),
        }
    }

    /// Builds the `register_intent` message for `spec`, with the namespaced
    /// name substituted into the payload.
    fn registration_message(&self, spec: &IntentSpec) -> Message {
        let mut scoped = spec.clone();
        scoped.name = self.skill.scoped_name(&spec.name);
        let data = match serde_json::to_value(&scoped) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Message::new(kinds::REGISTER_INTENT).with_data_map(data)
    }

    /// Registers an intent with the intent service.
    ///
    /// Accepts a built [`IntentSpec`] or an
    /// [`IntentBuilder`](aria_core::IntentBuilder); either way the
    /// specification is validated and an invalid one fails synchronously.
    /// Subscribes the dispatch-wrapped `handler` under the namespaced name.
    pub async fn register(
        &self,
        events: &EventRegistry,
        intent: impl IntoIntent,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        let spec = intent.into_intent().map_err(SkillError::InvalidIntent)?;

        {
            let state = self.state.lock();
            if state.knows(&spec.name) {
                return Err(SkillError::DuplicateIntent(spec.name.clone()));
            }
        }

        let scoped = self.skill.scoped_name(&spec.name);
        events.add(&scoped, handler)?;

        let message = self.registration_message(&spec);
        self.state
            .lock()
            .enabled
            .push((spec.name.clone(), spec.clone()));
        self.skill.bus().emit(message).await;

        debug!(skill = %self.skill.name(), intent = %scoped, "Intent registered");
        Ok(())
    }

    /// Registers an intent backed by a file of example phrases.
    ///
    /// The file itself is consumed by the fuzzy-matching collaborator; this
    /// side only publishes the binding and subscribes the handler under the
    /// namespaced name.
    pub async fn register_file(
        &self,
        events: &EventRegistry,
        intent_file: &str,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        let scoped = self.skill.scoped_name(intent_file);
        events.add(&scoped, handler)?;

        let file_name = match self.skill.root() {
            Some(root) => root
                .join("vocab")
                .join(self.skill.language())
                .join(intent_file)
                .display()
                .to_string(),
            None => intent_file.to_string(),
        };
        self.skill
            .bus()
            .emit(
                Message::new(kinds::REGISTER_INTENT_FILE)
                    .with_data("file_name", json!(file_name))
                    .with_data("intent_name", json!(scoped)),
            )
            .await;

        debug!(skill = %self.skill.name(), intent = %scoped, "Intent file registered");
        Ok(())
    }

    /// Disables an enabled intent, telling the intent service to stop
    /// routing to it. Returns `false` (and does nothing) if the intent is
    /// not currently enabled.
    pub async fn disable(&self, local_name: &str) -> bool {
        let found = {
            let mut state = self.state.lock();
            let position = state.enabled.iter().position(|(name, _)| name == local_name);
            position.map(|index| {
                let entry = state.enabled.remove(index);
                state.disabled.push(entry);
            })
        };
        if found.is_none() {
            return false;
        }

        let scoped = self.skill.scoped_name(local_name);
        self.skill
            .bus()
            .emit(Message::new(kinds::DETACH_INTENT).with_data("intent_name", json!(scoped)))
            .await;
        debug!(skill = %self.skill.name(), intent = %scoped, "Intent disabled");
        true
    }

    /// Re-enables a disabled intent by re-publishing its registration.
    /// Returns `false` (and does nothing) if the intent is not currently
    /// disabled.
    pub async fn enable(&self, local_name: &str) -> bool {
        let spec = {
            let mut state = self.state.lock();
            let position = state
                .disabled
                .iter()
                .position(|(name, _)| name == local_name);
            position.map(|index| {
                let entry = state.disabled.remove(index);
                let spec = entry.1.clone();
                state.enabled.push(entry);
                spec
            })
        };
        let Some(spec) = spec else {
            return false;
        };

        self.skill.bus().emit(self.registration_message(&spec)).await;
        info!(skill = %self.skill.name(), intent = %local_name, "Intent re-enabled");
        true
    }

    /// Publishes `detach_intent` for every currently enabled intent.
    pub async fn detach(&self) {
        let scoped_names: Vec<String> = self
            .state
            .lock()
            .enabled
            .iter()
            .map(|(name, _)| self.skill.scoped_name(name))
            .collect();

        let bus = self.skill.bus();
        for name in scoped_names {
            bus.emit(Message::new(kinds::DETACH_INTENT).with_data("intent_name", json!(name)))
                .await;
        }
    }

    /// Whether `local_name` is currently enabled.
    pub fn is_enabled(&self, local_name: &str) -> bool {
        self.state
            .lock()
            .enabled
            .iter()
            .any(|(name, _)| name == local_name)
    }

    /// Local names of all enabled intents, in registration order.
    pub fn enabled_names(&self) -> Vec<String> {
        self.state
            .lock()
            .enabled
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use aria_core::testing::{RecordingBus, recording_bus};
    use aria_core::{IntentBuilder, MessageBus};

    use crate::handler::handler;

    fn fixtures(bus: &Arc<RecordingBus>) -> (EventRegistry, IntentRegistrar) {
        let skill = SkillHandle::new(7, "WeatherSkill", "en-us", None, bus.clone());
        (
            EventRegistry::new(skill.clone()),
            IntentRegistrar::new(skill),
        )
    }

    fn noop() -> IntentHandler {
        handler(|_, _| async { Ok(()) })
    }

    #[tokio::test]
    async fn registration_publishes_namespaced_spec_and_subscribes() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);
        let count = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&count);
        intents
            .register(
                &events,
                IntentBuilder::new("weather").require("WeatherKeyword"),
                handler(move |_, _| {
                    let counted = Arc::clone(&counted);
                    async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .await
            .unwrap();

        let published = bus.emitted(kinds::REGISTER_INTENT);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].data_str("name"), Some("7:weather"));
        assert_eq!(published[0].data["requires"][0], json!("WeatherKeyword"));

        bus.emit(Message::new("7:weather")).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_spec_fails_synchronously() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);

        let err = intents
            .register(&events, IntentBuilder::new(""), noop())
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::InvalidIntent(_)));
        assert_eq!(bus.count(kinds::REGISTER_INTENT), 0);
    }

    #[tokio::test]
    async fn duplicate_local_names_are_rejected() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);

        intents
            .register(
                &events,
                IntentBuilder::new("weather").require("WeatherKeyword"),
                noop(),
            )
            .await
            .unwrap();
        let err = intents
            .register(
                &events,
                IntentBuilder::new("weather").require("OtherKeyword"),
                noop(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SkillError::DuplicateIntent(name) if name == "weather"));
    }

    #[tokio::test]
    async fn disable_emits_exact_namespaced_detach() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);

        intents
            .register(
                &events,
                IntentBuilder::new("weather").require("WeatherKeyword"),
                noop(),
            )
            .await
            .unwrap();

        assert!(intents.disable("weather").await);
        let detached = bus.emitted(kinds::DETACH_INTENT);
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].data_str("intent_name"), Some("7:weather"));

        // Idempotent: already disabled.
        assert!(!intents.disable("weather").await);
        assert_eq!(bus.count(kinds::DETACH_INTENT), 1);
    }

    #[tokio::test]
    async fn enable_republishes_registration() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);

        intents
            .register(
                &events,
                IntentBuilder::new("weather").require("WeatherKeyword"),
                noop(),
            )
            .await
            .unwrap();
        intents.disable("weather").await;
        bus.clear();

        assert!(intents.enable("weather").await);
        let published = bus.emitted(kinds::REGISTER_INTENT);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].data_str("name"), Some("7:weather"));
        assert!(intents.is_enabled("weather"));

        // Idempotent: already enabled.
        assert!(!intents.enable("weather").await);
    }

    #[tokio::test]
    async fn intent_file_registration_publishes_binding() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);

        intents
            .register_file(&events, "weather.intent", noop())
            .await
            .unwrap();

        let published = bus.emitted(kinds::REGISTER_INTENT_FILE);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].data_str("intent_name"), Some("7:weather.intent"));
        assert_eq!(published[0].data_str("file_name"), Some("weather.intent"));
    }

    #[tokio::test]
    async fn detach_covers_every_enabled_intent() {
        let bus = recording_bus();
        let (events, intents) = fixtures(&bus);

        for name in ["weather", "forecast"] {
            intents
                .register(
                    &events,
                    IntentBuilder::new(name).require("WeatherKeyword"),
                    noop(),
                )
                .await
                .unwrap();
        }
        intents.disable("forecast").await;
        bus.clear();

        intents.detach().await;
        let detached = bus.emitted(kinds::DETACH_INTENT);
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].data_str("intent_name"), Some("7:weather"));
    }
}
