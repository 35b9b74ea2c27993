//! Per-skill event registry.
//!
//! Tracks every bus subscription a skill instance owns so the whole set can
//! be detached in one pass on shutdown. Each `add` creates *two*
//! subscriptions under the event name: a small auxiliary callback that
//! refreshes the skill's cached [`MessageContext`](aria_core::MessageContext)
//! from the incoming message, and the dispatch-wrapped handler itself. The
//! refresher is subscribed first — delivery for one event name is sequential,
//! so the handler always observes an up-to-date context.
//!
//! The registry also fronts the external scheduler service: scheduled events
//! are ordinary tracked events whose timing lives in the scheduler,
//! communicated via `aria.scheduler.*` messages.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use tracing::debug;

use aria_core::{Message, SkillError, SkillResult, SubscriptionId, callback, kinds};

use crate::handler::{IntentHandler, wrap};
use crate::skill::SkillHandle;

struct TrackedEvent {
    name: String,
    context_sub: SubscriptionId,
    handler_sub: SubscriptionId,
}

/// The set of `(event name, subscriptions)` pairs one skill instance owns.
pub struct EventRegistry {
    skill: SkillHandle,
    tracked: Mutex<Vec<TrackedEvent>>,
}

impl EventRegistry {
    pub(crate) fn new(skill: SkillHandle) -> Self {
        Self {
            skill,
            tracked: Mutex::new(Vec::new()),
        }
    }

    /// Wraps `handler` and subscribes it (plus the context refresher) under
    /// `name`.
    ///
    /// Rejects duplicate names — a skill owns at most one handler per event.
    pub fn add(&self, name: &str, handler: IntentHandler) -> SkillResult<()> {
        let mut tracked = self.tracked.lock();
        if tracked.iter().any(|event| event.name == name) {
            return Err(SkillError::DuplicateEvent(name.to_string()));
        }

        let bus = self.skill.bus();

        let refresher = {
            let skill = self.skill.clone();
            callback(move |message: Message| {
                let skill = skill.clone();
                async move { skill.refresh_context(&message) }
            })
        };
        let context_sub = bus.on(name, refresher);

        let label = format!("{}.{}", self.skill.name(), name);
        let handler_sub = bus.on(name, wrap(&self.skill, &label, handler));

        tracked.push(TrackedEvent {
            name: name.to_string(),
            context_sub,
            handler_sub,
        });
        debug!(skill = %self.skill.name(), event = name, "Event handler registered");
        Ok(())
    }

    /// Unsubscribes one tracked event. Returns `false` if it was not tracked.
    pub fn remove(&self, name: &str) -> bool {
        let entry = {
            let mut tracked = self.tracked.lock();
            let position = tracked.iter().position(|event| event.name == name);
            position.map(|index| tracked.remove(index))
        };

        match entry {
            Some(event) => {
                let bus = self.skill.bus();
                bus.off(&event.name, event.context_sub);
                bus.off(&event.name, event.handler_sub);
                true
            }
            None => false,
        }
    }

    /// Unsubscribes every tracked event and clears the set.
    ///
    /// Subscriptions already removed individually are skipped silently, so
    /// this is safe to call at any point during shutdown.
    pub fn remove_all(&self) {
        let drained: Vec<TrackedEvent> = self.tracked.lock().drain(..).collect();
        let bus = self.skill.bus();
        for event in drained {
            bus.off(&event.name, event.context_sub);
            bus.off(&event.name, event.handler_sub);
        }
    }

    /// Names of all currently tracked events, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tracked
            .lock()
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }

    /// Number of tracked events.
    pub fn len(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Whether the registry tracks nothing.
    pub fn is_empty(&self) -> bool {
        self.tracked.lock().is_empty()
    }

    // ─── Scheduler-facing operations ─────────────────────────────────────────

    /// Registers `handler` under the id-scoped `name` and asks the scheduler
    /// service to fire it at `when` (and every `repeat` thereafter, if set).
    pub async fn schedule(
        &self,
        name: &str,
        when: SystemTime,
        repeat: Option<Duration>,
        data: Map<String, Value>,
        handler: IntentHandler,
    ) -> SkillResult<()> {
        let scoped = self.skill.scoped_name(name);
        self.add(&scoped, handler)?;

        let time = when
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let message = Message::new(kinds::SCHEDULE_EVENT)
            .with_data("event", json!(scoped))
            .with_data("time", json!(time))
            .with_data("repeat", json!(repeat.map(|r| r.as_secs_f64())))
            .with_data("data", Value::Object(data));
        self.skill.bus().emit(message).await;
        Ok(())
    }

    /// Asks the scheduler to change the payload of a scheduled event.
    pub async fn update_scheduled(&self, name: &str, data: Map<String, Value>) {
        let scoped = self.skill.scoped_name(name);
        let message = Message::new(kinds::UPDATE_EVENT)
            .with_data("event", json!(scoped))
            .with_data("data", Value::Object(data));
        self.skill.bus().emit(message).await;
    }

    /// Cancels a scheduled event and drops its local handler.
    pub async fn cancel_scheduled(&self, name: &str) {
        let scoped = self.skill.scoped_name(name);
        self.remove(&scoped);
        let message = Message::new(kinds::REMOVE_EVENT).with_data("event", json!(scoped));
        self.skill.bus().emit(message).await;
    }
}
