//! Intent handler types and the dispatch wrapper.
//!
//! The canonical handler shape is fixed at two parameters — the owning
//! [`SkillHandle`] and the delivered [`Message`] — returning a
//! [`HandlerResult`]. Zero-argument and message-only handlers are adapted
//! into that shape once, at registration time, by [`message_only`] and
//! [`no_args`]; there is no per-invocation signature inspection.
//!
//! [`wrap`] is the dispatch wrapper: it turns an [`IntentHandler`] into a
//! [`BusCallback`] that brackets every invocation with a
//! `aria.skill.handler.start` / `aria.skill.handler.complete` lifecycle pair,
//! contains handler failures at this boundary, and flushes the skill's
//! settings after a successful run.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tracing::{error, warn};

use aria_core::{BusCallback, HandlerError, HandlerResult, Message, kinds};

use crate::skill::SkillHandle;

/// Future returned by an intent handler.
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// The canonical intent-handler shape: `(skill, message) -> future`.
pub type IntentHandler = Arc<dyn Fn(SkillHandle, Message) -> HandlerFuture + Send + Sync>;

/// Wraps a two-parameter async closure into an [`IntentHandler`].
pub fn handler<F, Fut>(f: F) -> IntentHandler
where
    F: Fn(SkillHandle, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |skill, message| Box::pin(f(skill, message)))
}

/// Adapts a handler that only cares about the message.
pub fn message_only<F, Fut>(f: F) -> IntentHandler
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |_skill, message| Box::pin(f(message)))
}

/// Adapts a handler that takes no arguments at all.
pub fn no_args<F, Fut>(f: F) -> IntentHandler
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |_skill, _message| Box::pin(f()))
}

/// Builds one lifecycle message of the start/complete pair.
fn lifecycle(kind: &str, label: &str, message: &Message, failure: Option<&HandlerError>) -> Message {
    let mut out = Message::new(kind)
        .with_data("handler", json!(label))
        .with_data("intent", json!(message.kind))
        .with_data("data", Value::Object(message.data.clone()))
        .with_data(
            "context",
            serde_json::to_value(&message.context).unwrap_or_default(),
        );
    if let Some(error) = failure {
        out = out.with_data("exception", json!(error.message()));
    }
    out
}

/// Converts an [`IntentHandler`] into a bus-subscribable callback.
///
/// Per invocation, in order:
///
/// 1. emit `aria.skill.handler.start` — unconditionally, before the handler;
/// 2. invoke the handler;
/// 3. on success, flush the skill's settings if they changed;
/// 4. on failure, speak a generic notice naming the skill and log the error —
///    the failure never escapes this callback;
/// 5. emit `aria.skill.handler.complete` exactly once, carrying `exception`
///    on the failure path.
pub(crate) fn wrap(skill: &SkillHandle, label: &str, handler: IntentHandler) -> BusCallback {
    let skill = skill.clone();
    let label: Arc<str> = Arc::from(label);

    Arc::new(move |message: Message| {
        let skill = skill.clone();
        let handler = Arc::clone(&handler);
        let label = Arc::clone(&label);

        Box::pin(async move {
            let bus = skill.bus();
            bus.emit(lifecycle(kinds::HANDLER_START, &label, &message, None))
                .await;

            let outcome = handler(skill.clone(), message.clone()).await;

            match &outcome {
                Ok(()) => {
                    if let Err(error) = skill.settings().store_if_changed() {
                        warn!(skill = %skill.name(), %error, "Could not persist skill settings");
                    }
                }
                Err(failure) => {
                    skill
                        .speak(
                            &format!(
                                "An error occurred while processing a request in {}",
                                skill.name()
                            ),
                            false,
                        )
                        .await;
                    error!(
                        skill = %skill.name(),
                        handler = %label,
                        error = %failure,
                        "Intent handler failed"
                    );
                }
            }

            bus.emit(lifecycle(
                kinds::HANDLER_COMPLETE,
                &label,
                &message,
                outcome.err().as_ref(),
            ))
            .await;
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use aria_core::testing::recording_bus;

    use crate::skill::SkillHandle;

    fn skill_on(bus: Arc<aria_core::testing::RecordingBus>) -> SkillHandle {
        SkillHandle::new(7, "WeatherSkill", "en-us", None, bus)
    }

    #[tokio::test]
    async fn success_emits_one_lifecycle_pair() {
        let bus = recording_bus();
        let skill = skill_on(Arc::clone(&bus));
        let calls = Arc::new(AtomicUsize::new(0));

        let counted = Arc::clone(&calls);
        let callback = wrap(
            &skill,
            "WeatherSkill.current",
            handler(move |_, _| {
                let counted = Arc::clone(&counted);
                async move {
                    counted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        );

        callback(Message::new("7:weather")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.count(kinds::HANDLER_START), 1);
        assert_eq!(bus.count(kinds::HANDLER_COMPLETE), 1);

        let complete = &bus.emitted(kinds::HANDLER_COMPLETE)[0];
        assert_eq!(complete.data_str("handler"), Some("WeatherSkill.current"));
        assert_eq!(complete.data_str("intent"), Some("7:weather"));
        assert!(!complete.data.contains_key("exception"));
        assert_eq!(bus.count(kinds::SPEAK), 0);
    }

    #[tokio::test]
    async fn failure_is_contained_and_completes_exactly_once() {
        let bus = recording_bus();
        let skill = skill_on(Arc::clone(&bus));

        let callback = wrap(
            &skill,
            "WeatherSkill.current",
            handler(|_, _| async { Err(HandlerError::new("no forecast available")) }),
        );

        callback(Message::new("7:weather")).await;

        // One pair, never two completions on the failure path.
        assert_eq!(bus.count(kinds::HANDLER_START), 1);
        assert_eq!(bus.count(kinds::HANDLER_COMPLETE), 1);

        let complete = &bus.emitted(kinds::HANDLER_COMPLETE)[0];
        assert_eq!(
            complete.data_str("exception"),
            Some("no forecast available")
        );

        // The user hears a single generic notice naming the skill.
        let spoken = bus.emitted(kinds::SPEAK);
        assert_eq!(spoken.len(), 1);
        assert!(
            spoken[0]
                .data_str("utterance")
                .unwrap()
                .contains("WeatherSkill")
        );
    }

    #[tokio::test]
    async fn start_precedes_handler_and_complete_follows() {
        let bus = recording_bus();
        let skill = skill_on(Arc::clone(&bus));

        let probe = Arc::clone(&bus);
        let callback = wrap(
            &skill,
            "WeatherSkill.current",
            handler(move |_, _| {
                let probe = Arc::clone(&probe);
                async move {
                    assert_eq!(probe.count(kinds::HANDLER_START), 1);
                    assert_eq!(probe.count(kinds::HANDLER_COMPLETE), 0);
                    Ok(())
                }
            }),
        );

        callback(Message::new("7:weather")).await;
        assert_eq!(bus.count(kinds::HANDLER_COMPLETE), 1);
    }

    #[tokio::test]
    async fn settings_are_flushed_after_success() {
        let bus = recording_bus();
        let skill = skill_on(Arc::clone(&bus));

        let writer = skill.clone();
        let callback = wrap(
            &skill,
            "WeatherSkill.remember",
            handler(move |_, _| {
                let writer = writer.clone();
                async move {
                    writer.settings().set("unit", serde_json::json!("celsius"));
                    Ok(())
                }
            }),
        );

        callback(Message::new("7:remember")).await;
        assert!(!skill.settings().is_dirty());
    }

    #[tokio::test]
    async fn adapters_fix_the_call_shape_at_registration_time() {
        let bus = recording_bus();
        let skill = skill_on(Arc::clone(&bus));
        let calls = Arc::new(AtomicUsize::new(0));

        for adapted in [
            {
                let calls = Arc::clone(&calls);
                no_args(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            },
            {
                let calls = Arc::clone(&calls);
                message_only(move |message: Message| {
                    let calls = Arc::clone(&calls);
                    async move {
                        assert_eq!(message.kind, "7:weather");
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            },
        ] {
            let callback = wrap(&skill, "WeatherSkill.adapted", adapted);
            callback(Message::new("7:weather")).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(bus.count(kinds::HANDLER_COMPLETE), 2);
    }
}
