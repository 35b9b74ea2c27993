//! Bus message and routing-context types.
//!
//! Every payload carried by the [`MessageBus`](crate::bus::MessageBus) is a
//! [`Message`]: a string kind (the wire field is named `type`), a free-form
//! data map, and a [`MessageContext`] carrying routing metadata. Messages are
//! treated as immutable once emitted — consumers clone rather than mutate.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Well-known message kinds
// =============================================================================

/// Wire names of the message kinds produced and consumed by the dispatch core.
pub mod kinds {
    /// Full intent specification published at registration time.
    pub const REGISTER_INTENT: &str = "register_intent";
    /// Intent-file registration, delegated to the fuzzy-matching collaborator.
    pub const REGISTER_INTENT_FILE: &str = "fuzzy:register_intent";
    /// `{intent_name}` — stop routing utterances to the named intent.
    pub const DETACH_INTENT: &str = "detach_intent";
    /// `{skill_id}` — a skill instance has shut down.
    pub const DETACH_SKILL: &str = "detach_skill";
    /// `{context, word}` — add a keyword to the conversational context.
    pub const ADD_CONTEXT: &str = "add_context";
    /// `{context}` — remove a keyword from the conversational context.
    pub const REMOVE_CONTEXT: &str = "remove_context";
    /// `{start, end}` or `{regex}` — vocabulary registration.
    pub const REGISTER_VOCAB: &str = "register_vocab";
    /// `{skill_id}` — bump a skill to the intent service's active list.
    pub const ACTIVE_SKILL_REQUEST: &str = "active_skill_request";
    /// Lifecycle marker emitted immediately before a skill handler runs.
    pub const HANDLER_START: &str = "aria.skill.handler.start";
    /// Lifecycle marker emitted exactly once after a skill handler finishes.
    pub const HANDLER_COMPLETE: &str = "aria.skill.handler.complete";
    /// Emitted with no payload when the fallback chain is exhausted.
    pub const COMPLETE_INTENT_FAILURE: &str = "complete_intent_failure";
    /// `{utterance, expect_response, metadata}` — hand text to the speech stack.
    pub const SPEAK: &str = "speak";
    /// `{event, time, repeat, data}` — schedule a timed event.
    pub const SCHEDULE_EVENT: &str = "aria.scheduler.schedule_event";
    /// `{event, data}` — change the payload of a scheduled event.
    pub const UPDATE_EVENT: &str = "aria.scheduler.update_event";
    /// `{event}` — cancel a scheduled event.
    pub const REMOVE_EVENT: &str = "aria.scheduler.remove_event";
}

// =============================================================================
// MessageContext
// =============================================================================

/// Routing metadata attached to every [`Message`].
///
/// All fields are optional on the wire. A skill keeps a fully-populated cached
/// context; an incoming context is resolved against that cache with
/// [`inherit`](Self::inherit), and `source` is always stamped with the current
/// skill's identity before use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Who the message is addressed to (`"all"` when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destinatary: Option<String>,
    /// Output device or client the message targets (`"all"` when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Suppress spoken output for this interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    /// More speech is expected to follow; keep the channel open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub more_speech: Option<bool>,
    /// Identity of the component that emitted the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MessageContext {
    /// The initial cached context for a skill named `source`: broadcast
    /// routing, speech enabled.
    pub fn for_skill(source: impl Into<String>) -> Self {
        Self {
            destinatary: Some("all".into()),
            target: Some("all".into()),
            mute: Some(false),
            more_speech: Some(false),
            source: Some(source.into()),
        }
    }

    /// Returns a copy with absent fields filled in from `defaults`.
    ///
    /// `source` is inherited like the other fields; callers stamp it
    /// afterwards with the current skill's identity.
    pub fn inherit(&self, defaults: &MessageContext) -> MessageContext {
        MessageContext {
            destinatary: self
                .destinatary
                .clone()
                .or_else(|| defaults.destinatary.clone()),
            target: self.target.clone().or_else(|| defaults.target.clone()),
            mute: self.mute.or(defaults.mute),
            more_speech: self.more_speech.or(defaults.more_speech),
            source: self.source.clone().or_else(|| defaults.source.clone()),
        }
    }
}

// =============================================================================
// Message
// =============================================================================

/// A single unit of communication on the message bus.
///
/// # Example
///
/// ```rust,ignore
/// use aria_core::{Message, kinds};
/// use serde_json::json;
///
/// let msg = Message::new(kinds::DETACH_INTENT)
///     .with_data("intent_name", json!("7:weather"));
/// bus.emit(msg).await;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// The message kind, e.g. `"register_intent"`. Serialized as `type`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form payload.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Routing metadata.
    #[serde(default)]
    pub context: MessageContext,
}

impl Message {
    /// Creates an empty message of the given kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            data: Map::new(),
            context: MessageContext::default(),
        }
    }

    /// Inserts a single data field (builder style).
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Replaces the whole data map (builder style).
    pub fn with_data_map(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Attaches a routing context (builder style).
    pub fn with_context(mut self, context: MessageContext) -> Self {
        self.context = context;
        self
    }

    /// Convenience accessor: the value of `data[key]` as a string slice.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_serializes_as_type() {
        let msg = Message::new("speak").with_data("utterance", json!("hi"));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "speak");
        assert_eq!(value["data"]["utterance"], "hi");
    }

    #[test]
    fn absent_context_fields_deserialize_as_none() {
        let msg: Message =
            serde_json::from_value(json!({"type": "speak", "context": {"target": "speaker"}}))
                .unwrap();
        assert_eq!(msg.context.target.as_deref(), Some("speaker"));
        assert_eq!(msg.context.destinatary, None);
        assert_eq!(msg.context.mute, None);
    }

    #[test]
    fn inherit_fills_only_absent_fields() {
        let cached = MessageContext::for_skill("WeatherSkill");
        let incoming = MessageContext {
            target: Some("speaker".into()),
            ..Default::default()
        };

        let resolved = incoming.inherit(&cached);
        assert_eq!(resolved.target.as_deref(), Some("speaker"));
        assert_eq!(resolved.destinatary.as_deref(), Some("all"));
        assert_eq!(resolved.mute, Some(false));
        assert_eq!(resolved.source.as_deref(), Some("WeatherSkill"));
    }

    #[test]
    fn data_str_reads_string_fields() {
        let msg = Message::new("detach_intent").with_data("intent_name", json!("7:weather"));
        assert_eq!(msg.data_str("intent_name"), Some("7:weather"));
        assert_eq!(msg.data_str("missing"), None);
    }
}
