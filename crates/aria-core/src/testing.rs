//! Test support for bus-facing code.
//!
//! [`RecordingBus`] wraps a [`LocalBus`] and keeps a transcript of every
//! emitted message, so tests can assert on lifecycle pairs, registration
//! payloads, and failure notices without wiring their own collectors.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bus::{BusCallback, LocalBus, MessageBus, SubscriptionId};
use crate::message::Message;

/// A [`MessageBus`] that records everything it emits.
///
/// Subscription behaviour is delegated to an inner [`LocalBus`], so wrapped
/// handlers still fire; `emit` appends to the transcript first.
#[derive(Default)]
pub struct RecordingBus {
    inner: LocalBus,
    transcript: Mutex<Vec<Message>>,
}

impl RecordingBus {
    /// Creates an empty recording bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages emitted so far, in emission order.
    pub fn transcript(&self) -> Vec<Message> {
        self.transcript.lock().clone()
    }

    /// Messages of one kind, in emission order.
    pub fn emitted(&self, kind: &str) -> Vec<Message> {
        self.transcript
            .lock()
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of messages of one kind emitted so far.
    pub fn count(&self, kind: &str) -> usize {
        self.transcript.lock().iter().filter(|m| m.kind == kind).count()
    }

    /// Clears the transcript, keeping subscriptions alive.
    pub fn clear(&self) {
        self.transcript.lock().clear();
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    fn on(&self, event: &str, callback: BusCallback) -> SubscriptionId {
        self.inner.on(event, callback)
    }

    fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.inner.off(event, id)
    }

    async fn emit(&self, message: Message) {
        self.transcript.lock().push(message.clone());
        self.inner.emit(message).await;
    }
}

/// Shorthand for the `Arc<RecordingBus>` most tests start from.
pub fn recording_bus() -> Arc<RecordingBus> {
    Arc::new(RecordingBus::new())
}
