//! The publish/subscribe message bus interface.
//!
//! The transport carrying messages between skills and core services is an
//! external collaborator — this module defines the [`MessageBus`] trait the
//! dispatch core programs against, plus [`LocalBus`], the single-process
//! implementation used by tests and in-process deployments.
//!
//! # Delivery guarantees
//!
//! Delivery order across distinct event names is unspecified. Delivery for a
//! single event name to multiple subscribers is sequential per `emit` call:
//! each callback is awaited before the next one is invoked. Subscribing or
//! unsubscribing while an `emit` is in flight affects only subsequent emits —
//! each emit operates on a snapshot of the subscriber list.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::trace;

use crate::message::Message;

/// A bus-subscribable callback: takes the delivered message, returns a future.
///
/// Callbacks never return errors — failure containment happens inside the
/// callback (see the dispatch wrapper in `aria-skills`).
pub type BusCallback = Arc<dyn Fn(Message) -> BoxFuture<'static, ()> + Send + Sync>;

/// Wraps an async closure into a [`BusCallback`].
pub fn callback<F, Fut>(f: F) -> BusCallback
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |message| Box::pin(f(message)))
}

/// Token identifying one subscription on a bus.
///
/// Returned by [`MessageBus::on`] and consumed by [`MessageBus::off`]; this is
/// the typed replacement for removal-by-handler-reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// The publish/subscribe transport interface.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Subscribes `callback` to messages of kind `event`.
    fn on(&self, event: &str, callback: BusCallback) -> SubscriptionId;

    /// Removes a single subscription. Returns `false` if it was already gone.
    fn off(&self, event: &str, id: SubscriptionId) -> bool;

    /// Publishes a message, driving delivery to completion for this emit.
    async fn emit(&self, message: Message);
}

// =============================================================================
// LocalBus
// =============================================================================

/// In-process [`MessageBus`] implementation.
///
/// Subscribers are keyed by event name. `emit` snapshots the subscriber list
/// under the lock, releases it, then invokes the callbacks sequentially — so
/// callbacks are free to emit further messages or mutate subscriptions
/// without deadlocking.
#[derive(Default)]
pub struct LocalBus {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<String, Vec<(SubscriptionId, BusCallback)>>>,
}

impl LocalBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers
            .lock()
            .get(event)
            .map_or(0, |subs| subs.len())
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    fn on(&self, event: &str, callback: BusCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, callback));
        trace!(event, ?id, "Subscribed");
        id
    }

    fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let Some(subs) = subscribers.get_mut(event) else {
            return false;
        };
        let before = subs.len();
        subs.retain(|(sub_id, _)| *sub_id != id);
        let removed = subs.len() != before;
        if subs.is_empty() {
            subscribers.remove(event);
        }
        removed
    }

    async fn emit(&self, message: Message) {
        let callbacks: Vec<BusCallback> = {
            let subscribers = self.subscribers.lock();
            subscribers
                .get(&message.kind)
                .map(|subs| subs.iter().map(|(_, cb)| Arc::clone(cb)).collect())
                .unwrap_or_default()
        };

        trace!(kind = %message.kind, subscribers = callbacks.len(), "Emitting");
        for cb in callbacks {
            cb(message.clone()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn delivers_sequentially_in_subscription_order() {
        let bus = LocalBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            bus.on(
                "utterance",
                callback(move |_| {
                    let log = Arc::clone(&log);
                    async move { log.lock().push(tag) }
                }),
            );
        }

        bus.emit(Message::new("utterance")).await;
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn off_removes_only_the_named_subscription() {
        let bus = LocalBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let make = |count: &Arc<AtomicUsize>| {
            let count = Arc::clone(count);
            callback(move |_| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let keep = bus.on("ping", make(&count));
        let drop_me = bus.on("ping", make(&count));

        assert!(bus.off("ping", drop_me));
        assert!(!bus.off("ping", drop_me));
        assert_eq!(bus.subscriber_count("ping"), 1);

        bus.emit(Message::new("ping")).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(bus.off("ping", keep));
        assert_eq!(bus.subscriber_count("ping"), 0);
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_is_a_no_op() {
        let bus = LocalBus::new();
        bus.emit(Message::new("nobody_home")).await;
    }

    #[tokio::test]
    async fn callbacks_may_emit_on_the_same_bus() {
        let bus = Arc::new(LocalBus::new());
        let seen = Arc::new(AtomicUsize::new(0));

        {
            let bus2 = Arc::clone(&bus);
            bus.on(
                "outer",
                callback(move |_| {
                    let bus = Arc::clone(&bus2);
                    async move { bus.emit(Message::new("inner")).await }
                }),
            );
        }
        {
            let seen = Arc::clone(&seen);
            bus.on(
                "inner",
                callback(move |_| {
                    let seen = Arc::clone(&seen);
                    async move {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                }),
            );
        }

        bus.emit(Message::new("outer")).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
