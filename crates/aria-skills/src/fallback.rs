//! The process-wide fallback chain.
//!
//! When no specific intent matches an utterance, the intent service hands the
//! message to the [`FallbackService`]: the one registry shared by every skill
//! instance, holding all registered fallback handlers keyed by priority and
//! by owning skill.
//!
//! Resolution is a single transition — `resolve(message)` reports
//! [`Handled`](Resolution::Handled) or [`Unhandled`](Resolution::Unhandled) —
//! and runs against a snapshot of the registry taken at the start of the
//! pass: skills registering or unregistering concurrently affect only later
//! passes, never an iteration already in flight.
//!
//! Two resolution policies exist, fixed at construction from configuration:
//! ascending priority (the default), or an operator-supplied owner order that
//! overrides priorities entirely (remaining owners run afterwards in
//! registration order). The override exists so a narrow-domain answerer can
//! be forced ahead of a general-purpose one regardless of what priorities
//! the skills picked for themselves.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, warn};

use aria_core::{BusCallback, HandlerError, Message, MessageBus, SubscriptionId, kinds};

use crate::skill::SkillHandle;

/// Future returned by a fallback handler: `Ok(true)` means the utterance was
/// handled and resolution stops.
pub type FallbackFuture = BoxFuture<'static, Result<bool, HandlerError>>;

/// A fallback handler: `(skill, message) -> future of handled?`.
pub type FallbackHandler = Arc<dyn Fn(SkillHandle, Message) -> FallbackFuture + Send + Sync>;

/// Wraps an async closure into a [`FallbackHandler`].
pub fn fallback<F, Fut>(f: F) -> FallbackHandler
where
    F: Fn(SkillHandle, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, HandlerError>> + Send + 'static,
{
    Arc::new(move |skill, message| Box::pin(f(skill, message)))
}

/// How the chain orders handlers during a resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Ascending priority value; lowest runs first.
    #[default]
    Priority,
    /// Operator-configured owner keys run first, in the given order; owners
    /// absent from the list follow in registration order.
    Ordered(Vec<String>),
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Some fallback handler reported success.
    Handled,
    /// The chain was exhausted; `complete_intent_failure` was emitted.
    Unhandled,
}

/// Outcome of [`FallbackService::remove`]; the priority map and the owner
/// map are independent failure points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// At least one priority-map entry was removed.
    pub priority_removed: bool,
    /// At least one owner-map entry was removed.
    pub owner_removed: bool,
}

impl RemoveOutcome {
    /// Whether anything was removed at all.
    pub fn any(&self) -> bool {
        self.priority_removed || self.owner_removed
    }
}

#[derive(Clone)]
struct FallbackEntry {
    owner_key: String,
    skill: SkillHandle,
    handler: FallbackHandler,
}

#[derive(Default)]
struct FallbackRegistry {
    by_priority: BTreeMap<u32, FallbackEntry>,
    /// Registration-ordered; one entry per owner key (re-registration by the
    /// same owner replaces the handler in place).
    by_owner: Vec<FallbackEntry>,
}

/// The shared fallback registry and resolver.
///
/// One instance exists per process, created by the host with an explicit
/// lifecycle. Both maps live behind a single mutex; the mutex is only held
/// to mutate or snapshot, never across a handler invocation.
pub struct FallbackService {
    policy: ResolutionPolicy,
    bus: Arc<dyn MessageBus>,
    registry: Mutex<FallbackRegistry>,
}

impl FallbackService {
    /// Creates an empty chain with the given resolution policy.
    pub fn new(policy: ResolutionPolicy, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            policy,
            bus,
            registry: Mutex::new(FallbackRegistry::default()),
        }
    }

    /// The policy this service resolves with.
    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    /// Registers `handler` on behalf of `skill`.
    ///
    /// Priorities nominally range over `0..=100`, lowest first. If the
    /// requested slot is taken, the next free integer above it is used; the
    /// assigned value is returned and also observable via
    /// [`priority_of`](Self::priority_of).
    pub fn register(&self, skill: &SkillHandle, handler: FallbackHandler, priority: u32) -> u32 {
        let owner_key = skill.owner_key();
        let mut registry = self.registry.lock();

        let mut slot = priority;
        while registry.by_priority.contains_key(&slot) {
            slot += 1;
        }

        let entry = FallbackEntry {
            owner_key: owner_key.clone(),
            skill: skill.clone(),
            handler,
        };
        registry.by_priority.insert(slot, entry.clone());

        match registry
            .by_owner
            .iter_mut()
            .find(|existing| existing.owner_key == owner_key)
        {
            Some(existing) => *existing = entry,
            None => registry.by_owner.push(entry),
        }

        debug!(owner = %owner_key, requested = priority, assigned = slot, "Fallback registered");
        slot
    }

    /// Removes every entry pointing at `handler` (by `Arc` identity) from
    /// both maps.
    pub fn remove(&self, handler: &FallbackHandler) -> RemoveOutcome {
        let mut registry = self.registry.lock();

        let priority_len = registry.by_priority.len();
        registry
            .by_priority
            .retain(|_, entry| !Arc::ptr_eq(&entry.handler, handler));
        let priority_removed = registry.by_priority.len() != priority_len;

        let owner_len = registry.by_owner.len();
        registry
            .by_owner
            .retain(|entry| !Arc::ptr_eq(&entry.handler, handler));
        let owner_removed = registry.by_owner.len() != owner_len;

        if !priority_removed {
            warn!("Fallback handler was not in the priority map");
        }
        if !owner_removed {
            warn!("Fallback handler was not in the owner map");
        }

        RemoveOutcome {
            priority_removed,
            owner_removed,
        }
    }

    /// The priority currently assigned to `handler`, if registered.
    pub fn priority_of(&self, handler: &FallbackHandler) -> Option<u32> {
        self.registry
            .lock()
            .by_priority
            .iter()
            .find(|(_, entry)| Arc::ptr_eq(&entry.handler, handler))
            .map(|(priority, _)| *priority)
    }

    /// Number of handlers in the priority map.
    pub fn len(&self) -> usize {
        self.registry.lock().by_priority.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.registry.lock().by_priority.is_empty()
    }

    /// Snapshot of the chain in the order a resolution pass would try it.
    fn chain(&self) -> Vec<FallbackEntry> {
        let registry = self.registry.lock();
        match &self.policy {
            ResolutionPolicy::Priority => registry.by_priority.values().cloned().collect(),
            ResolutionPolicy::Ordered(order) => {
                let mut chain: Vec<FallbackEntry> = order
                    .iter()
                    .filter_map(|key| {
                        registry
                            .by_owner
                            .iter()
                            .find(|entry| &entry.owner_key == key)
                    })
                    .cloned()
                    .collect();
                chain.extend(
                    registry
                        .by_owner
                        .iter()
                        .filter(|entry| !order.contains(&entry.owner_key))
                        .cloned(),
                );
                chain
            }
        }
    }

    /// Runs one resolution pass over a snapshot of the chain.
    ///
    /// For each entry: the owning skill's cached context is refreshed from
    /// `message`, then the handler runs. `Ok(true)` stops the pass; a
    /// handler error is logged with the owner's identity and counted as
    /// non-success. If nothing succeeds, a single `complete_intent_failure`
    /// is emitted.
    ///
    /// There is no timeout: a handler that never completes stalls this pass
    /// (and only this pass). Registry changes made while the pass runs apply
    /// from the next pass on.
    pub async fn resolve(&self, message: &Message) -> Resolution {
        for entry in self.chain() {
            entry.skill.refresh_context(message);
            match (entry.handler)(entry.skill.clone(), message.clone()).await {
                Ok(true) => {
                    debug!(owner = %entry.owner_key, "Fallback handled the utterance");
                    return Resolution::Handled;
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(owner = %entry.owner_key, %error, "Fallback handler failed");
                }
            }
        }

        warn!("No fallback could handle the utterance");
        self.bus
            .emit(Message::new(kinds::COMPLETE_INTENT_FAILURE))
            .await;
        Resolution::Unhandled
    }

    /// Subscribes `service`'s resolution pass under `event` on its bus.
    ///
    /// The host attaches the chain to the event the intent service emits for
    /// unmatched utterances.
    pub fn attach(service: &Arc<Self>, event: &str) -> SubscriptionId {
        let bus = service.bus.clone();
        let service = Arc::clone(service);
        let resolver: BusCallback = Arc::new(move |message: Message| {
            let service = Arc::clone(&service);
            Box::pin(async move {
                service.resolve(&message).await;
            })
        });
        bus.on(event, resolver)
    }
}
