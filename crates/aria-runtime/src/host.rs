//! Skill host: explicit lifecycle owner for the dispatch core.
//!
//! [`SkillHost`] is created once per process from configuration. It owns the
//! shared [`FallbackService`], hands out unique skill ids, and builds
//! [`SkillInstance`]s bound to the bus. The fallback chain's shared state
//! lives behind this object with an explicit `init`/`shutdown` pair — there
//! is no implicit first-use global.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use aria_core::LocalBus;
//! use aria_runtime::{SkillHost, config::load_config};
//!
//! let config = load_config()?;
//! let bus = Arc::new(LocalBus::new());
//! let host = SkillHost::init(config, bus);
//!
//! let loaded = host.load(Arc::new(WeatherSkill::default()), None).await?;
//! // …
//! loaded.shutdown().await;
//! host.shutdown();
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{error, info};

use aria_core::{MessageBus, SubscriptionId};
use aria_skills::{FallbackService, Skill, SkillHandle, SkillInstance};

use crate::config::AriaConfig;
use crate::error::RuntimeResult;
use crate::logging;

/// Process-wide owner of the dispatch core's shared state.
pub struct SkillHost {
    config: AriaConfig,
    bus: Arc<dyn MessageBus>,
    fallback: Arc<FallbackService>,
    fallback_sub: Mutex<Option<SubscriptionId>>,
    next_skill_id: AtomicU32,
}

impl SkillHost {
    /// Initializes the host: sets up logging, creates the fallback service
    /// with the configured policy, and attaches its resolution pass to the
    /// configured unmatched-utterance event.
    pub fn init(config: AriaConfig, bus: Arc<dyn MessageBus>) -> Arc<Self> {
        logging::init_from_config(&config.logging);

        let fallback = Arc::new(FallbackService::new(
            config.skills.resolution_policy(),
            Arc::clone(&bus),
        ));
        let fallback_sub = FallbackService::attach(&fallback, &config.skills.fallback_event);

        info!(
            language = %config.skills.language,
            fallback_override = config.skills.fallback_override,
            "Skill host initialized"
        );

        Arc::new(Self {
            config,
            bus,
            fallback,
            fallback_sub: Mutex::new(Some(fallback_sub)),
            next_skill_id: AtomicU32::new(1),
        })
    }

    /// The bus every created skill is bound to.
    pub fn bus(&self) -> Arc<dyn MessageBus> {
        Arc::clone(&self.bus)
    }

    /// The shared fallback service.
    pub fn fallback_service(&self) -> Arc<FallbackService> {
        Arc::clone(&self.fallback)
    }

    /// The configuration the host was initialized with.
    pub fn config(&self) -> &AriaConfig {
        &self.config
    }

    /// Creates a skill instance with a fresh unique id.
    ///
    /// `root` is the skill's load location (settings directory and fallback
    /// owner key derive from it).
    pub fn create_skill(&self, name: &str, root: Option<PathBuf>) -> SkillInstance {
        let id = self.next_skill_id.fetch_add(1, Ordering::Relaxed);
        let handle = SkillHandle::new(
            id,
            name,
            &self.config.skills.language,
            root,
            Arc::clone(&self.bus),
        );
        SkillInstance::new(handle, Arc::clone(&self.fallback))
    }

    /// Loads a skill: creates its instance and runs
    /// [`Skill::initialize`].
    ///
    /// A registration failure aborts the load — the partially-initialized
    /// instance is shut down so nothing it managed to register stays behind.
    pub async fn load(
        &self,
        skill: Arc<dyn Skill>,
        root: Option<PathBuf>,
    ) -> RuntimeResult<LoadedSkill> {
        let instance = self.create_skill(skill.name(), root);
        info!(skill = %skill.name(), id = instance.handle().id(), "Loading skill");

        match skill.initialize(&instance).await {
            Ok(()) => Ok(LoadedSkill { skill, instance }),
            Err(err) => {
                error!(skill = %skill.name(), error = %err, "Skill failed to initialize");
                instance.shutdown().await;
                Err(err.into())
            }
        }
    }

    /// Detaches the fallback resolver from the bus.
    ///
    /// Loaded skills are shut down by their owners; the host only tears down
    /// what it attached itself. Idempotent.
    pub fn shutdown(&self) {
        if let Some(sub) = self.fallback_sub.lock().take() {
            self.bus.off(&self.config.skills.fallback_event, sub);
            info!("Skill host shut down");
        }
    }
}

/// A successfully loaded skill: the plugin object plus its live instance.
pub struct LoadedSkill {
    skill: Arc<dyn Skill>,
    instance: SkillInstance,
}

impl LoadedSkill {
    /// The live instance, for registering further handlers at runtime.
    pub fn instance(&self) -> &SkillInstance {
        &self.instance
    }

    /// Shuts the skill down: detaches every registration, then gives the
    /// plugin its [`Skill::stop`] callback.
    pub async fn shutdown(self) {
        self.instance.shutdown().await;
        self.skill.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use serde_json::json;

    use aria_core::testing::recording_bus;
    use aria_core::{IntentBuilder, Message, SkillResult, kinds};
    use aria_skills::{fallback, handler};

    use crate::config::SkillsConfig;

    struct WeatherSkill {
        answered: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Skill for WeatherSkill {
        fn name(&self) -> &str {
            "WeatherSkill"
        }

        async fn initialize(&self, skill: &SkillInstance) -> SkillResult<()> {
            let answered = Arc::clone(&self.answered);
            skill
                .register_intent(
                    IntentBuilder::new("weather").require("WeatherKeyword"),
                    handler(move |_, _| {
                        let answered = Arc::clone(&answered);
                        async move {
                            answered.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    }),
                )
                .await?;

            skill.register_fallback(
                fallback(|skill, _| async move {
                    skill.speak("I do not know the weather there", false).await;
                    Ok(true)
                }),
                50,
            );
            Ok(())
        }
    }

    #[tokio::test]
    async fn ids_are_unique_and_increasing() {
        let bus = recording_bus();
        let host = SkillHost::init(AriaConfig::default(), bus);

        let first = host.create_skill("First", None);
        let second = host.create_skill("Second", None);
        assert_eq!(first.handle().id(), 1);
        assert_eq!(second.handle().id(), 2);
    }

    #[tokio::test]
    async fn loaded_skill_answers_its_intent() {
        let bus = recording_bus();
        let host = SkillHost::init(AriaConfig::default(), bus.clone());
        let answered = Arc::new(AtomicUsize::new(0));

        let loaded = host
            .load(
                Arc::new(WeatherSkill {
                    answered: Arc::clone(&answered),
                }),
                None,
            )
            .await
            .unwrap();

        let scoped = loaded.instance().handle().scoped_name("weather");
        bus.emit(Message::new(scoped)).await;
        assert_eq!(answered.load(Ordering::SeqCst), 1);
        assert_eq!(bus.count(kinds::HANDLER_COMPLETE), 1);
    }

    #[tokio::test]
    async fn unmatched_utterance_flows_through_the_fallback_chain() {
        let bus = recording_bus();
        let host = SkillHost::init(AriaConfig::default(), bus.clone());

        let loaded = host
            .load(
                Arc::new(WeatherSkill {
                    answered: Arc::new(AtomicUsize::new(0)),
                }),
                None,
            )
            .await
            .unwrap();

        bus.emit(
            Message::new("intent_failure").with_data("utterance", json!("what is the weather")),
        )
        .await;

        // The fallback spoke, so no complete_intent_failure was emitted.
        assert_eq!(bus.count(kinds::SPEAK), 1);
        assert_eq!(bus.count(kinds::COMPLETE_INTENT_FAILURE), 0);

        loaded.shutdown().await;
        host.shutdown();

        bus.clear();
        bus.emit(Message::new("intent_failure")).await;
        assert_eq!(bus.count(kinds::SPEAK), 0);
    }

    #[tokio::test]
    async fn failed_initialization_leaves_nothing_registered() {
        struct BrokenSkill;

        #[async_trait]
        impl Skill for BrokenSkill {
            fn name(&self) -> &str {
                "BrokenSkill"
            }

            async fn initialize(&self, skill: &SkillInstance) -> SkillResult<()> {
                skill.register_fallback(fallback(|_, _| async { Ok(false) }), 10);
                // Invalid intent: the load aborts after the fallback above.
                skill
                    .register_intent(IntentBuilder::new(""), handler(|_, _| async { Ok(()) }))
                    .await
            }
        }

        let bus = recording_bus();
        let host = SkillHost::init(AriaConfig::default(), bus);

        assert!(host.load(Arc::new(BrokenSkill), None).await.is_err());
        assert!(host.fallback_service().is_empty());
    }

    #[tokio::test]
    async fn configured_override_order_reaches_the_service() {
        let bus = recording_bus();
        let config = AriaConfig {
            skills: SkillsConfig {
                fallback_override: true,
                fallback_priority: vec!["skill-k2".into(), "skill-k1".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let host = SkillHost::init(config, bus);

        assert_eq!(
            host.fallback_service().policy(),
            &aria_skills::ResolutionPolicy::Ordered(vec!["skill-k2".into(), "skill-k1".into()])
        );
    }
}
