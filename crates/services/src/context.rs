use std::sync::{Arc, Mutex, PoisonError};

use progress_core::model::{IdentitySources, LearnerId, ResolvedIdentity};
use storage::{LocalStore, ScopedStore, Storage};
use tracing::{debug, info};

use crate::Clock;
use crate::api::{HttpLearnerApi, LearnerApi};
use crate::baseline_service::BaselineTracker;
use crate::config::EngineConfig;
use crate::dashboard_service::DashboardService;
use crate::error::SessionInitError;
use crate::events::EventBus;
use crate::identity::IdentityService;
use crate::modules_service::ModuleSelectionService;
use crate::notifications::{NotificationCenter, NotificationPoller, PollerHandle};
use crate::preferences_service::PreferencesService;
use crate::progress_service::ProgressCache;
use crate::resume::ResumeResolver;

/// Every engine component for one page view, bound to one learner.
///
/// Built once by `init` and discarded with `teardown`; components are handed
/// out from here instead of living in globals.
pub struct SessionContext {
    clock: Clock,
    bus: EventBus,
    config: EngineConfig,
    identity: Option<ResolvedIdentity>,
    identity_service: IdentityService,
    api: Arc<dyn LearnerApi>,
    progress: ProgressCache,
    baseline: Arc<BaselineTracker>,
    notifications: Arc<NotificationCenter>,
    modules: ModuleSelectionService,
    resume: ResumeResolver,
    dashboard: Arc<DashboardService>,
    preferences: PreferencesService,
    poller: Mutex<Option<PollerHandle>>,
}

impl SessionContext {
    /// Resolve the learner and wire every component around `local` and `api`.
    ///
    /// A missing identity is not an error: the context is built anonymous,
    /// `EngineEvent::IdentityMissing` is published on `bus`, and learner-scoped
    /// operations become no-ops.
    pub async fn init(
        local: Arc<dyn LocalStore>,
        api: Arc<dyn LearnerApi>,
        sources: IdentitySources,
        config: EngineConfig,
        clock: Clock,
        bus: EventBus,
    ) -> Self {
        let identity_service = IdentityService::new(Arc::clone(&local), bus.clone());
        let identity = identity_service.resolve(sources).await.ok();
        let learner = identity.as_ref().map(|resolved| resolved.learner.clone());
        let store = ScopedStore::new(local, learner);

        let progress = ProgressCache::new(clock, store.clone(), bus.clone());
        let baseline = Arc::new(BaselineTracker::new(store.clone()));
        let notifications = Arc::new(
            NotificationCenter::load(
                clock,
                store.clone(),
                bus.clone(),
                &config,
                Arc::clone(&baseline),
            )
            .await,
        );
        let modules = ModuleSelectionService::new(Arc::clone(&api), store.clone(), bus.clone());
        let resume = ResumeResolver::new(progress.clone());
        let dashboard = Arc::new(DashboardService::new(
            Arc::clone(&api),
            store.clone(),
            bus.clone(),
            modules.clone(),
            progress.clone(),
            resume.clone(),
            Arc::clone(&notifications),
        ));
        let preferences = PreferencesService::new(store);

        info!(
            learner = identity.as_ref().map(|resolved| resolved.learner.as_str()),
            "session context ready"
        );

        Self {
            clock,
            bus,
            config,
            identity,
            identity_service,
            api,
            progress,
            baseline,
            notifications,
            modules,
            resume,
            dashboard,
            preferences,
            poller: Mutex::new(None),
        }
    }

    /// Build a context over a `SQLite` store and the HTTP API configured in `config`.
    ///
    /// # Errors
    ///
    /// Returns `SessionInitError::Sqlite` if the database cannot be opened or migrated.
    pub async fn open_sqlite(
        db_url: &str,
        sources: IdentitySources,
        config: EngineConfig,
        clock: Clock,
        bus: EventBus,
    ) -> Result<Self, SessionInitError> {
        let storage = Storage::sqlite(db_url).await?;
        let api: Arc<dyn LearnerApi> = Arc::new(HttpLearnerApi::new(config.api_base_url.clone()));
        Ok(Self::init(storage.local, api, sources, config, clock, bus).await)
    }

    #[must_use]
    pub fn learner(&self) -> Option<&LearnerId> {
        self.identity.as_ref().map(|resolved| &resolved.learner)
    }

    #[must_use]
    pub fn identity(&self) -> Option<&ResolvedIdentity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn events(&self) -> EventBus {
        self.bus.clone()
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn LearnerApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressCache {
        &self.progress
    }

    #[must_use]
    pub fn baseline(&self) -> Arc<BaselineTracker> {
        Arc::clone(&self.baseline)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationCenter> {
        Arc::clone(&self.notifications)
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleSelectionService {
        &self.modules
    }

    #[must_use]
    pub fn resume(&self) -> &ResumeResolver {
        &self.resume
    }

    #[must_use]
    pub fn dashboard(&self) -> Arc<DashboardService> {
        Arc::clone(&self.dashboard)
    }

    #[must_use]
    pub fn preferences(&self) -> &PreferencesService {
        &self.preferences
    }

    /// Start polling server notifications for `account` (the learner's email).
    ///
    /// Does nothing when polling is disabled, no learner is signed in, or a
    /// poller is already running. Returns whether a poller was started.
    pub fn start_polling(&self, account: impl Into<String>) -> bool {
        let Some(period) = self.config.poll_interval else {
            debug!("notification polling disabled");
            return false;
        };
        if self.identity.is_none() {
            return false;
        }

        let mut slot = self.poller.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        let poller = NotificationPoller::new(
            Arc::clone(&self.api),
            Arc::clone(&self.notifications),
            account.into(),
        );
        *slot = Some(poller.spawn(period));
        true
    }

    /// Sign the learner out of future sessions on this device.
    pub async fn forget_identity(&self) {
        self.identity_service.forget().await;
    }

    /// Stop background work and close the event bus.
    pub async fn teardown(self) {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(poller) = poller {
            poller.stop().await;
        }
        self.bus.close();
        debug!("session context torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEvent;
    use crate::test_support::FakeApi;
    use progress_core::model::ModuleId;
    use progress_core::time::fixed_now;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;

    async fn context(sources: IdentitySources, config: EngineConfig) -> (SessionContext, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::default());
        let ctx = SessionContext::init(
            Storage::in_memory().local,
            api.clone(),
            sources,
            config,
            Clock::fixed(fixed_now()),
            EventBus::default(),
        )
        .await;
        (ctx, api)
    }

    #[tokio::test]
    async fn anonymous_context_is_inert() {
        let bus = EventBus::default();
        let mut events = bus.subscribe();
        let ctx = SessionContext::init(
            Storage::in_memory().local,
            Arc::new(FakeApi::default()),
            IdentitySources::new(),
            EngineConfig::default(),
            Clock::fixed(fixed_now()),
            bus,
        )
        .await;

        assert!(ctx.learner().is_none());
        assert_eq!(events.try_recv().unwrap(), EngineEvent::IdentityMissing);
        assert!(!ctx.start_polling("ada@example.com"));
        let module = ModuleId::new("m").unwrap();
        assert!(
            ctx.progress()
                .record_unit_completion(&module, "u1".parse().unwrap(), 3, None)
                .await
                .is_none()
        );
    }

    #[tokio::test]
    async fn teardown_stops_polling_and_closes_bus() {
        let sources = IdentitySources::new().with_session(Some("ada".into()));
        let config = EngineConfig {
            poll_interval: Some(Duration::from_secs(60)),
            ..EngineConfig::default()
        };
        let (ctx, api) = context(sources, config).await;
        let mut events = ctx.events().subscribe();

        assert_eq!(ctx.learner().map(LearnerId::as_str), Some("ada"));
        assert!(ctx.start_polling("ada@example.com"));
        assert!(!ctx.start_polling("ada@example.com"));
        api.publish("server-1", "Welcome");

        ctx.teardown().await;
        loop {
            match events.try_recv() {
                Ok(_) => continue,
                Err(err) => {
                    assert_eq!(err, TryRecvError::Closed);
                    break;
                }
            }
        }
    }

    #[tokio::test]
    async fn polling_can_be_disabled() {
        let sources = IdentitySources::new().with_session(Some("ada".into()));
        let config = EngineConfig {
            poll_interval: None,
            ..EngineConfig::default()
        };
        let (ctx, _) = context(sources, config).await;
        assert!(!ctx.start_polling("ada@example.com"));
    }
}
