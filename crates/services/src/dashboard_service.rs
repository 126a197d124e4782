use std::sync::{Arc, PoisonError, RwLock};

use progress_core::model::{
    ActiveModuleSelection, BadgeStats, ModuleCatalogue, ModuleId, Namespace, NotificationRecord,
    ResumeTarget,
};
use storage::ScopedStore;
use tracing::{info, warn};

use crate::api::{DashboardSnapshot, LearnerApi, ProgressOverview};
use crate::events::{EngineEvent, EventBus};
use crate::modules_service::ModuleSelectionService;
use crate::notifications::NotificationCenter;
use crate::progress_service::ProgressCache;
use crate::resume::ResumeResolver;

const BADGE_STATS_ENTITY: &str = "summary";

/// Completion of one active module as shown in the dashboard grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleProgress {
    pub module_id: ModuleId,
    pub title: String,
    pub percent: Option<u8>,
}

/// Everything the dashboard renders after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// `None` when the server could not be reached.
    pub snapshot: Option<DashboardSnapshot>,
    pub active_modules: ActiveModuleSelection,
    pub modules: Vec<ModuleProgress>,
    pub badge_stats: Option<BadgeStats>,
    pub resume: Option<ResumeTarget>,
    /// Notifications raised by this refresh.
    pub raised: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardState {
    Fresh(DashboardView),
    /// The fetch failed; cached values are shown with a retry affordance.
    Degraded(DashboardView),
    SignedOut,
}

/// Fetches the dashboard and fans it out to the caches and the notification center.
pub struct DashboardService {
    api: Arc<dyn LearnerApi>,
    store: ScopedStore,
    bus: EventBus,
    modules: ModuleSelectionService,
    progress: ProgressCache,
    resume: ResumeResolver,
    notifications: Arc<NotificationCenter>,
    catalogue: RwLock<ModuleCatalogue>,
}

impl DashboardService {
    #[must_use]
    pub fn new(
        api: Arc<dyn LearnerApi>,
        store: ScopedStore,
        bus: EventBus,
        modules: ModuleSelectionService,
        progress: ProgressCache,
        resume: ResumeResolver,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            api,
            store,
            bus,
            modules,
            progress,
            resume,
            notifications,
            catalogue: RwLock::new(ModuleCatalogue::default()),
        }
    }

    /// Catalogue from the last successful refresh.
    #[must_use]
    pub fn catalogue(&self) -> ModuleCatalogue {
        self.catalogue
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cached unlocked/total badge counters.
    pub async fn badge_stats(&self) -> Option<BadgeStats> {
        self.store
            .resolve(Namespace::BadgeStats, BADGE_STATS_ENTITY)
            .await
    }

    /// Load the dashboard, update caches and raise notifications for advances.
    ///
    /// Network failures never escape: the result is `Degraded` with whatever
    /// is cached locally.
    pub async fn refresh(&self) -> DashboardState {
        let Some(learner) = self.store.learner() else {
            return DashboardState::SignedOut;
        };

        match self.api.fetch_dashboard(learner).await {
            Ok(snapshot) => {
                info!(%learner, level = snapshot.profile.level, "dashboard refreshed");
                *self.catalogue.write().unwrap_or_else(PoisonError::into_inner) =
                    snapshot.catalogue.clone();
                let active_modules = self.modules.cache(snapshot.active_modules.clone()).await;
                let badge_stats = self.cache_badge_stats(&snapshot).await;
                let raised = self
                    .notifications
                    .evaluate(&snapshot.profile, &snapshot.streak, &snapshot.badges)
                    .await;

                let view = self
                    .view(Some(snapshot), active_modules, Some(badge_stats), raised)
                    .await;
                DashboardState::Fresh(view)
            }
            Err(err) => {
                warn!(%learner, error = %err, "dashboard unavailable; showing cached values");
                self.bus.publish(EngineEvent::DashboardDegraded);
                let active_modules = self.modules.active_modules().await;
                let badge_stats = self.badge_stats().await;
                let view = self
                    .view(None, active_modules, badge_stats, Vec::new())
                    .await;
                DashboardState::Degraded(view)
            }
        }
    }

    /// Per-topic progress overview, `None` when signed out or unreachable.
    pub async fn progress_overview(&self) -> Option<ProgressOverview> {
        let learner = self.store.learner()?;
        self.api
            .fetch_progress(learner)
            .await
            .inspect_err(|err| warn!(%learner, error = %err, "progress overview unavailable"))
            .ok()
    }

    /// Completion percentage of `module_id` against the cached catalogue.
    pub async fn module_percent(&self, module_id: &ModuleId) -> Option<u8> {
        let total = self.catalogue().unit_total(module_id);
        self.progress.get_progress_percent(module_id, total).await
    }

    async fn cache_badge_stats(&self, snapshot: &DashboardSnapshot) -> BadgeStats {
        let mut stats = BadgeStats::from_collections(&snapshot.badges.collections);
        self.store
            .save(Namespace::BadgeStats, BADGE_STATS_ENTITY, &mut stats)
            .await;
        self.bus.publish(EngineEvent::BadgesUpdated {
            unlocked: stats.unlocked,
            total: stats.total,
        });
        stats
    }

    async fn view(
        &self,
        snapshot: Option<DashboardSnapshot>,
        active_modules: ActiveModuleSelection,
        badge_stats: Option<BadgeStats>,
        raised: Vec<NotificationRecord>,
    ) -> DashboardView {
        let catalogue = self.catalogue();
        let mut modules = Vec::with_capacity(active_modules.modules().len());
        for module_id in active_modules.modules() {
            let title = catalogue
                .find(module_id)
                .map_or_else(|| module_id.to_string(), |module| module.title.clone());
            let percent = self
                .progress
                .get_progress_percent(module_id, catalogue.unit_total(module_id))
                .await;
            modules.push(ModuleProgress {
                module_id: module_id.clone(),
                title,
                percent,
            });
        }
        let resume = self
            .resume
            .resolve_resume_target(&active_modules, &catalogue)
            .await;

        DashboardView {
            snapshot,
            active_modules,
            modules,
            badge_stats,
            resume,
            raised,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Clock;
    use crate::api::{BadgeSnapshot, ProfileSnapshot};
    use crate::baseline_service::BaselineTracker;
    use crate::config::EngineConfig;
    use crate::test_support::FakeApi;
    use progress_core::model::{BadgeCollection, CatalogueModule, LearnerId, Reward, UnitId};
    use progress_core::time::fixed_now;
    use storage::InMemoryStore;

    fn id(raw: &str) -> ModuleId {
        ModuleId::new(raw).unwrap()
    }

    fn snapshot(level: u32) -> DashboardSnapshot {
        DashboardSnapshot {
            profile: ProfileSnapshot {
                name: "Ada".into(),
                level,
                xp: 120,
            },
            catalogue: ModuleCatalogue::new(vec![CatalogueModule {
                id: id("form4-01"),
                title: "Quadratics".into(),
                unit_count: 5,
                course_map_link: None,
            }]),
            active_modules: vec![id("form4-01")],
            badges: BadgeSnapshot {
                collections: vec![BadgeCollection {
                    id: "xp".into(),
                    title: "XP".into(),
                    metric: "xp".into(),
                    metric_value: 120,
                    rewards: vec![
                        Reward {
                            id: "r1".into(),
                            title: "Starter".into(),
                            threshold: 100,
                        },
                        Reward {
                            id: "r2".into(),
                            title: "Climber".into(),
                            threshold: 500,
                        },
                    ],
                }],
            },
            ..DashboardSnapshot::default()
        }
    }

    async fn build(api: Arc<FakeApi>, store: Arc<InMemoryStore>) -> (DashboardService, EventBus) {
        let clock = Clock::fixed(fixed_now());
        let bus = EventBus::default();
        let scoped = ScopedStore::new(store, Some(LearnerId::new("ada").unwrap()));
        let progress = ProgressCache::new(clock, scoped.clone(), bus.clone());
        let center = NotificationCenter::load(
            clock,
            scoped.clone(),
            bus.clone(),
            &EngineConfig::default(),
            Arc::new(BaselineTracker::new(scoped.clone())),
        )
        .await;
        let service = DashboardService::new(
            api.clone(),
            scoped.clone(),
            bus.clone(),
            ModuleSelectionService::new(api, scoped, bus.clone()),
            progress.clone(),
            ResumeResolver::new(progress),
            Arc::new(center),
        );
        (service, bus)
    }

    #[tokio::test]
    async fn fresh_refresh_fills_caches() {
        let store = Arc::new(InMemoryStore::new());
        let api = Arc::new(FakeApi::with_dashboard(snapshot(3)));
        let (service, bus) = build(api, store).await;
        let mut events = bus.subscribe();

        let DashboardState::Fresh(view) = service.refresh().await else {
            panic!("expected a fresh dashboard");
        };
        assert!(view.raised.is_empty());
        assert_eq!(view.modules[0].title, "Quadratics");
        assert_eq!(view.modules[0].percent, None);
        assert_eq!(view.resume.unwrap().link, "/modules/form4-01/course-map");
        let stats = view.badge_stats.unwrap();
        assert_eq!((stats.unlocked, stats.total), (1, 2));

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&EngineEvent::ModulesUpdated {
            modules: vec![id("form4-01")]
        }));
        assert!(seen.contains(&EngineEvent::BadgesUpdated {
            unlocked: 1,
            total: 2
        }));
    }

    #[tokio::test]
    async fn level_up_between_refreshes_is_raised() {
        let store = Arc::new(InMemoryStore::new());
        let api = Arc::new(FakeApi::with_dashboard(snapshot(3)));
        let (service, _) = build(api.clone(), store).await;
        service.refresh().await;

        api.set_dashboard(Some(snapshot(4)));
        let DashboardState::Fresh(view) = service.refresh().await else {
            panic!("expected a fresh dashboard");
        };
        let titles: Vec<_> = view.raised.iter().map(NotificationRecord::title).collect();
        assert_eq!(titles, ["Level 4 unlocked"]);
    }

    #[tokio::test]
    async fn failure_falls_back_to_cached_values() {
        let store = Arc::new(InMemoryStore::new());
        let api = Arc::new(FakeApi::with_dashboard(snapshot(3)));
        let (service, bus) = build(api.clone(), store).await;
        service.refresh().await;
        service
            .progress
            .record_unit_completion(&id("form4-01"), UnitId::new("u1").unwrap(), 5, None)
            .await;

        api.set_dashboard(None);
        let mut events = bus.subscribe();
        let DashboardState::Degraded(view) = service.refresh().await else {
            panic!("expected a degraded dashboard");
        };
        assert!(view.snapshot.is_none());
        assert_eq!(view.active_modules.modules(), [id("form4-01")]);
        assert_eq!(view.modules[0].percent, Some(20));
        assert_eq!(view.badge_stats.map(|s| s.unlocked), Some(1));
        assert_eq!(events.try_recv().unwrap(), EngineEvent::DashboardDegraded);
        assert_eq!(service.module_percent(&id("form4-01")).await, Some(20));
    }

    #[tokio::test]
    async fn signed_out_skips_the_fetch() {
        let store = Arc::new(InMemoryStore::new());
        let api = Arc::new(FakeApi::with_dashboard(snapshot(3)));
        let bus = EventBus::default();
        let scoped = ScopedStore::new(store, None);
        let progress = ProgressCache::new(Clock::fixed(fixed_now()), scoped.clone(), bus.clone());
        let center = NotificationCenter::load(
            Clock::fixed(fixed_now()),
            scoped.clone(),
            bus.clone(),
            &EngineConfig::default(),
            Arc::new(BaselineTracker::new(scoped.clone())),
        )
        .await;
        let service = DashboardService::new(
            api.clone(),
            scoped.clone(),
            bus.clone(),
            ModuleSelectionService::new(api, scoped, bus),
            progress.clone(),
            ResumeResolver::new(progress),
            Arc::new(center),
        );

        assert_eq!(service.refresh().await, DashboardState::SignedOut);
        assert!(service.progress_overview().await.is_none());
    }
}
