use std::sync::Arc;

use progress_core::model::{ActiveModuleSelection, ModuleId, Namespace};
use storage::ScopedStore;
use tracing::{info, warn};

use crate::api::LearnerApi;
use crate::error::ModuleSelectionError;
use crate::events::{EngineEvent, EventBus};

const SELECTION_ENTITY: &str = "selection";

/// Keeps the learner's active-module list in sync with the server and the local cache.
#[derive(Clone)]
pub struct ModuleSelectionService {
    api: Arc<dyn LearnerApi>,
    store: ScopedStore,
    bus: EventBus,
}

impl ModuleSelectionService {
    #[must_use]
    pub fn new(api: Arc<dyn LearnerApi>, store: ScopedStore, bus: EventBus) -> Self {
        Self { api, store, bus }
    }

    /// Last cached selection; empty when nothing is cached.
    pub async fn active_modules(&self) -> ActiveModuleSelection {
        self.store
            .resolve(Namespace::ActiveModules, SELECTION_ENTITY)
            .await
            .unwrap_or_default()
    }

    /// Replace the cached selection with `modules` as reported by the server.
    pub async fn cache(&self, modules: Vec<ModuleId>) -> ActiveModuleSelection {
        let mut selection = ActiveModuleSelection::new(modules);
        self.store
            .save(Namespace::ActiveModules, SELECTION_ENTITY, &mut selection)
            .await;
        self.bus.publish(EngineEvent::ModulesUpdated {
            modules: selection.modules().to_vec(),
        });
        selection
    }

    /// Add `module` to the learner's active modules.
    ///
    /// # Errors
    ///
    /// Returns `ModuleSelectionError::MissingIdentity` when no learner is signed in.
    /// Returns `ModuleSelectionError::Api` if the server rejects the change; the
    /// cached selection is left untouched.
    pub async fn add_module(
        &self,
        module: &ModuleId,
    ) -> Result<ActiveModuleSelection, ModuleSelectionError> {
        let learner = self
            .store
            .learner()
            .ok_or(ModuleSelectionError::MissingIdentity)?;
        let modules = self
            .api
            .add_module(learner, module)
            .await
            .inspect_err(|err| warn!(%module, error = %err, "adding module failed"))?;
        info!(%module, "module added");
        Ok(self.cache(modules).await)
    }

    /// Remove `module` from the learner's active modules.
    ///
    /// # Errors
    ///
    /// Returns `ModuleSelectionError::MissingIdentity` when no learner is signed in.
    /// Returns `ModuleSelectionError::Api` if the server rejects the change; the
    /// cached selection is left untouched.
    pub async fn remove_module(
        &self,
        module: &ModuleId,
    ) -> Result<ActiveModuleSelection, ModuleSelectionError> {
        let learner = self
            .store
            .learner()
            .ok_or(ModuleSelectionError::MissingIdentity)?;
        let modules = self
            .api
            .remove_module(learner, module)
            .await
            .inspect_err(|err| warn!(%module, error = %err, "removing module failed"))?;
        info!(%module, "module removed");
        Ok(self.cache(modules).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DashboardSnapshot;
    use crate::test_support::FakeApi;
    use progress_core::model::LearnerId;
    use storage::InMemoryStore;

    fn id(raw: &str) -> ModuleId {
        ModuleId::new(raw).unwrap()
    }

    fn service(api: Arc<FakeApi>, learner: Option<&str>) -> ModuleSelectionService {
        let store = Arc::new(InMemoryStore::new());
        ModuleSelectionService::new(
            api,
            ScopedStore::new(store, learner.map(|raw| LearnerId::new(raw).unwrap())),
            EventBus::default(),
        )
    }

    #[tokio::test]
    async fn add_and_remove_replace_the_cache() {
        let api = Arc::new(FakeApi::with_dashboard(DashboardSnapshot {
            active_modules: vec![id("form4-01")],
            ..DashboardSnapshot::default()
        }));
        let service = service(api, Some("ada"));
        let mut events = service.bus.subscribe();

        let selection = service.add_module(&id("form4-02")).await.unwrap();
        assert_eq!(selection.modules(), [id("form4-01"), id("form4-02")]);
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::ModulesUpdated {
                modules: vec![id("form4-01"), id("form4-02")]
            }
        );

        service.remove_module(&id("form4-01")).await.unwrap();
        assert_eq!(service.active_modules().await.modules(), [id("form4-02")]);
    }

    #[tokio::test]
    async fn failed_change_keeps_cached_selection() {
        let api = Arc::new(FakeApi::with_dashboard(DashboardSnapshot::default()));
        let service = service(api.clone(), Some("ada"));
        service.cache(vec![id("a")]).await;

        api.fail_selection();
        let err = service.add_module(&id("b")).await.unwrap_err();
        assert!(matches!(err, ModuleSelectionError::Api(_)));
        assert_eq!(service.active_modules().await.modules(), [id("a")]);
    }

    #[tokio::test]
    async fn anonymous_changes_are_rejected() {
        let api = Arc::new(FakeApi::with_dashboard(DashboardSnapshot::default()));
        let service = service(api, None);
        assert!(matches!(
            service.add_module(&id("a")).await,
            Err(ModuleSelectionError::MissingIdentity)
        ));
    }
}
