use std::sync::Arc;

use progress_core::model::{ModuleId, Namespace, UnitId, UnitProgressRecord};
use storage::ScopedStore;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Clock;
use crate::events::{EngineEvent, EventBus};

/// Learner-scoped cache of per-module unit completion.
///
/// Clones share one write guard, so completions recorded through any clone
/// never interleave their load and save.
#[derive(Clone)]
pub struct ProgressCache {
    clock: Clock,
    store: ScopedStore,
    bus: EventBus,
    guard: Arc<Mutex<()>>,
}

impl ProgressCache {
    #[must_use]
    pub fn new(clock: Clock, store: ScopedStore, bus: EventBus) -> Self {
        Self {
            clock,
            store,
            bus,
            guard: Arc::new(Mutex::new(())),
        }
    }

    /// Stored progress for a module, migrating a legacy record if needed.
    pub async fn record(&self, module_id: &ModuleId) -> Option<UnitProgressRecord> {
        self.store
            .resolve(Namespace::UnitProgress, module_id.as_str())
            .await
    }

    /// Mark `unit_id` complete in `module_id` and persist the updated record.
    ///
    /// Re-completing a unit only refreshes `updated_at`. Returns `None` when no
    /// learner is signed in. A failed write still returns the updated record so
    /// the current view can reflect it.
    pub async fn record_unit_completion(
        &self,
        module_id: &ModuleId,
        unit_id: UnitId,
        catalogue_unit_count: u32,
        course_map_link: Option<&str>,
    ) -> Option<UnitProgressRecord> {
        if self.store.learner().is_none() {
            debug!(%module_id, "no learner identity; unit completion not recorded");
            return None;
        }

        let _held = self.guard.lock().await;
        let now = self.clock.now();
        let mut record = self
            .record(module_id)
            .await
            .unwrap_or_else(|| UnitProgressRecord::new(module_id.clone(), now));
        let newly_completed = record.record_unit(unit_id, catalogue_unit_count, now);
        if let Some(link) = course_map_link {
            record.set_course_map_link(link);
        }

        self.store
            .save(Namespace::UnitProgress, module_id.as_str(), &mut record)
            .await;

        let percent = record.percent_of(catalogue_unit_count.max(record.unit_count()));
        info!(%module_id, newly_completed, ?percent, "unit completion recorded");
        self.bus.publish(EngineEvent::ProgressRecorded {
            module_id: module_id.clone(),
            percent,
        });
        Some(record)
    }

    /// Completion percentage of a module against the catalogue's unit total.
    ///
    /// `None` when the total is unknown or zero, or nothing is stored yet.
    /// Completed units beyond the total (catalogue shrank) are clamped to 100%.
    pub async fn get_progress_percent(
        &self,
        module_id: &ModuleId,
        catalogue_unit_total: Option<u32>,
    ) -> Option<u8> {
        let total = catalogue_unit_total.filter(|total| *total > 0)?;
        let record = self.record(module_id).await?;
        record.percent_of(total)
    }
}
