use std::collections::HashMap;

use progress_core::model::{
    ActiveModuleSelection, ModuleCatalogue, ResumeTarget, pick_resume_target,
};
use tracing::debug;

use crate::progress_service::ProgressCache;

/// Picks the module the dashboard's "continue" action should open.
#[derive(Clone)]
pub struct ResumeResolver {
    progress: ProgressCache,
}

impl ResumeResolver {
    #[must_use]
    pub fn new(progress: ProgressCache) -> Self {
        Self { progress }
    }

    /// Resume target among `active` modules, or `None` when no module is active.
    pub async fn resolve_resume_target(
        &self,
        active: &ActiveModuleSelection,
        catalogue: &ModuleCatalogue,
    ) -> Option<ResumeTarget> {
        let mut records = HashMap::new();
        for module_id in active.modules() {
            if let Some(record) = self.progress.record(module_id).await {
                records.insert(module_id.clone(), record);
            }
        }

        let target = pick_resume_target(active, catalogue, &records);
        debug!(target = ?target.as_ref().map(|t| t.module_id.as_str()), "resume target resolved");
        target
    }
}
