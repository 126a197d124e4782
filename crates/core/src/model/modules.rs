use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{LearnerId, ModuleId, OwnedRecord, UnitProgressRecord};

/// A module as listed by the static catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueModule {
    pub id: ModuleId,
    pub title: String,
    pub unit_count: u32,
    pub course_map_link: Option<String>,
}

impl CatalogueModule {
    /// Course-map link for the module, falling back to the conventional path.
    #[must_use]
    pub fn default_link(&self) -> String {
        self.course_map_link
            .clone()
            .filter(|link| !link.trim().is_empty())
            .unwrap_or_else(|| fallback_course_map_link(&self.id))
    }
}

/// Conventional course-map path for a module with no link in the catalogue.
#[must_use]
pub fn fallback_course_map_link(module_id: &ModuleId) -> String {
    format!("/modules/{module_id}/course-map")
}

/// Ordered module catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleCatalogue {
    modules: Vec<CatalogueModule>,
}

impl ModuleCatalogue {
    #[must_use]
    pub fn new(modules: Vec<CatalogueModule>) -> Self {
        Self { modules }
    }

    #[must_use]
    pub fn find(&self, id: &ModuleId) -> Option<&CatalogueModule> {
        self.modules.iter().find(|module| &module.id == id)
    }

    /// Catalogue order of `id`, used to break ties between equally recent modules.
    #[must_use]
    pub fn position(&self, id: &ModuleId) -> Option<usize> {
        self.modules.iter().position(|module| &module.id == id)
    }

    /// Unit total for a module, `None` when the module is unknown or has no units.
    #[must_use]
    pub fn unit_total(&self, id: &ModuleId) -> Option<u32> {
        self.find(id)
            .map(|module| module.unit_count)
            .filter(|count| *count > 0)
    }

    #[must_use]
    pub fn modules(&self) -> &[CatalogueModule] {
        &self.modules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Modules a learner chose to track, in the order they were added.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveModuleSelection {
    #[serde(default)]
    owner: Option<LearnerId>,
    #[serde(default)]
    modules: Vec<ModuleId>,
}

impl ActiveModuleSelection {
    /// Build a selection, dropping duplicate ids while keeping first occurrences.
    #[must_use]
    pub fn new(modules: impl IntoIterator<Item = ModuleId>) -> Self {
        let mut selection = Self::default();
        for module in modules {
            selection.add(module);
        }
        selection
    }

    /// Returns `true` if the module was not already selected.
    pub fn add(&mut self, module: ModuleId) -> bool {
        if self.contains(&module) {
            return false;
        }
        self.modules.push(module);
        true
    }

    /// Returns `true` if the module was selected.
    pub fn remove(&mut self, module: &ModuleId) -> bool {
        let before = self.modules.len();
        self.modules.retain(|existing| existing != module);
        self.modules.len() != before
    }

    #[must_use]
    pub fn contains(&self, module: &ModuleId) -> bool {
        self.modules.contains(module)
    }

    #[must_use]
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl OwnedRecord for ActiveModuleSelection {
    fn owner(&self) -> Option<&LearnerId> {
        self.owner.as_ref()
    }

    fn stamp_owner(&mut self, learner: &LearnerId) {
        self.owner = Some(learner.clone());
    }
}

/// Where the dashboard's "continue" action should lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeTarget {
    pub module_id: ModuleId,
    pub link: String,
}

/// Pick the resume target among the active modules.
///
/// Modules with a stored course-map link compete on `updated_at`; ties go to
/// the module listed first in the catalogue. Without any progress the first
/// active module's default link is used. No active modules yields `None`.
#[must_use]
pub fn pick_resume_target(
    active: &ActiveModuleSelection,
    catalogue: &ModuleCatalogue,
    progress: &HashMap<ModuleId, UnitProgressRecord>,
) -> Option<ResumeTarget> {
    let first = active.modules().first()?;

    let most_recent = active
        .modules()
        .iter()
        .filter_map(|id| {
            let record = progress.get(id)?;
            let link = record.course_map_link()?;
            Some((id, record.updated_at(), link))
        })
        .min_by(|(a_id, a_at, _), (b_id, b_at, _)| {
            let a_pos = catalogue.position(a_id).unwrap_or(usize::MAX);
            let b_pos = catalogue.position(b_id).unwrap_or(usize::MAX);
            b_at.cmp(a_at).then(a_pos.cmp(&b_pos))
        });

    if let Some((id, _, link)) = most_recent {
        return Some(ResumeTarget {
            module_id: id.clone(),
            link: link.to_string(),
        });
    }

    let link = catalogue
        .find(first)
        .map_or_else(|| fallback_course_map_link(first), CatalogueModule::default_link);
    Some(ResumeTarget {
        module_id: first.clone(),
        link,
    })
}
