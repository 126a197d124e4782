use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LearnerId, ModuleId, OwnedRecord, UnitId};

/// Per-module unit completion state for one learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgressRecord {
    #[serde(default)]
    learner_id: Option<LearnerId>,
    module_id: ModuleId,
    #[serde(default)]
    completed_unit_ids: BTreeSet<UnitId>,
    #[serde(default)]
    unit_count: u32,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    course_map_link: Option<String>,
}

impl UnitProgressRecord {
    /// Empty record for a module the learner has not completed any unit of.
    #[must_use]
    pub fn new(module_id: ModuleId, now: DateTime<Utc>) -> Self {
        Self {
            learner_id: None,
            module_id,
            completed_unit_ids: BTreeSet::new(),
            unit_count: 0,
            updated_at: now,
            course_map_link: None,
        }
    }

    /// Mark `unit_id` complete.
    ///
    /// The stored unit count only ever grows so a catalogue edit that drops units
    /// does not shrink existing progress. Returns `true` if the unit was new.
    pub fn record_unit(
        &mut self,
        unit_id: UnitId,
        catalogue_unit_count: u32,
        now: DateTime<Utc>,
    ) -> bool {
        let inserted = self.completed_unit_ids.insert(unit_id);
        self.unit_count = self.unit_count.max(catalogue_unit_count);
        self.updated_at = now;
        inserted
    }

    pub fn set_course_map_link(&mut self, link: impl Into<String>) {
        let link = link.into();
        if !link.trim().is_empty() {
            self.course_map_link = Some(link);
        }
    }

    #[must_use]
    pub fn module_id(&self) -> &ModuleId {
        &self.module_id
    }

    #[must_use]
    pub fn completed_unit_ids(&self) -> &BTreeSet<UnitId> {
        &self.completed_unit_ids
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed_unit_ids.len()
    }

    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.unit_count
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    #[must_use]
    pub fn course_map_link(&self) -> Option<&str> {
        self.course_map_link.as_deref()
    }

    /// Completion against the stored unit count.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        completion_percent(self.completed_count(), self.unit_count)
    }

    /// Completion against the catalogue's current unit total.
    #[must_use]
    pub fn percent_of(&self, catalogue_unit_total: u32) -> Option<u8> {
        completion_percent(self.completed_count(), catalogue_unit_total)
    }
}

impl OwnedRecord for UnitProgressRecord {
    fn owner(&self) -> Option<&LearnerId> {
        self.learner_id.as_ref()
    }

    fn stamp_owner(&mut self, learner: &LearnerId) {
        self.learner_id = Some(learner.clone());
    }
}

/// `round(min(total, completed) / total * 100)`, or `None` when `total` is zero.
///
/// Rounds half up, so 1 of 8 is 13%.
#[must_use]
pub fn completion_percent(completed: usize, total: u32) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let total = u64::from(total);
    let completed = u64::try_from(completed).unwrap_or(u64::MAX).min(total);
    let percent = (completed * 200 + total) / (total * 2);
    u8::try_from(percent.min(100)).ok()
}
