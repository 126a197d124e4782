use serde::{Deserialize, Serialize};

use crate::model::{LearnerId, OwnedRecord};

/// Progress metrics that can raise a notification when they advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Level,
    Streak,
    Badges,
}

impl Metric {
    /// Whether an advance must also exceed the highest value ever seen.
    #[must_use]
    pub fn ratchets_on_peak(self) -> bool {
        !matches!(self, Metric::Streak)
    }
}

/// Outcome of comparing a fresh value against the stored baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BaselineDiff {
    pub changed: bool,
    pub advanced: bool,
}

impl BaselineDiff {
    #[must_use]
    pub fn unchanged() -> Self {
        Self::default()
    }
}

/// Tracked state of one metric: the last value seen and the highest value ever seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracked {
    pub value: u32,
    pub peak: u32,
}

/// Last-seen level, streak and unlocked badge count for one learner.
///
/// A metric that was never observed is uninitialized (`None`). The first
/// observation only seeds the baseline. Decreases follow the server silently.
/// A streak advances on any increase over the stored value; level and badge
/// count must also pass their peak, so climbing back to a level that was
/// already announced stays quiet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBaseline {
    #[serde(default)]
    owner: Option<LearnerId>,
    #[serde(default)]
    level: Option<Tracked>,
    #[serde(default)]
    streak_current: Option<Tracked>,
    #[serde(default)]
    unlocked_badge_count: Option<Tracked>,
}

impl NotificationBaseline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, metric: Metric) -> Option<u32> {
        self.slot(metric).map(|tracked| tracked.value)
    }

    #[must_use]
    pub fn peak(&self, metric: Metric) -> Option<u32> {
        self.slot(metric).map(|tracked| tracked.peak)
    }

    pub fn observe(&mut self, metric: Metric, value: u32) -> BaselineDiff {
        let needs_peak = metric.ratchets_on_peak();
        let slot = self.slot_mut(metric);
        match *slot {
            None => {
                *slot = Some(Tracked { value, peak: value });
                BaselineDiff {
                    changed: true,
                    advanced: false,
                }
            }
            Some(tracked) if value == tracked.value => BaselineDiff::unchanged(),
            Some(tracked) => {
                let advanced = value > tracked.value && (!needs_peak || value > tracked.peak);
                *slot = Some(Tracked {
                    value,
                    peak: tracked.peak.max(value),
                });
                BaselineDiff {
                    changed: true,
                    advanced,
                }
            }
        }
    }

    fn slot(&self, metric: Metric) -> &Option<Tracked> {
        match metric {
            Metric::Level => &self.level,
            Metric::Streak => &self.streak_current,
            Metric::Badges => &self.unlocked_badge_count,
        }
    }

    fn slot_mut(&mut self, metric: Metric) -> &mut Option<Tracked> {
        match metric {
            Metric::Level => &mut self.level,
            Metric::Streak => &mut self.streak_current,
            Metric::Badges => &mut self.unlocked_badge_count,
        }
    }
}

impl OwnedRecord for NotificationBaseline {
    fn owner(&self) -> Option<&LearnerId> {
        self.owner.as_ref()
    }

    fn stamp_owner(&mut self, learner: &LearnerId) {
        self.owner = Some(learner.clone());
    }
}
