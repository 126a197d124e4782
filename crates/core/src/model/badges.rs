use serde::{Deserialize, Serialize};

use crate::model::{LearnerId, OwnedRecord};

/// A single badge inside a collection, unlocked once the collection's metric
/// reaches `threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub title: String,
    pub threshold: u64,
}

impl Reward {
    #[must_use]
    pub fn is_unlocked(&self, metric_value: u64) -> bool {
        metric_value >= self.threshold
    }
}

/// A themed group of rewards driven by one learner metric (xp, streak, lessons...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeCollection {
    pub id: String,
    pub title: String,
    pub metric: String,
    pub metric_value: u64,
    pub rewards: Vec<Reward>,
}

impl BadgeCollection {
    #[must_use]
    pub fn unlocked_count(&self) -> usize {
        self.rewards
            .iter()
            .filter(|reward| reward.is_unlocked(self.metric_value))
            .count()
    }
}

/// Number of unlocked rewards across every collection.
#[must_use]
pub fn unlocked_badge_count(collections: &[BadgeCollection]) -> u32 {
    let total: usize = collections.iter().map(BadgeCollection::unlocked_count).sum();
    u32::try_from(total).unwrap_or(u32::MAX)
}

/// Cached unlocked/total badge counters shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeStats {
    #[serde(default)]
    owner: Option<LearnerId>,
    pub unlocked: u32,
    pub total: u32,
}

impl BadgeStats {
    #[must_use]
    pub fn from_collections(collections: &[BadgeCollection]) -> Self {
        let total: usize = collections.iter().map(|c| c.rewards.len()).sum();
        Self {
            owner: None,
            unlocked: unlocked_badge_count(collections),
            total: u32::try_from(total).unwrap_or(u32::MAX),
        }
    }
}

impl OwnedRecord for BadgeStats {
    fn owner(&self) -> Option<&LearnerId> {
        self.owner.as_ref()
    }

    fn stamp_owner(&mut self, learner: &LearnerId) {
        self.owner = Some(learner.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(metric_value: u64, thresholds: &[u64]) -> BadgeCollection {
        BadgeCollection {
            id: "xp".into(),
            title: "XP".into(),
            metric: "xp".into(),
            metric_value,
            rewards: thresholds
                .iter()
                .map(|t| Reward {
                    id: format!("xp-{t}"),
                    title: format!("{t} XP"),
                    threshold: *t,
                })
                .collect(),
        }
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(collection(100, &[50, 100, 150]).unlocked_count(), 2);
    }

    #[test]
    fn counts_sum_over_collections() {
        let collections = vec![collection(100, &[50, 100, 150]), collection(3, &[1, 7])];
        assert_eq!(unlocked_badge_count(&collections), 3);
        let stats = BadgeStats::from_collections(&collections);
        assert_eq!((stats.unlocked, stats.total), (3, 5));
    }

    #[test]
    fn no_collections_means_nothing_unlocked() {
        assert_eq!(unlocked_badge_count(&[]), 0);
    }
}
