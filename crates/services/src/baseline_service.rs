use progress_core::model::{BaselineDiff, Metric, Namespace, NotificationBaseline};
use storage::ScopedStore;
use tokio::sync::Mutex;
use tracing::debug;

const BASELINE_ENTITY: &str = "current";

/// Per-learner ratchet over level, streak and unlocked badge count.
///
/// Every diff reloads and rewrites the stored baseline so two trackers over the
/// same store agree. Without a learner every diff reports no change.
pub struct BaselineTracker {
    store: ScopedStore,
    // Serializes load/observe/save within one session.
    guard: Mutex<()>,
}

impl BaselineTracker {
    #[must_use]
    pub fn new(store: ScopedStore) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    /// Compare `value` against the stored baseline for `metric` and persist the result.
    pub async fn diff(&self, metric: Metric, value: u32) -> BaselineDiff {
        self.diff_all(&[(metric, value)])
            .await
            .first()
            .map_or_else(BaselineDiff::unchanged, |(_, diff)| *diff)
    }

    /// Observe several metrics from one snapshot with a single load and save.
    pub async fn diff_all(&self, observations: &[(Metric, u32)]) -> Vec<(Metric, BaselineDiff)> {
        if self.store.learner().is_none() {
            debug!("no learner identity; baseline not tracked");
            return observations
                .iter()
                .map(|(metric, _)| (*metric, BaselineDiff::unchanged()))
                .collect();
        }

        let _held = self.guard.lock().await;
        let mut baseline = self.load().await;
        let diffs: Vec<_> = observations
            .iter()
            .map(|(metric, value)| (*metric, baseline.observe(*metric, *value)))
            .collect();

        if diffs.iter().any(|(_, diff)| diff.changed) {
            self.store
                .save(Namespace::NotificationBaseline, BASELINE_ENTITY, &mut baseline)
                .await;
        }
        diffs
    }

    /// The stored baseline, or an uninitialized one.
    pub async fn load(&self) -> NotificationBaseline {
        self.store
            .resolve(Namespace::NotificationBaseline, BASELINE_ENTITY)
            .await
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::LearnerId;
    use std::sync::Arc;
    use storage::{InMemoryStore, LocalStore};

    fn tracker(store: &Arc<InMemoryStore>, learner: &str) -> BaselineTracker {
        BaselineTracker::new(ScopedStore::new(
            store.clone(),
            Some(LearnerId::new(learner).unwrap()),
        ))
    }

    #[tokio::test]
    async fn cold_start_never_advances() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(&store, "ada");

        for metric in [Metric::Level, Metric::Streak, Metric::Badges] {
            let diff = tracker.diff(metric, 7).await;
            assert!(diff.changed);
            assert!(!diff.advanced);
        }
    }

    #[tokio::test]
    async fn each_level_increase_advances_once() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(&store, "ada");
        tracker.diff(Metric::Level, 1).await;

        let mut advanced = 0;
        for level in [2, 3, 4, 5] {
            if tracker.diff(Metric::Level, level).await.advanced {
                advanced += 1;
            }
        }
        assert_eq!(advanced, 4);
    }

    #[tokio::test]
    async fn return_after_correction_is_quiet() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(&store, "ada");
        tracker.diff(Metric::Level, 4).await;

        let down = tracker.diff(Metric::Level, 3).await;
        assert!(down.changed && !down.advanced);
        let back = tracker.diff(Metric::Level, 4).await;
        assert!(back.changed && !back.advanced);
        assert!(tracker.diff(Metric::Level, 5).await.advanced);
    }

    #[tokio::test]
    async fn streak_reset_then_growth_advances() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(&store, "ada");
        tracker.diff(Metric::Streak, 9).await;
        tracker.diff(Metric::Streak, 0).await;
        assert!(tracker.diff(Metric::Streak, 1).await.advanced);
    }

    #[tokio::test]
    async fn baseline_survives_a_new_tracker() {
        let store = Arc::new(InMemoryStore::new());
        tracker(&store, "ada").diff(Metric::Badges, 2).await;

        let reloaded = tracker(&store, "ada");
        assert_eq!(reloaded.load().await.get(Metric::Badges), Some(2));
        assert_eq!(reloaded.diff(Metric::Badges, 2).await, BaselineDiff::unchanged());
    }

    #[tokio::test]
    async fn baselines_are_per_learner() {
        let store = Arc::new(InMemoryStore::new());
        tracker(&store, "ada").diff(Metric::Level, 10).await;

        let other = tracker(&store, "grace");
        let diff = other.diff(Metric::Level, 11).await;
        assert!(!diff.advanced);
    }

    #[tokio::test]
    async fn anonymous_reports_no_change() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = BaselineTracker::new(ScopedStore::new(store.clone(), None));
        assert_eq!(tracker.diff(Metric::Level, 3).await, BaselineDiff::unchanged());
        assert!(store.keys_with_prefix("").await.unwrap().is_empty());
    }
}
