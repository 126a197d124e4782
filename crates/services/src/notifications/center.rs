use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use progress_core::model::{
    Metric, Namespace, NotificationId, NotificationKind, NotificationLog, NotificationRecord,
    unlocked_badge_count,
};
use storage::ScopedStore;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::toasts::{Toast, ToastTray};
use super::view::{NotificationListItem, history_items};
use crate::Clock;
use crate::api::{BadgeSnapshot, ProfileSnapshot, ServerNotification, StreakSnapshot};
use crate::baseline_service::BaselineTracker;
use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventBus};

const HISTORY_ENTITY: &str = "log";

/// Owns the notification history and toast tray for one session.
///
/// The in-memory log is authoritative for the current session; persistence
/// failures are logged and otherwise ignored.
pub struct NotificationCenter {
    clock: Clock,
    store: ScopedStore,
    bus: EventBus,
    baseline: Arc<BaselineTracker>,
    history_limit: usize,
    log: Mutex<NotificationLog>,
    toasts: StdMutex<ToastTray>,
}

impl NotificationCenter {
    /// Load the learner's persisted history, trimmed to the configured limit.
    pub async fn load(
        clock: Clock,
        store: ScopedStore,
        bus: EventBus,
        config: &EngineConfig,
        baseline: Arc<BaselineTracker>,
    ) -> Self {
        let history_limit = config.history_limit.max(1);
        let mut log: NotificationLog = store
            .resolve(Namespace::NotificationHistory, HISTORY_ENTITY)
            .await
            .unwrap_or_default();
        log.trim(history_limit);
        debug!(entries = log.len(), "notification history loaded");

        Self {
            clock,
            store,
            bus,
            baseline,
            history_limit,
            log: Mutex::new(log),
            toasts: StdMutex::new(ToastTray::new(config.toast_timeout)),
        }
    }

    /// Append a notification to the history and show it as a toast.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> NotificationRecord {
        let record = self.append(kind, title.into(), body.into()).await;
        let id = {
            let mut tray = self.tray();
            tray.prune(self.clock.now());
            tray.show(record.clone(), self.clock.now()).id().clone()
        };
        self.bus.publish(EngineEvent::ToastShown { id });
        record
    }

    /// Append a notification to the history without a toast.
    pub async fn notify_silent(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> NotificationRecord {
        self.append(kind, title.into(), body.into()).await
    }

    /// Merge server-originated rows into the history silently.
    ///
    /// Rows whose id was merged before are skipped, even once they have left
    /// the visible history. Timestamps are capped at now so a skewed server
    /// clock cannot push rows above local notifications. Returns how many rows
    /// were added.
    pub async fn backfill(&self, rows: Vec<ServerNotification>) -> usize {
        let now = self.clock.now();
        let mut log = self.log.lock().await;
        let mut added = 0;
        for row in rows {
            let timestamp = row.created_at.map_or(now, |at| at.min(now));
            let record = NotificationRecord::new(row.id, row.kind, row.title, row.body, timestamp);
            if log.merge(record, self.history_limit) {
                added += 1;
            }
        }

        if added > 0 {
            self.persist(&log).await;
            info!(added, "server notifications merged");
            self.bus
                .publish(EngineEvent::NotificationsUpdated { count: log.len() });
        }
        added
    }

    /// Run the baseline tracker over a dashboard snapshot and notify every advance.
    pub async fn evaluate(
        &self,
        profile: &ProfileSnapshot,
        streak: &StreakSnapshot,
        badges: &BadgeSnapshot,
    ) -> Vec<NotificationRecord> {
        let observations = [
            (Metric::Level, profile.level),
            (Metric::Streak, streak.current),
            (Metric::Badges, unlocked_badge_count(&badges.collections)),
        ];
        let diffs = self.baseline.diff_all(&observations).await;

        let mut raised = Vec::new();
        for ((metric, diff), (_, value)) in diffs.into_iter().zip(observations) {
            if !diff.advanced {
                continue;
            }
            let (kind, title, body) = advance_message(metric, value);
            raised.push(self.notify(kind, title, body).await);
        }
        raised
    }

    /// History, newest first.
    pub async fn history(&self) -> Vec<NotificationRecord> {
        self.log.lock().await.entries().to_vec()
    }

    pub async fn history_view(&self) -> Vec<NotificationListItem> {
        let log = self.log.lock().await;
        history_items(log.entries(), self.clock.now())
    }

    /// Empty the history on explicit user action.
    pub async fn clear_history(&self) {
        let mut log = self.log.lock().await;
        log.clear();
        self.persist(&log).await;
        self.tray().clear();
        info!("notification history cleared");
        self.bus.publish(EngineEvent::NotificationsUpdated { count: 0 });
    }

    /// Toasts still visible now; expired ones are dropped.
    #[must_use]
    pub fn active_toasts(&self) -> Vec<Toast> {
        let now = self.clock.now();
        let mut tray = self.tray();
        tray.prune(now);
        tray.active(now)
    }

    pub fn dismiss_toast(&self, id: &NotificationId) -> bool {
        self.tray().dismiss(id)
    }

    async fn append(&self, kind: NotificationKind, title: String, body: String) -> NotificationRecord {
        let record = NotificationRecord::new(
            NotificationId::generate(),
            kind,
            title,
            body,
            self.clock.now(),
        );

        let mut log = self.log.lock().await;
        let evicted = log.push(record.clone(), self.history_limit);
        self.persist(&log).await;
        info!(
            id = %record.id(),
            kind = ?record.kind(),
            title = record.title(),
            evicted = evicted.len(),
            "notification recorded"
        );
        self.bus
            .publish(EngineEvent::NotificationsUpdated { count: log.len() });
        record
    }

    async fn persist(&self, log: &NotificationLog) {
        let mut snapshot = log.clone();
        if !self
            .store
            .save(Namespace::NotificationHistory, HISTORY_ENTITY, &mut snapshot)
            .await
        {
            debug!("notification history not persisted");
        }
    }

    fn tray(&self) -> std::sync::MutexGuard<'_, ToastTray> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn advance_message(metric: Metric, value: u32) -> (NotificationKind, String, String) {
    match metric {
        Metric::Level => (
            NotificationKind::Level,
            format!("Level {value} unlocked"),
            format!("You reached level {value}. Keep the momentum going."),
        ),
        Metric::Streak => (
            NotificationKind::Streak,
            format!("{value}-day streak"),
            "You kept the streak alive today.".to_string(),
        ),
        Metric::Badges => (
            NotificationKind::Badge,
            "New badge unlocked".to_string(),
            if value == 1 {
                "You have unlocked your first badge.".to_string()
            } else {
                format!("You have unlocked {value} badges.")
            },
        ),
    }
}
