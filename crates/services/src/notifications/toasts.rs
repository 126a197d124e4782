use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use progress_core::model::{NotificationId, NotificationRecord};

/// A transient notification shown until it expires or is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub record: NotificationRecord,
    pub expires_at: DateTime<Utc>,
}

impl Toast {
    #[must_use]
    pub fn id(&self) -> &NotificationId {
        self.record.id()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Visible toasts, oldest first.
#[derive(Debug, Clone)]
pub struct ToastTray {
    timeout: TimeDelta,
    toasts: Vec<Toast>,
}

impl ToastTray {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: TimeDelta::from_std(timeout).unwrap_or(TimeDelta::MAX),
            toasts: Vec::new(),
        }
    }

    /// Show `record` as a toast expiring `timeout` after `now`.
    pub fn show(&mut self, record: NotificationRecord, now: DateTime<Utc>) -> &Toast {
        let expires_at = now.checked_add_signed(self.timeout).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.toasts.push(Toast { record, expires_at });
        let last = self.toasts.len() - 1;
        &self.toasts[last]
    }

    /// Remove a toast on explicit user dismissal. Returns whether it was visible.
    pub fn dismiss(&mut self, id: &NotificationId) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|toast| toast.id() != id);
        self.toasts.len() != before
    }

    /// Drop expired toasts and return their ids.
    pub fn prune(&mut self, now: DateTime<Utc>) -> Vec<NotificationId> {
        let (expired, active): (Vec<_>, Vec<_>) = self
            .toasts
            .drain(..)
            .partition(|toast| toast.is_expired(now));
        self.toasts = active;
        expired.into_iter().map(|toast| toast.record.id().clone()).collect()
    }

    /// Toasts still visible at `now`.
    #[must_use]
    pub fn active(&self, now: DateTime<Utc>) -> Vec<Toast> {
        self.toasts
            .iter()
            .filter(|toast| !toast.is_expired(now))
            .cloned()
            .collect()
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use progress_core::model::NotificationKind;
    use progress_core::time::fixed_now;

    fn record(id: &str) -> NotificationRecord {
        NotificationRecord::new(
            NotificationId::new(id).unwrap(),
            NotificationKind::Info,
            "title",
            "body",
            fixed_now(),
        )
    }

    #[test]
    fn toasts_expire_after_timeout() {
        let now = fixed_now();
        let mut tray = ToastTray::new(Duration::from_secs(6));
        tray.show(record("a"), now);

        assert_eq!(tray.active(now + TimeDelta::seconds(5)).len(), 1);
        assert!(tray.active(now + TimeDelta::seconds(6)).is_empty());

        let pruned = tray.prune(now + TimeDelta::seconds(6));
        assert_eq!(pruned, vec![NotificationId::new("a").unwrap()]);
        assert!(tray.active(now).is_empty());
    }

    #[test]
    fn dismiss_removes_only_that_toast() {
        let now = fixed_now();
        let mut tray = ToastTray::new(Duration::from_secs(6));
        tray.show(record("a"), now);
        tray.show(record("b"), now);

        assert!(tray.dismiss(&NotificationId::new("a").unwrap()));
        assert!(!tray.dismiss(&NotificationId::new("a").unwrap()));

        let ids: Vec<_> = tray.active(now).iter().map(|t| t.id().to_string()).collect();
        assert_eq!(ids, ["b"]);
    }

    #[test]
    fn prune_keeps_fresh_toasts() {
        let now = fixed_now();
        let mut tray = ToastTray::new(Duration::from_secs(6));
        tray.show(record("old"), now);
        tray.show(record("new"), now + TimeDelta::seconds(4));

        let pruned = tray.prune(now + TimeDelta::seconds(7));
        assert_eq!(pruned.len(), 1);
        assert_eq!(tray.active(now + TimeDelta::seconds(7)).len(), 1);
    }
}
