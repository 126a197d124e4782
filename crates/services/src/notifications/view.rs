use chrono::{DateTime, Utc};
use progress_core::model::{NotificationId, NotificationKind, NotificationRecord};
use progress_core::time::relative_label;

/// One row of the notification history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationListItem {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// "just now", "5m ago", ...
    pub when: String,
}

impl NotificationListItem {
    #[must_use]
    pub fn from_record(record: &NotificationRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id().clone(),
            kind: record.kind(),
            title: record.title().to_string(),
            body: record.body().to_string(),
            timestamp: record.timestamp(),
            when: relative_label(record.timestamp(), now),
        }
    }
}

/// History rows in log order (newest first).
#[must_use]
pub fn history_items(entries: &[NotificationRecord], now: DateTime<Utc>) -> Vec<NotificationListItem> {
    entries
        .iter()
        .map(|record| NotificationListItem::from_record(record, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use progress_core::time::fixed_now;

    #[test]
    fn items_carry_relative_labels() {
        let now = fixed_now();
        let entries = vec![
            NotificationRecord::new(
                NotificationId::new("n2").unwrap(),
                NotificationKind::Streak,
                "5-day streak",
                "You kept the streak alive today.",
                now - TimeDelta::seconds(20),
            ),
            NotificationRecord::new(
                NotificationId::new("n1").unwrap(),
                NotificationKind::Level,
                "Level 4 unlocked",
                "",
                now - TimeDelta::hours(3),
            ),
        ];

        let items = history_items(&entries, now);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].when, "just now");
        assert_eq!(items[1].when, "3h ago");
        assert_eq!(items[1].title, "Level 4 unlocked");
    }
}
