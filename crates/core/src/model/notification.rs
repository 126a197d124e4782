use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LearnerId, NotificationId, OwnedRecord};

/// Default bound on the notification history.
pub const NOTIFICATION_HISTORY_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Level,
    Streak,
    Badge,
    Info,
}

impl NotificationKind {
    /// Parse a kind label sent by the server; anything unknown is `Info`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "level" | "levelup" | "level_up" => Self::Level,
            "streak" => Self::Streak,
            "badge" | "badges" => Self::Badge,
            _ => Self::Info,
        }
    }
}

/// One immutable entry of the notification history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    id: NotificationId,
    title: String,
    body: String,
    kind: NotificationKind,
    timestamp: DateTime<Utc>,
}

impl NotificationRecord {
    #[must_use]
    pub fn new(
        id: NotificationId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            kind,
            timestamp,
        }
    }

    #[must_use]
    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Bounded notification history, newest first.
///
/// Also remembers every server-originated id ever merged, so a row that was
/// evicted or cleared from the visible entries is never merged again.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLog {
    #[serde(default)]
    owner: Option<LearnerId>,
    #[serde(default)]
    entries: Vec<NotificationRecord>,
    #[serde(default)]
    merged_ids: BTreeSet<NotificationId>,
}

impl NotificationLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` in timestamp order and evict the oldest entries beyond `limit`.
    ///
    /// A record sharing a timestamp with existing entries goes in front of them.
    /// Returns the evicted records.
    pub fn push(&mut self, record: NotificationRecord, limit: usize) -> Vec<NotificationRecord> {
        let position = self
            .entries
            .iter()
            .position(|existing| existing.timestamp <= record.timestamp)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, record);
        self.trim(limit)
    }

    /// Evict the oldest entries beyond `limit`.
    pub fn trim(&mut self, limit: usize) -> Vec<NotificationRecord> {
        if self.entries.len() <= limit {
            return Vec::new();
        }
        self.entries.split_off(limit)
    }

    #[must_use]
    pub fn contains(&self, id: &NotificationId) -> bool {
        self.entries.iter().any(|entry| &entry.id == id)
    }

    /// Insert a server-originated record unless its id was merged before.
    ///
    /// Returns `false` for an id already seen, even if its entry has since been
    /// evicted or cleared.
    pub fn merge(&mut self, record: NotificationRecord, limit: usize) -> bool {
        let fresh = self.merged_ids.insert(record.id.clone());
        if !fresh || self.contains(&record.id) {
            return false;
        }
        self.push(record, limit);
        true
    }

    /// Drop the visible entries. Merged server ids are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[NotificationRecord] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OwnedRecord for NotificationLog {
    fn owner(&self) -> Option<&LearnerId> {
        self.owner.as_ref()
    }

    fn stamp_owner(&mut self, learner: &LearnerId) {
        self.owner = Some(learner.clone());
    }
}
