//! Canonical shapes of the server payloads the engine consumes.
//!
//! These are produced only by `api::ingest`; internal components never see
//! the raw wire field names.

use chrono::{DateTime, Utc};
use progress_core::model::{
    BadgeCollection, ModuleCatalogue, ModuleId, NotificationId, NotificationKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileSnapshot {
    pub name: String,
    pub level: u32,
    pub xp: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreakSnapshot {
    pub current: u32,
    pub longest: u32,
    pub xp_to_next_level: u64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BadgeSnapshot {
    pub collections: Vec<BadgeCollection>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DashboardSnapshot {
    pub profile: ProfileSnapshot,
    pub streak: StreakSnapshot,
    /// Mission and highlight cards are passed through untouched for the host to render.
    pub mission: Option<serde_json::Value>,
    pub highlight_stats: Vec<serde_json::Value>,
    pub catalogue: ModuleCatalogue,
    pub active_modules: Vec<ModuleId>,
    pub badges: BadgeSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProgress {
    pub id: String,
    pub title: String,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressOverview {
    pub overall_percent: u8,
    pub topics: Vec<TopicProgress>,
}

/// A notification row raised on the server side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNotification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
}
