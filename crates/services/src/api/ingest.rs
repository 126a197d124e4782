//! Boundary normalization of learner API payloads.
//!
//! Different endpoints spell the same field in camelCase or PascalCase and
//! send numbers as integers, floats or strings. Every variant is accepted here
//! and mapped into the canonical snapshot types.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use progress_core::model::{
    BadgeCollection, CatalogueModule, ModuleCatalogue, ModuleId, NotificationId,
    NotificationKind, Reward,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::api::snapshot::{
    BadgeSnapshot, DashboardSnapshot, ProfileSnapshot, ProgressOverview, ServerNotification,
    StreakSnapshot, TopicProgress,
};
use crate::error::ApiError;

/// Parse a `GET /api/learner/{id}/dashboard` body.
///
/// # Errors
///
/// Returns `ApiError::Payload` if the body is not a dashboard document.
pub fn parse_dashboard(body: &str) -> Result<DashboardSnapshot, ApiError> {
    let wire: DashboardWire = decode(body)?;
    Ok(wire.normalize())
}

/// Parse a `GET /api/learner/{id}/progress` body.
///
/// # Errors
///
/// Returns `ApiError::Payload` if the body is not a progress document.
pub fn parse_progress(body: &str) -> Result<ProgressOverview, ApiError> {
    let wire: ProgressWire = decode(body)?;
    Ok(ProgressOverview {
        overall_percent: percent(wire.overall_percent.as_ref()),
        topics: wire
            .topics
            .into_iter()
            .map(|topic| TopicProgress {
                title: topic.title.unwrap_or_else(|| topic.id.clone()),
                percent: percent(topic.percent.as_ref()),
                id: topic.id,
            })
            .collect(),
    })
}

/// Parse the active-module list returned by the selection endpoints.
///
/// Accepts a bare array or an object wrapping it in `activeModules`.
///
/// # Errors
///
/// Returns `ApiError::Payload` if no module list can be read.
pub fn parse_active_modules(body: &str) -> Result<Vec<ModuleId>, ApiError> {
    let wire: ListOrWrapped<ActiveModuleWire> = decode(body)?;
    Ok(active_modules(wire.into_vec()))
}

/// Parse a `GET /api/notifications/{email}` body.
///
/// # Errors
///
/// Returns `ApiError::Payload` if no notification list can be read.
pub fn parse_notifications(body: &str) -> Result<Vec<ServerNotification>, ApiError> {
    let wire: ListOrWrapped<NotificationWire> = decode(body)?;
    Ok(wire
        .into_vec()
        .into_iter()
        .filter_map(NotificationWire::normalize)
        .collect())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| ApiError::Payload(err.to_string()))
}

// ─── Numbers ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Count {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Count {
    fn as_u64(&self) -> u64 {
        match self {
            Count::Int(value) => u64::try_from(*value).unwrap_or(0),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Count::Float(value) if value.is_finite() && *value > 0.0 => value.round() as u64,
            Count::Float(_) => 0,
            Count::Text(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .map_or(0, |value| Count::Float(value).as_u64()),
        }
    }
}

fn count(value: Option<&Count>) -> u64 {
    value.map_or(0, Count::as_u64)
}

fn count_u32(value: Option<&Count>) -> u32 {
    u32::try_from(count(value)).unwrap_or(u32::MAX)
}

fn percent(value: Option<&Count>) -> u8 {
    u8::try_from(count(value).min(100)).unwrap_or(100)
}

// ─── Dashboard ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardWire {
    #[serde(default, alias = "Profile")]
    profile: ProfileWire,
    #[serde(default, alias = "Streak")]
    streak: StreakWire,
    #[serde(default, alias = "Mission")]
    mission: Option<Value>,
    #[serde(default, alias = "HighlightStats")]
    highlight_stats: Vec<Value>,
    #[serde(default, alias = "Modules")]
    modules: ModulesWire,
    #[serde(default, alias = "Badges")]
    badges: BadgesWire,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileWire {
    #[serde(default, alias = "Name", alias = "displayName")]
    name: Option<String>,
    #[serde(default, alias = "Level")]
    level: Option<Count>,
    #[serde(default, alias = "Xp", alias = "XP")]
    xp: Option<Count>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreakWire {
    #[serde(default, alias = "Current", alias = "currentStreak")]
    current: Option<Count>,
    #[serde(default, alias = "Longest", alias = "longestStreak")]
    longest: Option<Count>,
    #[serde(default, alias = "XpToNextLevel")]
    xp_to_next_level: Option<Count>,
    #[serde(default, alias = "Status")]
    status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModulesWire {
    #[serde(default, alias = "Catalogue", alias = "catalog")]
    catalogue: Vec<CatalogueWire>,
    #[serde(default, alias = "ActiveModules")]
    active_modules: Vec<ActiveModuleWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogueWire {
    #[serde(alias = "Id", alias = "moduleId", alias = "ModuleId")]
    id: String,
    #[serde(default, alias = "Title", alias = "name", alias = "Name")]
    title: Option<String>,
    #[serde(default, alias = "UnitCount")]
    unit_count: Option<Count>,
    #[serde(default, alias = "Units")]
    units: Option<Vec<Value>>,
    #[serde(default, alias = "CourseMapLink", alias = "link")]
    course_map_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActiveModuleWire {
    Id(String),
    Entry(ActiveModuleEntryWire),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveModuleEntryWire {
    #[serde(alias = "ModuleId", alias = "id", alias = "Id")]
    module_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BadgesWire {
    #[serde(default, alias = "Collections")]
    collections: Vec<CollectionWire>,
    #[serde(default, alias = "Stats")]
    stats: HashMap<String, Count>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CollectionWire {
    #[serde(alias = "Id")]
    id: String,
    #[serde(default, alias = "Title", alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "Metric", alias = "metricKey")]
    metric: Option<String>,
    #[serde(default, alias = "CurrentValue", alias = "value")]
    current_value: Option<Count>,
    #[serde(default, alias = "Rewards", alias = "badges")]
    rewards: Vec<RewardWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewardWire {
    #[serde(alias = "Id")]
    id: String,
    #[serde(default, alias = "Title", alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "Threshold")]
    threshold: Option<Count>,
}

impl DashboardWire {
    fn normalize(self) -> DashboardSnapshot {
        let catalogue = ModuleCatalogue::new(
            self.modules
                .catalogue
                .into_iter()
                .filter_map(CatalogueWire::normalize)
                .collect(),
        );
        let stats = self.badges.stats;
        let collections = self
            .badges
            .collections
            .into_iter()
            .map(|collection| collection.normalize(&stats))
            .collect();

        DashboardSnapshot {
            profile: ProfileSnapshot {
                name: self.profile.name.unwrap_or_default(),
                level: count_u32(self.profile.level.as_ref()),
                xp: count(self.profile.xp.as_ref()),
            },
            streak: StreakSnapshot {
                current: count_u32(self.streak.current.as_ref()),
                longest: count_u32(self.streak.longest.as_ref()),
                xp_to_next_level: count(self.streak.xp_to_next_level.as_ref()),
                status: self.streak.status.unwrap_or_default(),
            },
            mission: self.mission.filter(|mission| !mission.is_null()),
            highlight_stats: self.highlight_stats,
            catalogue,
            active_modules: active_modules(self.modules.active_modules),
            badges: BadgeSnapshot { collections },
        }
    }
}

impl CatalogueWire {
    fn normalize(self) -> Option<CatalogueModule> {
        let Ok(id) = ModuleId::new(self.id) else {
            debug!("skipping catalogue entry without an id");
            return None;
        };
        let unit_count = match (self.unit_count.as_ref(), self.units.as_ref()) {
            (Some(count), _) => count_u32(Some(count)),
            (None, Some(units)) => u32::try_from(units.len()).unwrap_or(u32::MAX),
            (None, None) => 0,
        };
        Some(CatalogueModule {
            title: self.title.unwrap_or_else(|| id.to_string()),
            id,
            unit_count,
            course_map_link: self.course_map_link.filter(|link| !link.trim().is_empty()),
        })
    }
}

impl CollectionWire {
    fn normalize(self, stats: &HashMap<String, Count>) -> BadgeCollection {
        let metric = self.metric.unwrap_or_else(|| self.id.clone());
        let metric_value = match self.current_value.as_ref() {
            Some(value) => value.as_u64(),
            None => lookup_stat(stats, &metric),
        };
        BadgeCollection {
            title: self.title.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            metric,
            metric_value,
            rewards: self
                .rewards
                .into_iter()
                .map(|reward| Reward {
                    title: reward.title.unwrap_or_else(|| reward.id.clone()),
                    threshold: count(reward.threshold.as_ref()),
                    id: reward.id,
                })
                .collect(),
        }
    }
}

/// Stat lookup tolerant of key casing (`xp`, `XP`, `Xp`).
fn lookup_stat(stats: &HashMap<String, Count>, metric: &str) -> u64 {
    stats
        .get(metric)
        .or_else(|| {
            stats
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(metric))
                .map(|(_, value)| value)
        })
        .map_or(0, Count::as_u64)
}

fn active_modules(wire: Vec<ActiveModuleWire>) -> Vec<ModuleId> {
    let mut modules: Vec<ModuleId> = Vec::with_capacity(wire.len());
    for entry in wire {
        let raw = match entry {
            ActiveModuleWire::Id(id) => id,
            ActiveModuleWire::Entry(entry) => entry.module_id,
        };
        if let Ok(id) = ModuleId::new(raw) {
            if !modules.contains(&id) {
                modules.push(id);
            }
        }
    }
    modules
}

// ─── Progress ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressWire {
    #[serde(default, alias = "OverallPercent")]
    overall_percent: Option<Count>,
    #[serde(default, alias = "Topics")]
    topics: Vec<TopicWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopicWire {
    #[serde(alias = "Id", alias = "topicId", alias = "TopicId")]
    id: String,
    #[serde(default, alias = "Title", alias = "name")]
    title: Option<String>,
    #[serde(default, alias = "Percent", alias = "progress")]
    percent: Option<Count>,
}

// ─── Lists ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListOrWrapped<T> {
    List(Vec<T>),
    Wrapped(Wrapped<T>),
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    #[serde(
        alias = "activeModules",
        alias = "ActiveModules",
        alias = "notifications",
        alias = "Notifications"
    )]
    items: Vec<T>,
}

impl<T> ListOrWrapped<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListOrWrapped::List(items) => items,
            ListOrWrapped::Wrapped(wrapped) => wrapped.items,
        }
    }
}

// ─── Notifications ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdWire {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationWire {
    #[serde(alias = "Id", alias = "notificationId", alias = "NotificationId")]
    id: IdWire,
    #[serde(default, alias = "Title")]
    title: Option<String>,
    #[serde(default, alias = "Body", alias = "message", alias = "Message")]
    body: Option<String>,
    #[serde(default, alias = "Kind", alias = "type", alias = "Type")]
    kind: Option<String>,
    #[serde(default, alias = "CreatedAt", alias = "timestamp", alias = "Timestamp")]
    created_at: Option<String>,
}

impl NotificationWire {
    fn normalize(self) -> Option<ServerNotification> {
        let raw_id = match self.id {
            IdWire::Int(value) => value.to_string(),
            IdWire::Text(value) => value,
        };
        let raw_id = raw_id.trim();
        if raw_id.is_empty() {
            return None;
        }
        // Prefixed so server ids can never collide with locally generated ones.
        let id = NotificationId::new(format!("server-{raw_id}")).ok()?;
        let body = self.body.unwrap_or_default();
        let title = self
            .title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| "Notification".to_string());
        Some(ServerNotification {
            id,
            kind: self
                .kind
                .as_deref()
                .map_or(NotificationKind::Info, NotificationKind::from_label),
            title,
            body,
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
        })
    }
}

/// RFC 3339, or a naive `YYYY-MM-DD HH:MM:SS` taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|naive| naive.and_utc())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAMEL_DASHBOARD: &str = r#"{
        "profile": {"name": "Ada", "level": 4, "xp": 1250},
        "streak": {"current": 3, "longest": 9, "xpToNextLevel": 150, "status": "active"},
        "mission": {"title": "Finish two units"},
        "highlightStats": [{"label": "Units", "value": 12}],
        "modules": {
            "catalogue": [
                {"id": "form4-01", "title": "Algebra", "unitCount": 5, "courseMapLink": "/m/form4-01"},
                {"id": "form4-02", "title": "Geometry", "units": [{}, {}, {}]}
            ],
            "activeModules": ["form4-02", {"moduleId": "form4-01"}, "form4-02"]
        },
        "badges": {
            "collections": [
                {"id": "xp", "title": "XP", "metric": "xp", "rewards": [
                    {"id": "xp-1", "title": "First steps", "threshold": 100},
                    {"id": "xp-2", "title": "Climber", "threshold": 2000}
                ]},
                {"id": "streak", "metric": "streak", "currentValue": 3, "rewards": [
                    {"id": "s-3", "threshold": 3}
                ]}
            ],
            "stats": {"XP": 1250}
        }
    }"#;

    const PASCAL_DASHBOARD: &str = r#"{
        "Profile": {"Name": "Ada", "Level": "4", "Xp": 1250.0},
        "Streak": {"Current": 3, "Longest": 9, "XpToNextLevel": 150, "Status": "active"},
        "Modules": {
            "Catalogue": [{"ModuleId": "form4-01", "Name": "Algebra", "UnitCount": 5}],
            "ActiveModules": [{"ModuleId": "form4-01"}]
        },
        "Badges": {"Collections": [], "Stats": {}}
    }"#;

    #[test]
    fn camel_case_dashboard_normalizes() {
        let snapshot = parse_dashboard(CAMEL_DASHBOARD).unwrap();
        assert_eq!(snapshot.profile.level, 4);
        assert_eq!(snapshot.streak.current, 3);
        assert_eq!(snapshot.streak.xp_to_next_level, 150);
        assert!(snapshot.mission.is_some());
        assert_eq!(snapshot.highlight_stats.len(), 1);

        let form4_02 = ModuleId::new("form4-02").unwrap();
        assert_eq!(snapshot.catalogue.unit_total(&form4_02), Some(3));
        assert_eq!(
            snapshot.active_modules,
            [form4_02, ModuleId::new("form4-01").unwrap()]
        );

        let collections = &snapshot.badges.collections;
        assert_eq!(collections[0].metric_value, 1250);
        assert_eq!(collections[0].unlocked_count(), 1);
        assert_eq!(collections[1].unlocked_count(), 1);
    }

    #[test]
    fn pascal_case_dashboard_matches_camel_case() {
        let pascal = parse_dashboard(PASCAL_DASHBOARD).unwrap();
        let camel = parse_dashboard(CAMEL_DASHBOARD).unwrap();
        assert_eq!(pascal.profile, camel.profile);
        assert_eq!(pascal.streak, camel.streak);
        assert_eq!(pascal.active_modules, [ModuleId::new("form4-01").unwrap()]);
        assert_eq!(
            pascal.catalogue.find(&ModuleId::new("form4-01").unwrap()).unwrap().title,
            "Algebra"
        );
    }

    #[test]
    fn negative_and_garbage_numbers_clamp_to_zero() {
        let snapshot =
            parse_dashboard(r#"{"profile": {"level": -2, "xp": "lots"}, "streak": {}}"#).unwrap();
        assert_eq!(snapshot.profile.level, 0);
        assert_eq!(snapshot.profile.xp, 0);
    }

    #[test]
    fn empty_object_is_an_empty_dashboard() {
        let snapshot = parse_dashboard("{}").unwrap();
        assert!(snapshot.catalogue.is_empty());
        assert!(snapshot.active_modules.is_empty());
    }

    #[test]
    fn non_json_is_a_payload_error() {
        assert!(matches!(parse_dashboard("<html>"), Err(ApiError::Payload(_))));
    }

    #[test]
    fn progress_overview_parses_both_casings() {
        let overview = parse_progress(
            r#"{"OverallPercent": 42.4, "Topics": [{"TopicId": "alg", "Title": "Algebra", "Percent": 130}]}"#,
        )
        .unwrap();
        assert_eq!(overview.overall_percent, 42);
        assert_eq!(overview.topics[0].percent, 100);
        assert_eq!(overview.topics[0].id, "alg");
    }

    #[test]
    fn active_modules_accept_bare_and_wrapped_lists() {
        let bare = parse_active_modules(r#"["a", "b"]"#).unwrap();
        let wrapped = parse_active_modules(r#"{"activeModules": [{"moduleId": "a"}, "b"]}"#).unwrap();
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn notifications_are_prefixed_and_timestamped() {
        let rows = parse_notifications(
            r#"[
                {"Id": 7, "Title": "Welcome", "Message": "Hi", "Type": "badge", "CreatedAt": "2024-03-01 10:00:00"},
                {"id": "abc", "body": "No title", "createdAt": "2024-03-01T10:00:00Z"},
                {"id": "  "}
            ]"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id.as_str(), "server-7");
        assert_eq!(rows[0].kind, NotificationKind::Badge);
        assert_eq!(rows[0].created_at, rows[1].created_at);
        assert_eq!(rows[1].title, "Notification");
    }
}
