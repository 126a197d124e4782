use std::fmt;

use url::form_urlencoded::byte_serialize;

use crate::model::LearnerId;

/// Logical namespaces of learner state kept in the durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    UnitProgress,
    NotificationHistory,
    NotificationBaseline,
    ActiveModules,
    BadgeStats,
    Theme,
}

impl Namespace {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::UnitProgress => "unit_progress",
            Namespace::NotificationHistory => "notification_history",
            Namespace::NotificationBaseline => "notification_baseline",
            Namespace::ActiveModules => "active_modules",
            Namespace::BadgeStats => "badge_stats",
            Namespace::Theme => "theme",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage key for `entity` owned by `learner`: `namespace:learner:entity`.
///
/// Components are form-encoded so no learner id or entity can contain the
/// separator; distinct learners therefore never share a slot.
#[must_use]
pub fn scoped_key(namespace: Namespace, learner: &LearnerId, entity: &str) -> String {
    format!(
        "{}:{}:{}",
        namespace.as_str(),
        encode(learner.as_str()),
        encode(entity)
    )
}

/// Pre-scoping storage key: `namespace:entity`.
#[must_use]
pub fn legacy_key(namespace: Namespace, entity: &str) -> String {
    format!("{}:{}", namespace.as_str(), encode(entity))
}

fn encode(component: &str) -> String {
    byte_serialize(component.as_bytes()).collect()
}

/// A persisted record that may carry the id of the learner who wrote it.
///
/// Legacy records predate scoping and usually carry no owner.
pub trait OwnedRecord {
    fn owner(&self) -> Option<&LearnerId>;

    fn stamp_owner(&mut self, learner: &LearnerId);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner(raw: &str) -> LearnerId {
        LearnerId::new(raw).unwrap()
    }

    #[test]
    fn scoped_key_layout() {
        let key = scoped_key(Namespace::UnitProgress, &learner("ada"), "form4-01");
        assert_eq!(key, "unit_progress:ada:form4-01");
        assert_eq!(legacy_key(Namespace::UnitProgress, "form4-01"), "unit_progress:form4-01");
    }

    #[test]
    fn separators_inside_components_cannot_collide() {
        let a = scoped_key(Namespace::Theme, &learner("a:b"), "c");
        let b = scoped_key(Namespace::Theme, &learner("a"), "b:c");
        assert_ne!(a, b);
        assert_ne!(legacy_key(Namespace::Theme, "a:b"), a);
    }

    #[test]
    fn different_learners_get_different_slots() {
        let one = scoped_key(Namespace::BadgeStats, &learner("one"), "stats");
        let two = scoped_key(Namespace::BadgeStats, &learner("two"), "stats");
        assert_ne!(one, two);
    }
}
