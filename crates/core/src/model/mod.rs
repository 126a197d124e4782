mod badges;
mod baseline;
mod identity;
mod ids;
mod keys;
mod modules;
mod notification;
mod progress;
mod theme;

pub use ids::{LearnerId, ModuleId, NotificationId, ParseIdError, UnitId};

pub use badges::{BadgeCollection, BadgeStats, Reward, unlocked_badge_count};
pub use baseline::{BaselineDiff, Metric, NotificationBaseline, Tracked};
pub use identity::{
    IdentityError, IdentitySource, IdentitySources, LEARNER_QUERY_PARAMS, ResolvedIdentity,
};
pub use keys::{Namespace, OwnedRecord, legacy_key, scoped_key};
pub use modules::{
    ActiveModuleSelection, CatalogueModule, ModuleCatalogue, ResumeTarget,
    fallback_course_map_link, pick_resume_target,
};
pub use notification::{
    NOTIFICATION_HISTORY_LIMIT, NotificationKind, NotificationLog, NotificationRecord,
};
pub use progress::{UnitProgressRecord, completion_percent};
pub use theme::{Theme, ThemePreference};
