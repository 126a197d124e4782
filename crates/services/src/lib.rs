#![forbid(unsafe_code)]

pub mod api;
pub mod baseline_service;
pub mod config;
pub mod context;
pub mod dashboard_service;
pub mod error;
pub mod events;
pub mod identity;
pub mod modules_service;
pub mod notifications;
pub mod preferences_service;
pub mod progress_service;
pub mod resume;

#[cfg(test)]
mod test_support;

pub use progress_core::Clock;

pub use api::{HttpLearnerApi, LearnerApi};
pub use baseline_service::BaselineTracker;
pub use config::EngineConfig;
pub use context::SessionContext;
pub use dashboard_service::{DashboardService, DashboardState, DashboardView, ModuleProgress};
pub use error::{ApiError, ConfigError, ModuleSelectionError, SessionInitError};
pub use events::{EngineEvent, EventBus};
pub use identity::IdentityService;
pub use modules_service::ModuleSelectionService;
pub use notifications::{NotificationCenter, NotificationListItem, NotificationPoller, Toast};
pub use preferences_service::PreferencesService;
pub use progress_service::ProgressCache;
pub use resume::ResumeResolver;
