//! Read-only contracts of the learner API consumed by the engine.

mod http;
pub mod ingest;
pub mod snapshot;

use async_trait::async_trait;
use progress_core::model::{LearnerId, ModuleId};

use crate::error::ApiError;

pub use http::HttpLearnerApi;
pub use snapshot::{
    BadgeSnapshot, DashboardSnapshot, ProfileSnapshot, ProgressOverview, ServerNotification,
    StreakSnapshot, TopicProgress,
};

/// Learner-facing endpoints of the platform API.
#[async_trait]
pub trait LearnerApi: Send + Sync {
    /// `GET /api/learner/{id}/dashboard`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is unreadable.
    async fn fetch_dashboard(&self, learner: &LearnerId) -> Result<DashboardSnapshot, ApiError>;

    /// `GET /api/learner/{id}/progress`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is unreadable.
    async fn fetch_progress(&self, learner: &LearnerId) -> Result<ProgressOverview, ApiError>;

    /// `POST /api/learner/{id}/modules/selection`; returns the updated active modules.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is unreadable.
    async fn add_module(
        &self,
        learner: &LearnerId,
        module: &ModuleId,
    ) -> Result<Vec<ModuleId>, ApiError>;

    /// `DELETE /api/learner/{id}/modules/selection/{moduleId}`; returns the updated active modules.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is unreadable.
    async fn remove_module(
        &self,
        learner: &LearnerId,
        module: &ModuleId,
    ) -> Result<Vec<ModuleId>, ApiError>;

    /// `GET /api/notifications/{email}`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails or the payload is unreadable.
    async fn fetch_notifications(
        &self,
        account: &str,
    ) -> Result<Vec<ServerNotification>, ApiError>;
}
