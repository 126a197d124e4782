//! Scripted `LearnerApi` and local stores for unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use progress_core::model::{LearnerId, ModuleId, NotificationId, NotificationKind};
use reqwest::StatusCode;
use storage::{InMemoryStore, LocalStore, StorageError};

use crate::api::{DashboardSnapshot, LearnerApi, ProgressOverview, ServerNotification};
use crate::error::ApiError;
use progress_core::time::fixed_now;

/// In-memory learner API. `None` responses fail with HTTP 503.
#[derive(Default)]
pub struct FakeApi {
    pub dashboard: Mutex<Option<DashboardSnapshot>>,
    pub progress: Mutex<Option<ProgressOverview>>,
    pub active: Mutex<Option<Vec<ModuleId>>>,
    pub notifications: Mutex<Vec<ServerNotification>>,
    pub notification_calls: AtomicUsize,
}

impl FakeApi {
    pub fn with_dashboard(snapshot: DashboardSnapshot) -> Self {
        let active = snapshot.active_modules.clone();
        Self {
            dashboard: Mutex::new(Some(snapshot)),
            active: Mutex::new(Some(active)),
            ..Self::default()
        }
    }

    pub fn set_dashboard(&self, snapshot: Option<DashboardSnapshot>) {
        *self.dashboard.lock().unwrap() = snapshot;
    }

    pub fn fail_selection(&self) {
        *self.active.lock().unwrap() = None;
    }

    pub fn publish(&self, id: &str, title: &str) {
        self.notifications.lock().unwrap().push(ServerNotification {
            id: NotificationId::new(id).unwrap(),
            kind: NotificationKind::Info,
            title: title.into(),
            body: String::new(),
            created_at: Some(fixed_now()),
        });
    }

    pub fn notification_calls(&self) -> usize {
        self.notification_calls.load(Ordering::SeqCst)
    }

    fn unavailable() -> ApiError {
        ApiError::HttpStatus(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[async_trait]
impl LearnerApi for FakeApi {
    async fn fetch_dashboard(&self, _: &LearnerId) -> Result<DashboardSnapshot, ApiError> {
        self.dashboard.lock().unwrap().clone().ok_or_else(Self::unavailable)
    }

    async fn fetch_progress(&self, _: &LearnerId) -> Result<ProgressOverview, ApiError> {
        self.progress.lock().unwrap().clone().ok_or_else(Self::unavailable)
    }

    async fn add_module(&self, _: &LearnerId, module: &ModuleId) -> Result<Vec<ModuleId>, ApiError> {
        let mut active = self.active.lock().unwrap();
        let modules = active.as_mut().ok_or_else(Self::unavailable)?;
        if !modules.contains(module) {
            modules.push(module.clone());
        }
        Ok(modules.clone())
    }

    async fn remove_module(
        &self,
        _: &LearnerId,
        module: &ModuleId,
    ) -> Result<Vec<ModuleId>, ApiError> {
        let mut active = self.active.lock().unwrap();
        let modules = active.as_mut().ok_or_else(Self::unavailable)?;
        modules.retain(|existing| existing != module);
        Ok(modules.clone())
    }

    async fn fetch_notifications(&self, _: &str) -> Result<Vec<ServerNotification>, ApiError> {
        self.notification_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.notifications.lock().unwrap().clone())
    }
}

/// Store whose every call fails, like a browser store over quota.
pub struct FailingStore;

#[async_trait]
impl LocalStore for FailingStore {
    async fn get(&self, _: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }

    async fn set(&self, _: &str, _: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }

    async fn remove(&self, _: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }

    async fn keys_with_prefix(&self, _: &str) -> Result<Vec<String>, StorageError> {
        Err(StorageError::Unavailable("quota exceeded".into()))
    }
}

/// In-memory store that yields to the scheduler around every call, so
/// concurrent callers interleave between reads and writes.
#[derive(Default)]
pub struct YieldingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl LocalStore for YieldingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        tokio::task::yield_now().await;
        let value = self.inner.get(key).await;
        tokio::task::yield_now().await;
        value
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        tokio::task::yield_now().await;
        self.inner.remove(key).await
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.inner.keys_with_prefix(prefix).await
    }
}
