use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use super::center::NotificationCenter;
use crate::api::LearnerApi;
use crate::error::ApiError;

/// Pulls server-originated notifications into the history.
#[derive(Clone)]
pub struct NotificationPoller {
    api: Arc<dyn LearnerApi>,
    center: Arc<NotificationCenter>,
    account: String,
}

impl NotificationPoller {
    #[must_use]
    pub fn new(api: Arc<dyn LearnerApi>, center: Arc<NotificationCenter>, account: String) -> Self {
        Self {
            api,
            center,
            account,
        }
    }

    /// Fetch once and merge new rows silently. Returns how many rows were new.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the fetch fails; the history is left untouched.
    pub async fn poll_once(&self) -> Result<usize, ApiError> {
        let rows = self.api.fetch_notifications(&self.account).await?;
        Ok(self.center.backfill(rows).await)
    }

    /// Poll every `period` on the current runtime until the handle is stopped.
    ///
    /// The first poll runs immediately. Failures are logged and retried on the next tick.
    #[must_use]
    pub fn spawn(self, period: Duration) -> PollerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        match self.poll_once().await {
                            Ok(added) => debug!(added, "notification poll finished"),
                            Err(err) => warn!(error = %err, "notification poll failed"),
                        }
                    }
                }
            }
            debug!("notification poller stopped");
        });
        PollerHandle {
            stop: Some(stop_tx),
            task,
        }
    }
}

/// Running poller; stopping it (or dropping the handle) ends the task.
pub struct PollerHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "notification poller task ended abnormally");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}
