//! In-process event bus for engine state changes.

use std::sync::{Arc, Mutex, PoisonError};

use progress_core::model::{ModuleId, NotificationId};
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber before lagging.
pub const EVENT_BUS_CAPACITY: usize = 64;

/// Typed state-change events published by engine components.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineEvent {
    /// No learner identity could be resolved; the host should show a sign-in prompt.
    IdentityMissing,
    ModulesUpdated { modules: Vec<ModuleId> },
    BadgesUpdated { unlocked: u32, total: u32 },
    ProgressRecorded { module_id: ModuleId, percent: Option<u8> },
    NotificationsUpdated { count: usize },
    ToastShown { id: NotificationId },
    /// A dashboard refresh failed and cached values are being shown.
    DashboardDegraded,
}

/// Single publish/subscribe channel shared by one session context.
///
/// Publishing never blocks and never fails; events without subscribers are dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<Mutex<Option<broadcast::Sender<EngineEvent>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUS_CAPACITY)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    /// Subscribe to events published from now on.
    ///
    /// After `close` the returned receiver reports `Closed` immediately.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    pub fn publish(&self, event: EngineEvent) {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = guard.as_ref() {
            // No receivers is fine.
            let _ = sender.send(event);
        }
    }

    /// Drop the sender; subscribers drain what is buffered and then see `Closed`.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
