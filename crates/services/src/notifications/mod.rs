//! Notification history, transient toasts and the server-notification poller.

mod center;
mod poller;
mod toasts;
mod view;

pub use center::NotificationCenter;
pub use poller::{NotificationPoller, PollerHandle};
pub use toasts::{Toast, ToastTray};
pub use view::{NotificationListItem, history_items};
