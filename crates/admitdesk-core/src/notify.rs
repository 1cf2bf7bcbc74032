//! User-facing notifications (toasts in a graphical front end, printed
//! lines in the CLI).

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// Notifications kept by `NotificationCenter` before the oldest are dropped.
const MAX_NOTIFICATIONS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Bounded in-memory notification log.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    entries: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything logged so far, oldest first.
    pub fn drain(&self) -> Vec<Notification> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.drain(..).collect()
    }

    pub fn latest(&self) -> Option<Notification> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == MAX_NOTIFICATIONS {
            entries.pop_front();
        }
        entries.push_back(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_bounded() {
        let center = NotificationCenter::new();
        for i in 0..(MAX_NOTIFICATIONS + 5) {
            center.notify(Notification::info(format!("n{}", i)));
        }
        assert_eq!(center.len(), MAX_NOTIFICATIONS);

        let drained = center.drain();
        assert_eq!(drained[0].message, "n5");
        assert!(center.is_empty());
    }

    #[test]
    fn test_latest() {
        let center = NotificationCenter::new();
        assert!(center.latest().is_none());
        center.notify(Notification::success("saved"));
        center.notify(Notification::error("failed"));
        let latest = center.latest().expect("one logged");
        assert_eq!(latest.level, NotificationLevel::Error);
        assert_eq!(latest.message, "failed");
    }
}
