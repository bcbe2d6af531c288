use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::{Notification, NotificationKind};

/// The single notification slot. A newer notification replaces the current
/// one; each expires `ttl` after it was raised.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    ttl: Duration,
    current: Option<(Notification, Instant)>,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, current: None }
    }

    pub fn raise(&mut self, kind: NotificationKind, message: impl Into<String>) {
        self.raise_at(kind, message, Instant::now());
    }

    pub fn raise_at(&mut self, kind: NotificationKind, message: impl Into<String>, now: Instant) {
        let notification = Notification {
            kind,
            message: message.into(),
        };
        debug!("Notification ({:?}): {}", notification.kind, notification.message);
        self.current = Some((notification, now));
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.raise(NotificationKind::Success, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.raise(NotificationKind::Error, message);
    }

    /// Manual close.
    pub fn dismiss(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current_at(Instant::now())
    }

    pub fn current_at(&self, now: Instant) -> Option<&Notification> {
        match &self.current {
            Some((notification, raised_at))
                if now.saturating_duration_since(*raised_at) < self.ttl =>
            {
                Some(notification)
            }
            _ => None,
        }
    }

    /// Drops the notification once expired.
    pub fn expire(&mut self, now: Instant) {
        if self.current_at(now).is_none() {
            self.current = None;
        }
    }
}
