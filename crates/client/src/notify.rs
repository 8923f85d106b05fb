//! User-facing notifications ("toasts").
//!
//! Stores never surface errors by returning them into render paths; they
//! report through a `Notifier` and hand back an outcome instead.

use std::sync::Mutex;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

impl Notice {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Sink for user-visible notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn info(&self, message: String) {
        self.notify(Notice::new(Level::Info, message));
    }

    fn success(&self, message: String) {
        self.notify(Notice::new(Level::Success, message));
    }

    fn warning(&self, message: String) {
        self.notify(Notice::new(Level::Warning, message));
    }

    fn error(&self, message: String) {
        self.notify(Notice::new(Level::Error, message));
    }
}

/// Writes notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            Level::Info | Level::Success => tracing::info!(level = ?notice.level, "{}", notice.message),
            Level::Warning => tracing::warn!("{}", notice.message),
            Level::Error => tracing::error!("{}", notice.message),
        }
    }
}

/// Collects notices so a UI loop (or a test) can drain them.
#[derive(Debug, Default)]
pub struct BufferedNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl BufferedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every notice collected so far.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.lock())
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notice>> {
        self.notices.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for BufferedNotifier {
    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        self.lock().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_notifier_drains_in_order() {
        let n = BufferedNotifier::new();
        n.info("queued".to_string());
        n.error("failed".to_string());

        let drained = n.drain();
        assert_eq!(
            drained,
            vec![
                Notice::new(Level::Info, "queued"),
                Notice::new(Level::Error, "failed"),
            ]
        );
        assert!(n.snapshot().is_empty());
    }
}
