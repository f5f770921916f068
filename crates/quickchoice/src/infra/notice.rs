//! Transient user-visible notices (progress and failure messages).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

pub type NoticeId = u64;

/// Host notice surface. Notices are best-effort feedback and never fail.
pub trait Notifier: Send + Sync {
    fn show(&self, message: &str) -> NoticeId;

    fn update(&self, id: NoticeId, message: &str);

    /// Hide the notice once `delay` has passed.
    fn dismiss_after(&self, id: NoticeId, delay: Duration);
}

/// Emits notices as structured log events.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    next_id: AtomicU64,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for TracingNotifier {
    fn show(&self, message: &str) -> NoticeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::info!(notice = id, "{message}");
        id
    }

    fn update(&self, id: NoticeId, message: &str) {
        tracing::info!(notice = id, "{message}");
    }

    fn dismiss_after(&self, id: NoticeId, delay: Duration) {
        tracing::debug!(notice = id, delay_ms = delay.as_millis() as u64, "notice dismissed");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeEvent {
    Shown { id: NoticeId, message: String },
    Updated { id: NoticeId, message: String },
    Dismissed { id: NoticeId, delay: Duration },
}

/// Keeps every notice event in order; handy for assertions and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    next_id: AtomicU64,
    events: Mutex<Vec<NoticeEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NoticeEvent> {
        self.events.lock().clone()
    }

    /// Latest message shown or written for `id`.
    pub fn last_message(&self, id: NoticeId) -> Option<String> {
        self.events
            .lock()
            .iter()
            .rev()
            .find_map(|event| match event {
                NoticeEvent::Shown { id: shown, message }
                | NoticeEvent::Updated { id: shown, message }
                    if *shown == id =>
                {
                    Some(message.clone())
                }
                _ => None,
            })
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, message: &str) -> NoticeId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.events.lock().push(NoticeEvent::Shown {
            id,
            message: message.to_string(),
        });
        id
    }

    fn update(&self, id: NoticeId, message: &str) {
        self.events.lock().push(NoticeEvent::Updated {
            id,
            message: message.to_string(),
        });
    }

    fn dismiss_after(&self, id: NoticeId, delay: Duration) {
        self.events.lock().push(NoticeEvent::Dismissed { id, delay });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_notifier_tracks_latest_message() {
        let notifier = RecordingNotifier::new();
        let first = notifier.show("working");
        let second = notifier.show("other");
        notifier.update(first, "done");
        notifier.dismiss_after(first, Duration::from_secs(1));

        assert_ne!(first, second);
        assert_eq!(notifier.last_message(first).as_deref(), Some("done"));
        assert_eq!(notifier.last_message(second).as_deref(), Some("other"));
        assert_eq!(notifier.events().len(), 4);
    }
}
