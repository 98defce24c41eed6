//! Notification content construction.
//!
//! This module provides the content type sent through
//! [`NotificationService`](super::NotificationService) and the templates for
//! each reminder.

/// Maximum length for titles and bodies in notifications.
const MAX_TEXT_LENGTH: usize = 200;

/// Text of a desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    /// Creates content from a title and body, dropping control characters
    /// and truncating overly long text.
    #[must_use]
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: sanitize_text(title),
            body: sanitize_text(body),
        }
    }
}

/// Truncates text to [`MAX_TEXT_LENGTH`] characters and removes control
/// characters other than newlines.
pub fn sanitize_text(text: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || !c.is_control())
        .take(MAX_TEXT_LENGTH)
        .collect()
}

/// Notification shown when a work interval ends.
#[must_use]
pub fn work_end_content() -> NotificationContent {
    NotificationContent::new(
        "休憩の時間です！",
        "お疲れさまでした。少し体を動かしましょう！",
    )
}

/// Notification shown when the stopwatch reminder threshold is reached.
#[must_use]
pub fn stopwatch_reminder_content() -> NotificationContent {
    NotificationContent::new(
        "リマインダー",
        "しばらく作業が続いています。休憩を忘れずに！",
    )
}
