//! Desktop notification integration.
//!
//! This module provides:
//!
//! - The [`NotificationService`] seam used by the side-effect dispatcher
//! - A `notify-rust` implementation for the desktop notification daemon
//! - A mock that records sent notifications
//! - Permission-aware sending: check, request if needed, then send

mod content;
pub mod error;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub use self::content::{
    sanitize_text, stopwatch_reminder_content, work_end_content, NotificationContent,
};
pub use self::error::NotificationError;

/// Application name shown by the notification daemon.
pub const APP_NAME: &str = "Pomodoro Reminder";

/// Trait for notification backends.
pub trait NotificationService: Send + Sync {
    /// Returns whether the app may show notifications.
    fn is_permission_granted(&self) -> Result<bool, NotificationError>;

    /// Asks the user for permission and returns whether it was granted.
    fn request_permission(&self) -> Result<bool, NotificationError>;

    /// Shows a notification.
    fn send(&self, content: &NotificationContent) -> Result<(), NotificationError>;
}

/// Sends a notification, requesting permission first when needed.
///
/// Returns `Ok(false)` when permission was refused and nothing was sent.
pub fn send_with_permission(
    service: &dyn NotificationService,
    content: &NotificationContent,
) -> Result<bool, NotificationError> {
    let mut granted = service.is_permission_granted()?;
    if !granted {
        granted = service.request_permission()?;
    }
    if !granted {
        tracing::warn!("⚠️  通知許可が拒否されています。");
        return Ok(false);
    }
    service.send(content)?;
    Ok(true)
}

// ============================================================================
// DesktopNotifier
// ============================================================================

/// Notification backend using the platform notification daemon.
///
/// Desktop daemons have no permission model, so permission is always granted.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
}

impl DesktopNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
        }
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService for DesktopNotifier {
    fn is_permission_granted(&self) -> Result<bool, NotificationError> {
        Ok(true)
    }

    fn request_permission(&self) -> Result<bool, NotificationError> {
        Ok(true)
    }

    fn send(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        notify_rust::Notification::new()
            .summary(&content.title)
            .body(&content.body)
            .appname(&self.app_name)
            .show()
            .map(|_| ())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;
        tracing::debug!(title = %content.title, "通知を送信しました");
        Ok(())
    }
}

// ============================================================================
// MockNotificationService
// ============================================================================

/// Mock notification service for testing.
#[derive(Debug)]
pub struct MockNotificationService {
    sent: Mutex<Vec<NotificationContent>>,
    granted: AtomicBool,
    grant_on_request: AtomicBool,
    request_count: AtomicUsize,
    should_fail: AtomicBool,
}

impl Default for MockNotificationService {
    fn default() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            granted: AtomicBool::new(true),
            grant_on_request: AtomicBool::new(true),
            request_count: AtomicUsize::new(0),
            should_fail: AtomicBool::new(false),
        }
    }
}

impl MockNotificationService {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current permission state and what a request will answer.
    pub fn set_permission(&self, granted: bool, grant_on_request: bool) {
        self.granted.store(granted, Ordering::SeqCst);
        self.grant_on_request
            .store(grant_on_request, Ordering::SeqCst);
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<NotificationContent> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent().len()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

impl NotificationService for MockNotificationService {
    fn is_permission_granted(&self) -> Result<bool, NotificationError> {
        Ok(self.granted.load(Ordering::SeqCst))
    }

    fn request_permission(&self) -> Result<bool, NotificationError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::PermissionRequestFailed(
                "Mock failure".to_string(),
            ));
        }
        let granted = self.grant_on_request.load(Ordering::SeqCst);
        self.granted.store(granted, Ordering::SeqCst);
        Ok(granted)
    }

    fn send(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::SendFailed("Mock failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(content.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_with_permission_granted() {
        let mock = MockNotificationService::new();
        assert!(send_with_permission(&mock, &work_end_content()).unwrap());
        assert_eq!(mock.sent_count(), 1);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_send_requests_permission_first() {
        let mock = MockNotificationService::new();
        mock.set_permission(false, true);

        assert!(send_with_permission(&mock, &work_end_content()).unwrap());
        assert_eq!(mock.request_count(), 1);
        assert_eq!(mock.sent_count(), 1);
    }

    #[test]
    fn test_send_skipped_when_denied() {
        let mock = MockNotificationService::new();
        mock.set_permission(false, false);

        assert!(!send_with_permission(&mock, &work_end_content()).unwrap());
        assert_eq!(mock.sent_count(), 0);
    }

    #[test]
    fn test_send_failure_propagates() {
        let mock = MockNotificationService::new();
        mock.set_should_fail(true);
        assert!(send_with_permission(&mock, &stopwatch_reminder_content()).is_err());
    }

    #[test]
    fn test_permission_request_failure_sends_nothing() {
        let mock = MockNotificationService::new();
        mock.set_permission(false, true);
        mock.set_should_fail(true);

        let err = send_with_permission(&mock, &work_end_content()).unwrap_err();
        assert!(err.is_permission_error());
        assert_eq!(mock.sent_count(), 0);
    }

    #[test]
    fn test_desktop_notifier_permission() {
        let notifier = DesktopNotifier::new();
        assert!(notifier.is_permission_granted().unwrap());
        assert!(notifier.request_permission().unwrap());
    }
}
