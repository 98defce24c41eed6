//! Notification errors.
//!
//! Notification failures are logged by the dispatcher and never stop a
//! phase transition. A refused permission is not an error: see
//! [`send_with_permission`](super::send_with_permission).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    /// Asking the platform for permission failed.
    #[error("通知許可の確認に失敗しました: {0}")]
    PermissionRequestFailed(String),

    /// The backend rejected the notification.
    #[error("通知の送信に失敗しました: {0}")]
    SendFailed(String),
}

impl NotificationError {
    /// Whether the failure happened before anything was sent.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::PermissionRequestFailed(_))
    }

    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::PermissionRequestFailed(_) => {
                "システム設定の通知でアプリの通知を許可してください"
            }
            Self::SendFailed(_) => {
                "通知デーモンが起動しているか確認するか、enableNotification を false に設定してください"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotificationError::SendFailed("org.freedesktop.Notifications".to_string());
        assert!(err.to_string().contains("org.freedesktop.Notifications"));
    }

    #[test]
    fn test_is_permission_error() {
        assert!(NotificationError::PermissionRequestFailed("x".into()).is_permission_error());
        assert!(!NotificationError::SendFailed("x".into()).is_permission_error());
    }

    #[test]
    fn test_suggestion() {
        assert!(NotificationError::SendFailed("x".into())
            .suggestion()
            .contains("enableNotification"));
    }
}
