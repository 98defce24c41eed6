//! Storage error types.

use thiserror::Error;

/// Errors that can occur while reading or writing persistent state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database reported an error.
    #[error("データベースエラー: {0}")]
    Database(#[from] rusqlite::Error),

    /// The database file could not be prepared.
    #[error("データベースを開けませんでした: {0}")]
    Open(String),

    /// No record with the given id exists.
    #[error("記録が見つかりません: {0}")]
    NotFound(String),

    /// A lock guarding the store was poisoned.
    #[error("ストアのロックが破損しています")]
    LockPoisoned,

    /// Simulated or backend-specific failure.
    #[error("ストアエラー: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if the error means the requested record is missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if retrying later might succeed (e.g. a busy database).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            Self::Backend(_) => true,
            _ => false,
        }
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Database(_) => "データベースファイルの権限と空き容量を確認してください",
            Self::Open(_) => "--db で書き込み可能なパスを指定してください",
            Self::NotFound(_) => "history コマンドで記録IDを確認してください",
            Self::LockPoisoned => "アプリケーションを再起動してください",
            Self::Backend(_) => "しばらくしてから再試行してください",
        }
    }
}
