//! Errors - エラー分類とストアエラー
//!
//! 各レイヤーのエラー型は `kind()` で ErrorKind を返します。
//! 呼び出し側はこの分類だけを見てリトライ可否やログレベルを決めます。

/// ErrorKind は運用上の分類
///
/// - Validation: 呼び出し側の入力/状態が不正（リトライ無意味）
/// - Concurrency: version CAS の競合（読み直してからリトライ可能）
/// - Infrastructure: ストアやメッセージバスの障害（一時的）
/// - Handler: タスク handler の失敗（backoff 付きで再実行）
/// - Configuration: 起動時の構成ミス（fail-fast）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Concurrency,
    Infrastructure,
    Handler,
    Configuration,
}

/// StoreError は永続化ポートのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// version 付き UPDATE が 0 行だった
    #[error("{entity} {id} was modified concurrently (expected version {expected})")]
    VersionConflict {
        entity: &'static str,
        id: i64,
        expected: i64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::Validation,
            StoreError::VersionConflict { .. } => ErrorKind::Concurrency,
            StoreError::Unavailable(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
