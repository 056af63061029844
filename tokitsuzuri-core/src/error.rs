//! Error types for tokitsuzuri

use thiserror::Error;

/// The main error type for tokitsuzuri operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// The host refused microphone access
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Speech capture, synthesis or a secure context is unavailable
    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// No API credential has been configured
    #[error("API credential is not configured")]
    CredentialMissing,

    /// The completion endpoint rejected the credential
    #[error("API credential was rejected")]
    CredentialInvalid,

    /// The completion endpoint is rate limiting us
    #[error("Rate limited by the completion endpoint")]
    RateLimited,

    /// The completion endpoint failed with a 5xx status
    #[error("Remote server error: {0}")]
    RemoteServerError(String),

    /// Network failure or an unusable response body
    #[error("Transport error: {0}")]
    Transport(String),

    /// A write would grow the store past its quota
    #[error("Storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    StorageQuotaExceeded { needed: usize, quota: usize },

    /// An import document could not be decoded
    #[error("Malformed import: {0}")]
    MalformedImport(String),

    /// There is nothing in the conversation to compose from
    #[error("Conversation is empty")]
    EmptyConversation,

    /// Host speech engine errors
    #[error("Speech error: {0}")]
    Speech(String),
}

/// A specialized Result type for tokitsuzuri operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// User-facing notification text for this error
    pub fn notification(&self) -> String {
        match self {
            Error::PermissionDenied(_) => {
                "マイクへのアクセスが拒否されました。設定を確認してください。".to_string()
            }
            Error::UnsupportedEnvironment(what) => {
                format!("この環境では{}がサポートされていません。", what)
            }
            Error::CredentialMissing => {
                "OpenAI APIキーが設定されていません。設定画面でAPIキーを入力してください。"
                    .to_string()
            }
            Error::CredentialInvalid => {
                "APIキーが無効です。設定画面で正しいAPIキーを入力してください。".to_string()
            }
            Error::RateLimited => {
                "API利用制限に達しました。しばらく時間をおいてから再試行してください。"
                    .to_string()
            }
            Error::RemoteServerError(_) => {
                "OpenAI APIサーバーでエラーが発生しています。しばらく時間をおいてから再試行してください。"
                    .to_string()
            }
            Error::Transport(_) => "申し訳ございません。エラーが発生しました。".to_string(),
            Error::StorageQuotaExceeded { .. } => {
                "保存に失敗しました。ストレージの容量を確認してください。".to_string()
            }
            Error::MalformedImport(_) => {
                "データのインポートに失敗しました。ファイル形式を確認してください。".to_string()
            }
            Error::EmptyConversation => "保存する会話がありません。".to_string(),
            Error::NotFound(_) => "日記が見つかりません。".to_string(),
            Error::Validation(msg) => format!("入力内容を確認してください: {}", msg),
            other => format!("エラーが発生しました: {}", other),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_for_credential_errors() {
        assert!(Error::CredentialMissing.notification().contains("APIキー"));
        assert!(Error::CredentialInvalid.notification().contains("無効"));
    }

    #[test]
    fn test_quota_error_display() {
        let err = Error::StorageQuotaExceeded {
            needed: 12,
            quota: 10,
        };
        assert_eq!(
            err.to_string(),
            "Storage quota exceeded: 12 bytes needed, quota is 10 bytes"
        );
    }
}
