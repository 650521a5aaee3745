use serde::Serialize;

/// アプリケーション共通エラーコード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_NOT_INITIALIZED")]
    NotInitialized,
    #[serde(rename = "E_TRANSLATION_FAILED")]
    TranslationFailed,
    #[serde(rename = "E_GATEWAY")]
    Gateway,
    #[serde(rename = "E_OUT_OF_RANGE")]
    OutOfRange,
    #[serde(rename = "E_INVALID_INPUT")]
    InvalidInput,
    #[serde(rename = "E_STORAGE")]
    Storage,
    #[serde(rename = "E_SECRET")]
    Secret,
    #[serde(rename = "E_INTERNAL")]
    Internal,
}

/// アプリケーションエラー（IPC レスポンス兼用）
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    /// 翻訳クライアント未構成。ユーザーには API キーの確認を促す
    pub fn not_initialized() -> Self {
        Self {
            code: ErrorCode::NotInitialized,
            message: "Translator not initialized. Please check your API key.".to_string(),
            recoverable: true,
        }
    }

    pub fn translation_failed(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::TranslationFailed,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Gateway,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self {
            code: ErrorCode::OutOfRange,
            message: format!("Invalid index: {index} (history has {len} entries)"),
            recoverable: true,
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Storage,
            message: msg.into(),
            recoverable: false,
        }
    }

    pub fn secret(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Secret,
            message: msg.into(),
            recoverable: true,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: msg.into(),
            recoverable: false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
