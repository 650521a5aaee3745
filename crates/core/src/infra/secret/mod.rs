mod keychain;
mod memory;

pub use keychain::KeyringSecretStore;
pub use memory::MemorySecretStore;

/// キーチェーンのサービス名・アカウント名（固定）
pub const SECRET_SERVICE: &str = "HermesDesktopTranslator";
pub const SECRET_ACCOUNT: &str = "deepl-api-key";

/// シークレットストアのエラー
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret backend unavailable: {0}")]
    Backend(String),
    #[error("Failed to store credential: {0}")]
    Write(String),
    #[error("Failed to delete credential: {0}")]
    Delete(String),
}

impl From<SecretError> for crate::domain::error::AppError {
    fn from(e: SecretError) -> Self {
        Self::secret(e.to_string())
    }
}

/// 単一の認証情報（API キー）を保持する OS 連携ストア
///
/// 一般設定とは分離して保存する。`get` はバックエンド障害をログに残して
/// 「なし」として返し、呼び出し側には伝播しない。
pub trait SecretStore: Send + Sync {
    fn get(&self) -> Option<String>;

    fn set(&self, value: &str) -> Result<(), SecretError>;

    /// 存在しない認証情報の削除は成功扱い
    fn delete(&self) -> Result<(), SecretError>;

    fn name(&self) -> &str;

    fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

/// 空文字列・空白のみは「なし」と同じ扱い
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
