pub mod deepl;
mod stub;

pub use stub::{StubBackend, StubConnector, StubRequest};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::error::AppError;
use crate::domain::language::{LanguageCode, SourceLanguage};
use crate::domain::types::{Language, Usage};

/// ゲートウェイ呼び出しのデフォルトタイムアウト
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// ログに出すテキストの最大文字数
const PREVIEW_CHARS: usize = 30;

/// 外部翻訳 API のエラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("API key is required")]
    MissingCredential,
    #[error("Authorization failed: {0}")]
    Auth(String),
    #[error("Character quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("Too many requests: {0}")]
    RateLimited(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    /// 接続性の問題（キーの良し悪しとは無関係）か
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        AppError::gateway(e.to_string())
    }
}

/// バックエンドが返す生の翻訳結果
#[derive(Debug, Clone, PartialEq)]
pub struct BackendTranslation {
    pub text: String,
    pub detected_source_lang: Option<String>,
}

/// バックエンドが返す文字数カウンタ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendUsage {
    pub character_count: u64,
    pub character_limit: u64,
}

/// 外部翻訳 API クライアント trait
///
/// `source` が `None` のときはバックエンド側で言語を自動検出する。
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate_text(
        &self,
        text: &str,
        source: Option<&LanguageCode>,
        target: &LanguageCode,
    ) -> Result<BackendTranslation, GatewayError>;

    async fn source_languages(&self) -> Result<Vec<Language>, GatewayError>;

    async fn target_languages(&self) -> Result<Vec<Language>, GatewayError>;

    async fn usage(&self) -> Result<BackendUsage, GatewayError>;

    fn name(&self) -> &str;
}

/// 認証情報からバックエンドを組み立てる
pub trait BackendConnector: Send + Sync {
    fn connect(&self, credential: &str) -> Result<Arc<dyn TranslationBackend>, GatewayError>;
}

/// ゲートウェイの翻訳結果
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayTranslation {
    pub translated_text: String,
    pub detected_source_lang: Option<LanguageCode>,
}

/// 認証情報の検証結果
///
/// `validate_credential` は bool に潰すが、こちらは不正なキーと到達不能を区別する。
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialStatus {
    Valid,
    Empty,
    Rejected(String),
    Unreachable(String),
}

impl CredentialStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// 外部翻訳 API のラッパー
///
/// 保持するのは認証済みバックエンドだけで、それ以外の状態は持たない。
pub struct TranslationGateway {
    backend: Arc<dyn TranslationBackend>,
    timeout: Duration,
}

impl TranslationGateway {
    /// 認証情報が空なら即座に失敗する
    pub fn connect(
        connector: &dyn BackendConnector,
        credential: &str,
    ) -> Result<Self, GatewayError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(GatewayError::MissingCredential);
        }
        let backend = connector.connect(credential)?;
        log::info!("翻訳ゲートウェイを初期化: {}", backend.name());
        Ok(Self {
            backend,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, GatewayError>>,
    ) -> Result<T, GatewayError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))?
    }

    pub async fn translate(
        &self,
        text: &str,
        source: &SourceLanguage,
        target: &LanguageCode,
    ) -> Result<GatewayTranslation, GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Text and target language are required".to_string(),
            ));
        }

        log::info!(
            "翻訳リクエスト [{}]: {source} -> {target}: \"{}\"",
            self.backend.name(),
            preview(text)
        );

        let result = self
            .bounded(self.backend.translate_text(text, source.explicit(), target))
            .await
            .inspect_err(|e| log::error!("翻訳 API エラー: {e}"))?;

        let detected_source_lang = result.detected_source_lang.as_deref().and_then(|code| {
            LanguageCode::new(code)
                .inspect_err(|_| log::warn!("検出言語コードが不正: {code}"))
                .ok()
        });

        Ok(GatewayTranslation {
            translated_text: result.text,
            detected_source_lang,
        })
    }

    /// 翻訳元として指定できる言語一覧
    pub async fn list_supported_languages(&self) -> Result<Vec<Language>, GatewayError> {
        self.bounded(self.backend.source_languages()).await
    }

    pub async fn list_target_languages(&self) -> Result<Vec<Language>, GatewayError> {
        self.bounded(self.backend.target_languages()).await
    }

    pub async fn usage(&self) -> Result<Usage, GatewayError> {
        let raw = self
            .bounded(self.backend.usage())
            .await
            .inspect_err(|e| log::error!("使用量の取得に失敗: {e}"))?;
        Ok(Usage::from_counts(raw.character_count, raw.character_limit))
    }

    /// 使い捨てクライアントで軽い認証付き呼び出し（言語一覧）を試す
    pub async fn check_credential(
        connector: &dyn BackendConnector,
        candidate: &str,
        timeout: Duration,
    ) -> CredentialStatus {
        if candidate.trim().is_empty() {
            return CredentialStatus::Empty;
        }

        let gateway = match Self::connect(connector, candidate) {
            Ok(gateway) => gateway.with_timeout(timeout),
            Err(e) => return CredentialStatus::Rejected(e.to_string()),
        };

        match gateway.list_supported_languages().await {
            Ok(_) => CredentialStatus::Valid,
            Err(e) if e.is_connectivity() => {
                log::warn!("API キー検証: サービスに到達できません: {e}");
                CredentialStatus::Unreachable(e.to_string())
            }
            Err(e) => {
                log::warn!("API キー検証に失敗: {e}");
                CredentialStatus::Rejected(e.to_string())
            }
        }
    }

    /// いかなる失敗も false にする（空文字列ならネットワークに出ない）
    pub async fn validate_credential(
        connector: &dyn BackendConnector,
        candidate: &str,
        timeout: Duration,
    ) -> bool {
        Self::check_credential(connector, candidate, timeout)
            .await
            .is_valid()
    }
}

/// ログ用に先頭だけ切り出す
pub(crate) fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> LanguageCode {
        LanguageCode::new(s).unwrap()
    }

    fn gateway(backend: Arc<StubBackend>) -> TranslationGateway {
        TranslationGateway::connect(&StubConnector::new(backend), "key:fx").unwrap()
    }

    #[test]
    fn test_connect_rejects_empty_credential() {
        let connector = StubConnector::new(Arc::new(StubBackend::new()));
        assert_eq!(
            TranslationGateway::connect(&connector, "  ").err(),
            Some(GatewayError::MissingCredential)
        );
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_translate_auto_passes_no_source() {
        let backend = Arc::new(StubBackend::new());
        backend.add_reply("Hello", "Hallo", Some("EN"));
        let gw = gateway(backend.clone());

        let result = gw
            .translate("Hello", &SourceLanguage::Auto, &code("DE"))
            .await
            .unwrap();
        assert_eq!(result.translated_text, "Hallo");
        assert_eq!(result.detected_source_lang, Some(code("EN")));

        let requests = backend.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].source, None);
        assert_eq!(requests[0].target, "DE");
    }

    #[tokio::test]
    async fn test_translate_rejects_blank_text_before_network() {
        let backend = Arc::new(StubBackend::new());
        let gw = gateway(backend.clone());

        let err = gw
            .translate("  ", &SourceLanguage::Auto, &code("DE"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_translate_propagates_backend_error() {
        let backend = Arc::new(StubBackend::new());
        backend.fail_with(GatewayError::QuotaExceeded("Quota exceeded".to_string()));
        let gw = gateway(backend);

        let err = gw
            .translate("Hello", &SourceLanguage::Auto, &code("DE"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_translate_times_out() {
        let backend = Arc::new(StubBackend::new());
        backend.set_delay("slow", Duration::from_secs(60));
        let gw = gateway(backend).with_timeout(Duration::from_secs(5));

        let err = gw
            .translate("slow", &SourceLanguage::Auto, &code("DE"))
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::Timeout(Duration::from_secs(5)));
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_usage_computation() {
        let backend = Arc::new(StubBackend::new());
        backend.set_usage(490_000, 500_000);
        let usage = gateway(backend).usage().await.unwrap();

        assert_eq!(usage.used, 490_000);
        assert_eq!(usage.limit, 500_000);
        assert_eq!(usage.remaining_chars, 10_000);
        assert_eq!(usage.percent_used, 98.0);
    }

    #[tokio::test]
    async fn test_validate_empty_credential_never_connects() {
        let connector = StubConnector::new(Arc::new(StubBackend::new()));
        let timeout = DEFAULT_REQUEST_TIMEOUT;

        assert!(!TranslationGateway::validate_credential(&connector, "", timeout).await);
        assert_eq!(
            TranslationGateway::check_credential(&connector, "", timeout).await,
            CredentialStatus::Empty
        );
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_check_credential_distinguishes_failures() {
        let connector =
            StubConnector::new(Arc::new(StubBackend::new())).accepting("good-key:fx");
        let timeout = DEFAULT_REQUEST_TIMEOUT;

        assert!(TranslationGateway::validate_credential(&connector, "good-key:fx", timeout).await);
        assert!(matches!(
            TranslationGateway::check_credential(&connector, "bad-key", timeout).await,
            CredentialStatus::Rejected(_)
        ));

        connector.set_offline(true);
        let status = TranslationGateway::check_credential(&connector, "good-key:fx", timeout).await;
        assert!(matches!(status, CredentialStatus::Unreachable(_)));
        assert!(!status.is_valid());
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview("short"), "short");
        let long = "あ".repeat(40);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
    }
}
