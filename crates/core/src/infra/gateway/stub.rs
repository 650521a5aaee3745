use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BackendConnector, BackendTranslation, BackendUsage, GatewayError, TranslationBackend};
use crate::domain::language::LanguageCode;
use crate::domain::types::Language;

/// スタブが受け取ったリクエスト
#[derive(Debug, Clone, PartialEq)]
pub struct StubRequest {
    pub text: String,
    pub source: Option<String>,
    pub target: String,
}

/// StubBackend: ネットワークに出ない翻訳バックエンド
///
/// 登録済みの応答を返し、未登録のテキストは `[TARGET] text` の形で返す。
/// 自動検出のときは検出言語として "EN" を報告する。
pub struct StubBackend {
    replies: Mutex<HashMap<String, BackendTranslation>>,
    delays: Mutex<HashMap<String, Duration>>,
    failure: Mutex<Option<GatewayError>>,
    usage: Mutex<Option<BackendUsage>>,
    requests: Mutex<Vec<StubRequest>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            usage: Mutex::new(None),
            requests: Mutex::new(vec![]),
        }
    }

    /// すべての呼び出しが `error` で失敗するバックエンド
    pub fn failing(error: GatewayError) -> Self {
        let backend = Self::new();
        backend.fail_with(error);
        backend
    }

    pub fn add_reply(&self, text: &str, translated: &str, detected: Option<&str>) {
        self.replies.lock().insert(
            text.to_string(),
            BackendTranslation {
                text: translated.to_string(),
                detected_source_lang: detected.map(str::to_string),
            },
        );
    }

    /// 指定テキストの応答を遅らせる（競合の再現用）
    pub fn set_delay(&self, text: &str, delay: Duration) {
        self.delays.lock().insert(text.to_string(), delay);
    }

    pub fn fail_with(&self, error: GatewayError) {
        *self.failure.lock() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    pub fn set_usage(&self, character_count: u64, character_limit: u64) {
        *self.usage.lock() = Some(BackendUsage {
            character_count,
            character_limit,
        });
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().clone()
    }

    fn check_failure(&self) -> Result<(), GatewayError> {
        match self.failure.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn languages(codes: &[(&str, &str)]) -> Vec<Language> {
        codes
            .iter()
            .map(|(code, name)| Language {
                code: code.to_string(),
                name: name.to_string(),
                supports_formality: None,
            })
            .collect()
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationBackend for StubBackend {
    async fn translate_text(
        &self,
        text: &str,
        source: Option<&LanguageCode>,
        target: &LanguageCode,
    ) -> Result<BackendTranslation, GatewayError> {
        self.requests.lock().push(StubRequest {
            text: text.to_string(),
            source: source.map(|c| c.to_string()),
            target: target.to_string(),
        });

        let delay = self.delays.lock().get(text).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_failure()?;

        let reply = self.replies.lock().get(text).cloned();
        Ok(reply.unwrap_or_else(|| BackendTranslation {
            text: format!("[{target}] {text}"),
            detected_source_lang: match source {
                Some(code) => Some(code.to_string()),
                None => Some("EN".to_string()),
            },
        }))
    }

    async fn source_languages(&self) -> Result<Vec<Language>, GatewayError> {
        self.check_failure()?;
        Ok(Self::languages(&[("EN", "English"), ("DE", "German"), ("JA", "Japanese")]))
    }

    async fn target_languages(&self) -> Result<Vec<Language>, GatewayError> {
        self.check_failure()?;
        Ok(Self::languages(&[
            ("EN-US", "English (American)"),
            ("DE", "German"),
            ("JA", "Japanese"),
        ]))
    }

    async fn usage(&self) -> Result<BackendUsage, GatewayError> {
        self.check_failure()?;
        (*self.usage.lock())
            .ok_or_else(|| GatewayError::InvalidResponse("usage not reported".to_string()))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// StubConnector: 常に同じ StubBackend を返すコネクタ
///
/// `accepting` で受け付けるキーを絞ると、それ以外のキーでは認証エラーを返す
/// バックエンドになる。`set_offline` 中はどのキーでもネットワークエラーになる。
pub struct StubConnector {
    backend: Arc<StubBackend>,
    accepted_key: Option<String>,
    offline: AtomicBool,
    connects: AtomicUsize,
}

impl StubConnector {
    pub fn new(backend: Arc<StubBackend>) -> Self {
        Self {
            backend,
            accepted_key: None,
            offline: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn accepting(mut self, key: &str) -> Self {
        self.accepted_key = Some(key.to_string());
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl BackendConnector for StubConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn TranslationBackend>, GatewayError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        if self.offline.load(Ordering::SeqCst) {
            return Ok(Arc::new(StubBackend::failing(GatewayError::Network(
                "connection refused".to_string(),
            ))));
        }

        match &self.accepted_key {
            Some(key) if key != credential => Ok(Arc::new(StubBackend::failing(
                GatewayError::Auth("Invalid API key".to_string()),
            ))),
            _ => Ok(self.backend.clone()),
        }
    }
}
