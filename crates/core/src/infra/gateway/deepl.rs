use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    BackendConnector, BackendTranslation, BackendUsage, GatewayError, TranslationBackend,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::domain::language::LanguageCode;
use crate::domain::types::Language;

pub const DEEPL_FREE_API_URL: &str = "https://api-free.deepl.com";
pub const DEEPL_PRO_API_URL: &str = "https://api.deepl.com";

/// Free プランのキーは ":fx" で終わる
pub fn base_url_for_key(api_key: &str) -> &'static str {
    if api_key.ends_with(":fx") {
        DEEPL_FREE_API_URL
    } else {
        DEEPL_PRO_API_URL
    }
}

/// DeepL API を使用したバックエンド
pub struct DeeplBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: [&'a str; 1],
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_lang: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslationItem>,
}

#[derive(Deserialize)]
struct TranslationItem {
    text: String,
    detected_source_language: Option<String>,
}

#[derive(Deserialize)]
struct LanguageItem {
    language: String,
    name: String,
    #[serde(default)]
    supports_formality: Option<bool>,
}

#[derive(Deserialize)]
struct UsageResponse {
    character_count: Option<u64>,
    character_limit: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl DeeplBackend {
    pub fn new(
        api_key: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hermes-translator/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Network(format!("HTTP client init failed: {e}")))?;

        let base_url = base_url
            .unwrap_or_else(|| base_url_for_key(&api_key))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client,
            api_key,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .header("Authorization", format!("DeepL-Auth-Key {}", self.api_key))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else {
            GatewayError::Network(format!("HTTP request failed: {e}"))
        }
    }

    async fn languages(&self, kind: &str) -> Result<Vec<Language>, GatewayError> {
        let response = self
            .send(
                self.client
                    .get(format!("{}/v2/languages", self.base_url))
                    .query(&[("type", kind)]),
            )
            .await?;

        let items: Vec<LanguageItem> = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("Response parse error: {e}")))?;

        Ok(items
            .into_iter()
            .map(|item| Language {
                code: item.language,
                name: item.name,
                supports_formality: item.supports_formality,
            })
            .collect())
    }
}

#[async_trait]
impl TranslationBackend for DeeplBackend {
    async fn translate_text(
        &self,
        text: &str,
        source: Option<&LanguageCode>,
        target: &LanguageCode,
    ) -> Result<BackendTranslation, GatewayError> {
        // source_lang は地域バリアントを受け付けない（"EN-US" は不可）
        let request = TranslateRequest {
            text: [text],
            target_lang: target.as_str(),
            source_lang: source.map(|code| code.base()),
        };

        let response = self
            .send(
                self.client
                    .post(format!("{}/v2/translate", self.base_url))
                    .json(&request),
            )
            .await?;

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("Response parse error: {e}")))?;

        first_translation(body)
    }

    async fn source_languages(&self) -> Result<Vec<Language>, GatewayError> {
        self.languages("source").await
    }

    async fn target_languages(&self) -> Result<Vec<Language>, GatewayError> {
        self.languages("target").await
    }

    async fn usage(&self) -> Result<BackendUsage, GatewayError> {
        let response = self
            .send(self.client.get(format!("{}/v2/usage", self.base_url)))
            .await?;

        let body: UsageResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("Response parse error: {e}")))?;

        match (body.character_count, body.character_limit) {
            (Some(character_count), Some(character_limit)) => Ok(BackendUsage {
                character_count,
                character_limit,
            }),
            _ => Err(GatewayError::InvalidResponse(
                "character usage not reported".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "deepl"
    }
}

/// DeepL 用コネクタ（キーごとに使い捨てクライアントを作る）
pub struct DeeplConnector {
    base_url: Option<String>,
    timeout: Duration,
}

impl DeeplConnector {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Self {
        Self { base_url, timeout }
    }
}

impl Default for DeeplConnector {
    fn default() -> Self {
        Self::new(None, DEFAULT_REQUEST_TIMEOUT)
    }
}

impl BackendConnector for DeeplConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn TranslationBackend>, GatewayError> {
        let backend = DeeplBackend::new(
            credential.to_string(),
            self.base_url.as_deref(),
            self.timeout,
        )?;
        Ok(Arc::new(backend))
    }
}

fn first_translation(body: TranslateResponse) -> Result<BackendTranslation, GatewayError> {
    let item = body
        .translations
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::InvalidResponse("Empty response from DeepL API".to_string()))?;

    Ok(BackendTranslation {
        text: item.text,
        detected_source_lang: item.detected_source_language,
    })
}

/// HTTP ステータスをエラー種別に振り分ける（456 は DeepL 固有の文字数上限）
fn error_for_status(status: u16, body: &str) -> GatewayError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => GatewayError::Auth(message),
        456 => GatewayError::QuotaExceeded(message),
        429 => GatewayError::RateLimited(message),
        _ => GatewayError::Api { status, message },
    }
}
