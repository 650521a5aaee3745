//! IPC 向けコマンドハンドラ
//!
//! シェル（webview 側）とやり取りする JSON の形をここで決める。ハンドラは
//! パニックせず、失敗は `{ error }` または `{ success: false, error }` で返す。

use serde::{Deserialize, Serialize};

use crate::domain::error::{AppError, ErrorCode};
use crate::domain::language::{LanguageCode, SourceLanguage};
use crate::domain::settings::{AppSettings, SettingsPatch, SettingsSnapshot};
use crate::domain::types::{HistoryEntry, Language, TranslationOutcome, Usage};

use super::orchestrator::RequestOrchestrator;

/// コマンドエラー型（例外として返すコマンド用）
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{}", .0.message)]
    App(#[from] AppError),
}

impl Serialize for CommandError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

type CmdResult<T> = Result<T, CommandError>;

/// 成功時は値そのもの、失敗時は `{ "error": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Ok(T),
    Error { error: String },
}

impl<T> Reply<T> {
    pub fn error(msg: impl Into<String>) -> Self {
        Self::Error { error: msg.into() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
        }
    }
}

impl From<Result<(), AppError>> for OpResult {
    fn from(result: Result<(), AppError>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(e) => Self::failed(e.message),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: String,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedText {
    pub translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<LanguageCode>,
    pub original_text: String,
}

impl From<TranslationOutcome> for TranslatedText {
    fn from(outcome: TranslationOutcome) -> Self {
        Self {
            translated_text: outcome.translated_text,
            detected_language: outcome.detected_language,
            original_text: outcome.original_text,
        }
    }
}

pub type TranslateResponse = Reply<TranslatedText>;

// --- Translation ---

pub async fn translate_text(
    service: &RequestOrchestrator,
    request: TranslateRequest,
) -> TranslateResponse {
    if request.text.trim().is_empty() {
        return Reply::error("Text and target language are required");
    }

    let source = match request.source_language.as_deref().map(SourceLanguage::parse) {
        Some(Ok(source)) => Some(source),
        Some(Err(e)) => return Reply::error(e.message),
        None => None,
    };
    let target = match request
        .target_language
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(LanguageCode::new)
    {
        Some(Ok(target)) => Some(target),
        Some(Err(e)) => return Reply::error(e.message),
        None => None,
    };

    match service.translate(&request.text, source, target).await {
        Ok(outcome) => Reply::Ok(outcome.into()),
        Err(e) => Reply::error(response_message(&e)),
    }
}

/// 翻訳先 → 翻訳元の向きで翻訳する
pub async fn translate_reverse(service: &RequestOrchestrator, text: String) -> TranslateResponse {
    if text.trim().is_empty() {
        return Reply::error("Text and target language are required");
    }
    match service.translate_reverse(&text).await {
        Ok(outcome) => Reply::Ok(outcome.into()),
        Err(e) => Reply::error(response_message(&e)),
    }
}

pub fn swap_languages(service: &RequestOrchestrator) -> CmdResult<AppSettings> {
    Ok(service.swap_languages()?)
}

fn response_message(e: &AppError) -> String {
    match e.code {
        ErrorCode::TranslationFailed => format!("Translation failed: {}", e.message),
        _ => e.message.clone(),
    }
}

// --- Settings ---

pub fn get_settings(service: &RequestOrchestrator) -> CmdResult<SettingsSnapshot> {
    Ok(service.settings_snapshot()?)
}

pub async fn save_settings(service: &RequestOrchestrator, patch: SettingsPatch) -> OpResult {
    match service.update_settings(patch).await {
        Ok(_) => OpResult::ok(),
        Err(e) => {
            log::error!("設定の保存に失敗: {e}");
            OpResult::failed(e.message)
        }
    }
}

pub fn remove_api_key(service: &RequestOrchestrator) -> OpResult {
    service.remove_credential().into()
}

pub async fn validate_api_key(service: &RequestOrchestrator, candidate: String) -> bool {
    service.validate_credential(&candidate).await
}

// --- History ---

pub fn get_history(service: &RequestOrchestrator) -> CmdResult<Vec<HistoryEntry>> {
    Ok(service.history()?)
}

/// UI から来るインデックスは負数もありうる
pub fn delete_history_item(service: &RequestOrchestrator, index: i64) -> OpResult {
    let Ok(index) = usize::try_from(index) else {
        return OpResult::failed(format!("Invalid index: {index}"));
    };
    match service.delete_history_at(index) {
        Ok(_) => OpResult::ok(),
        Err(e) => OpResult::failed(e.message),
    }
}

pub fn clear_history(service: &RequestOrchestrator) -> OpResult {
    service.clear_history().into()
}

pub fn get_recent_language_pairs(service: &RequestOrchestrator) -> CmdResult<Vec<String>> {
    Ok(service.recent_pairs()?)
}

// --- Service info ---

pub async fn get_usage(service: &RequestOrchestrator) -> Reply<Usage> {
    match service.usage().await {
        Ok(usage) => Reply::Ok(usage),
        Err(e) if e.code == ErrorCode::NotInitialized => Reply::error(e.message),
        Err(e) => Reply::error(format!("Error getting API usage: {}", e.message)),
    }
}

pub async fn get_supported_languages(service: &RequestOrchestrator) -> CmdResult<Vec<Language>> {
    Ok(service.supported_languages().await?)
}

pub async fn get_target_languages(service: &RequestOrchestrator) -> CmdResult<Vec<Language>> {
    Ok(service.target_languages().await?)
}

/// エラーメッセージをユーザー向けの文言に置き換える
pub fn friendly_error(message: &str) -> String {
    let lower = message.to_lowercase();
    if lower.contains("network") {
        "Network error while translating. Please check your internet connection.".to_string()
    } else if lower.contains("quota") {
        "Your DeepL API quota has been exceeded. Please check your usage or upgrade your plan."
            .to_string()
    } else if lower.contains("translator not initialized") {
        "Translator not initialized. Please check your API key in settings.".to_string()
    } else {
        format!("Translation error: {message}")
    }
}
