use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::error::AppError;
use crate::domain::language::{LanguageCode, LanguagePair, SourceLanguage};
use crate::domain::sequence::{RequestSequencer, RequestTicket};
use crate::domain::settings::{
    default_target_language, AppSettings, SettingsPatch, SettingsSnapshot,
};
use crate::domain::types::{HistoryEntry, Language, TranslationOutcome, Usage};
use crate::infra::config::AppConfig;
use crate::infra::gateway::deepl::DeeplConnector;
use crate::infra::gateway::{
    BackendConnector, CredentialStatus, TranslationGateway, DEFAULT_REQUEST_TIMEOUT,
};
use crate::infra::secret::{KeyringSecretStore, SecretStore};
use crate::infra::storage::Storage;

/// 翻訳リクエストのオーケストレーター（シェル側の State として管理される）
///
/// ゲートウェイ呼び出しの前後で設定ストアを読み書きするが、ロックを保持したまま
/// await はしない。
pub struct RequestOrchestrator {
    storage: Mutex<Storage>,
    secrets: Arc<dyn SecretStore>,
    connector: Arc<dyn BackendConnector>,
    gateway: Mutex<Option<Arc<TranslationGateway>>>,
    sequencer: RequestSequencer,
    request_timeout: Duration,
}

impl RequestOrchestrator {
    pub fn new(
        storage: Storage,
        secrets: Arc<dyn SecretStore>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        Self {
            storage: Mutex::new(storage),
            secrets,
            connector,
            gateway: Mutex::new(None),
            sequencer: RequestSequencer::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// 本番構成: SQLite ファイル + OS キーチェーン + DeepL
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        config
            .ensure_data_dir()
            .map_err(|e| AppError::storage(format!("データディレクトリ作成失敗: {e}")))?;
        let storage = Storage::open(&config.db_path.to_string_lossy())?;
        let connector = DeeplConnector::new(config.deepl_api_url.clone(), config.request_timeout);

        Ok(Self::new(
            storage,
            Arc::new(KeyringSecretStore::new()),
            Arc::new(connector),
        )
        .with_request_timeout(config.request_timeout))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    // ==================== Gateway ====================

    /// シークレットストアのキーでゲートウェイを作り直す。キーがなければ false
    pub fn initialize(&self) -> bool {
        let Some(credential) = self.secrets.get() else {
            log::info!("API キーが未設定のため翻訳クライアントを初期化しません");
            *self.gateway.lock() = None;
            return false;
        };

        match TranslationGateway::connect(self.connector.as_ref(), &credential) {
            Ok(gateway) => {
                *self.gateway.lock() = Some(Arc::new(gateway.with_timeout(self.request_timeout)));
                true
            }
            Err(e) => {
                log::error!("翻訳クライアントの初期化に失敗: {e}");
                *self.gateway.lock() = None;
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.gateway.lock().is_some()
    }

    /// 初期化済みのゲートウェイを返す。未初期化なら一度だけ遅延初期化を試みる
    fn ensure_gateway(&self) -> Result<Arc<TranslationGateway>, AppError> {
        if let Some(gateway) = self.gateway.lock().clone() {
            return Ok(gateway);
        }

        log::info!("翻訳クライアント未初期化のため初期化を試みます");
        self.initialize();
        self.gateway.lock().clone().ok_or_else(AppError::not_initialized)
    }

    // ==================== Translation ====================

    /// 翻訳して履歴・最近の言語ペアを更新する
    ///
    /// `target` を省略すると保存済みの翻訳先言語、`source` を省略すると自動検出。
    /// ゲートウェイが失敗した場合は履歴もペアも変更しない。
    pub async fn translate(
        &self,
        text: &str,
        source: Option<SourceLanguage>,
        target: Option<LanguageCode>,
    ) -> Result<TranslationOutcome, AppError> {
        let gateway = self.ensure_gateway()?;

        let target = match target {
            Some(target) => target,
            None => self.settings()?.target_language,
        };
        let source = source.unwrap_or_default();

        let result = gateway
            .translate(text, &source, &target)
            .await
            .map_err(|e| AppError::translation_failed(e.to_string()))?;

        let outcome = TranslationOutcome {
            translated_text: result.translated_text,
            detected_language: result.detected_source_lang,
            original_text: text.to_string(),
            requested_source: source,
            target,
        };

        if let Err(e) = self.record(&outcome) {
            log::error!("翻訳結果の記録に失敗: {e}");
        }

        Ok(outcome)
    }

    /// 逆方向（翻訳先 → 翻訳元）の翻訳。翻訳元が自動検出なら EN-US に訳す
    pub async fn translate_reverse(&self, text: &str) -> Result<TranslationOutcome, AppError> {
        let settings = self.settings()?;
        let target = match settings.source_language {
            SourceLanguage::Explicit(code) => code,
            SourceLanguage::Auto => default_target_language(),
        };
        self.translate(
            text,
            Some(SourceLanguage::Explicit(settings.target_language)),
            Some(target),
        )
        .await
    }

    fn record(&self, outcome: &TranslationOutcome) -> Result<(), AppError> {
        let Some(source) = outcome.effective_source() else {
            log::warn!("翻訳元言語が検出されなかったため履歴に記録しません");
            return Ok(());
        };

        let storage = self.storage.lock();
        let save_history = storage.get_value("saveHistory", true)?;
        if save_history {
            let entry = HistoryEntry::new(
                outcome.original_text.clone(),
                outcome.translated_text.clone(),
                source.clone(),
                outcome.target.clone(),
            );
            // 履歴が壊れていても言語ペアは記録する
            if let Err(e) = storage.append_history(entry) {
                log::error!("履歴の追加に失敗: {e}");
            }
        }

        storage.touch_pair(&LanguagePair::new(source.clone(), outcome.target.clone()))?;
        Ok(())
    }

    // ==================== Sequencing ====================

    /// 新しいリクエストのチケットを発行する（以前のチケットは古くなる）
    pub fn begin_request(&self) -> RequestTicket {
        self.sequencer.issue()
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.sequencer.is_latest(ticket)
    }

    // ==================== Languages ====================

    /// 翻訳元と翻訳先を入れ替える（翻訳元が自動検出のときは不可）
    pub fn swap_languages(&self) -> Result<AppSettings, AppError> {
        let storage = self.storage.lock();
        let mut settings = storage.get_settings()?;

        let SourceLanguage::Explicit(source) = settings.source_language.clone() else {
            return Err(AppError::invalid_input(
                "Cannot swap when source language is set to Auto-detect",
            ));
        };

        settings.source_language = SourceLanguage::Explicit(settings.target_language.clone());
        settings.target_language = source;

        storage.set_value("sourceLanguage", &settings.source_language)?;
        storage.set_value("targetLanguage", &settings.target_language)?;
        Ok(settings)
    }

    pub async fn supported_languages(&self) -> Result<Vec<Language>, AppError> {
        let gateway = self.ensure_gateway()?;
        Ok(gateway.list_supported_languages().await?)
    }

    pub async fn target_languages(&self) -> Result<Vec<Language>, AppError> {
        let gateway = self.ensure_gateway()?;
        Ok(gateway.list_target_languages().await?)
    }

    pub async fn usage(&self) -> Result<Usage, AppError> {
        let gateway = self.ensure_gateway()?;
        Ok(gateway.usage().await?)
    }

    // ==================== Credential ====================

    /// シークレットストアに認証情報があるか（保存フラグではなく毎回確認する）
    pub fn api_key_set(&self) -> bool {
        self.secrets.is_present()
    }

    pub async fn check_credential(&self, candidate: &str) -> CredentialStatus {
        TranslationGateway::check_credential(
            self.connector.as_ref(),
            candidate,
            self.request_timeout,
        )
        .await
    }

    pub async fn validate_credential(&self, candidate: &str) -> bool {
        self.check_credential(candidate).await.is_valid()
    }

    /// 認証情報を保存し、ゲートウェイを作り直す
    pub fn save_credential(&self, credential: &str) -> Result<(), AppError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(AppError::invalid_input("API key is required"));
        }
        self.secrets.set(credential)?;
        self.initialize();
        Ok(())
    }

    pub fn remove_credential(&self) -> Result<(), AppError> {
        self.secrets.delete()?;
        *self.gateway.lock() = None;
        log::info!("API キーを削除し翻訳クライアントを破棄しました");
        Ok(())
    }

    // ==================== Settings ====================

    pub fn settings(&self) -> Result<AppSettings, AppError> {
        self.storage.lock().get_settings()
    }

    /// UI 用スナップショット（API キーは編集用に都度読み出す）
    pub fn settings_snapshot(&self) -> Result<SettingsSnapshot, AppError> {
        let settings = self.settings()?;
        let api_key = self.secrets.get();
        Ok(SettingsSnapshot {
            settings,
            api_key_set: api_key.is_some(),
            api_key: api_key.unwrap_or_default(),
        })
    }

    /// 部分更新を適用する
    ///
    /// 変更された API キーは保存前に検証する。設定フィールドはキーの検証結果に
    /// かかわらず保存し、キーが不正だった場合はその後でエラーを返す。
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Vec<String>, AppError> {
        let new_key = patch
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .filter(|k| self.secrets.get().as_deref() != Some(*k))
            .map(str::to_string);

        let key_status = match &new_key {
            Some(key) => Some(self.check_credential(key).await),
            None => None,
        };

        let written = if patch.has_settings_fields() {
            self.storage.lock().apply_patch(&patch)?
        } else {
            Vec::new()
        };
        if !written.is_empty() {
            log::info!("設定を保存: {}", written.join(", "));
        }

        match (new_key, key_status) {
            (Some(key), Some(CredentialStatus::Valid)) => {
                self.save_credential(&key)?;
                Ok(written)
            }
            (Some(_), Some(CredentialStatus::Unreachable(msg))) => Err(AppError::gateway(format!(
                "Could not verify API key, network error: {msg}"
            ))),
            (Some(_), Some(status)) => {
                log::warn!("API キーが検証に失敗したため保存しません: {status:?}");
                Err(AppError::invalid_input(
                    "Invalid API key. Please check your key and try again.",
                ))
            }
            _ => Ok(written),
        }
    }

    // ==================== History ====================

    pub fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        self.storage.lock().history()
    }

    pub fn history_entry(&self, index: usize) -> Result<HistoryEntry, AppError> {
        let history = self.history()?;
        let len = history.len();
        history
            .into_iter()
            .nth(index)
            .ok_or_else(|| AppError::out_of_range(index, len))
    }

    pub fn delete_history_at(&self, index: usize) -> Result<HistoryEntry, AppError> {
        self.storage.lock().delete_history_at(index)
    }

    pub fn clear_history(&self) -> Result<(), AppError> {
        self.storage.lock().clear_history()?;
        log::info!("翻訳履歴をすべて削除しました");
        Ok(())
    }

    pub fn recent_pairs(&self) -> Result<Vec<String>, AppError> {
        self.storage.lock().recent_pairs()
    }

    #[cfg(test)]
    pub(crate) fn storage_for_tests(&self) -> parking_lot::MutexGuard<'_, Storage> {
        self.storage.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCode;
    use crate::infra::gateway::{GatewayError, StubBackend, StubConnector};
    use crate::infra::secret::MemorySecretStore;

    const KEY: &str = "valid-key:fx";

    struct Fixture {
        service: RequestOrchestrator,
        backend: Arc<StubBackend>,
        secrets: Arc<MemorySecretStore>,
    }

    fn fixture(credential: Option<&str>) -> Fixture {
        let backend = Arc::new(StubBackend::new());
        let secrets = Arc::new(match credential {
            Some(key) => MemorySecretStore::with_value(key),
            None => MemorySecretStore::new(),
        });
        let connector = StubConnector::new(backend.clone()).accepting(KEY);
        let service = RequestOrchestrator::new(
            Storage::open_in_memory().unwrap(),
            secrets.clone(),
            Arc::new(connector),
        );
        Fixture {
            service,
            backend,
            secrets,
        }
    }

    fn code(s: &str) -> LanguageCode {
        LanguageCode::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_translate_without_credential_is_not_initialized() {
        let f = fixture(None);
        let err = f
            .service
            .translate("Hello", Some(SourceLanguage::Auto), Some(code("DE")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInitialized);
        assert!(f.service.history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_translate_auto_records_detected_language() {
        let f = fixture(Some(KEY));
        f.backend.add_reply("Hello", "Hallo", Some("EN"));

        let outcome = f
            .service
            .translate("Hello", Some(SourceLanguage::Auto), Some(code("DE")))
            .await
            .unwrap();
        assert_eq!(outcome.translated_text, "Hallo");
        assert_eq!(outcome.detected_language, Some(code("EN")));

        let history = f.service.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].source_lang.as_str(), "EN");
        assert_eq!(history[0].target_lang.as_str(), "DE");
        assert_eq!(f.service.recent_pairs().unwrap(), vec!["EN:DE"]);
    }

    #[tokio::test]
    async fn test_translate_uses_stored_target_when_absent() {
        let f = fixture(Some(KEY));
        f.service
            .update_settings(SettingsPatch {
                target_language: Some(code("JA")),
                ..Default::default()
            })
            .await
            .unwrap();

        let outcome = f.service.translate("Hello", None, None).await.unwrap();
        assert_eq!(outcome.target.as_str(), "JA");
        assert_eq!(f.backend.requests()[0].target, "JA");
        assert_eq!(f.backend.requests()[0].source, None);
    }

    #[tokio::test]
    async fn test_translate_explicit_source_recorded_as_given() {
        let f = fixture(Some(KEY));
        f.backend.add_reply("Bonjour", "Hello", Some("FR"));
        f.service
            .translate("Bonjour", Some(SourceLanguage::parse("fr").unwrap()), Some(code("EN-US")))
            .await
            .unwrap();
        assert_eq!(f.service.recent_pairs().unwrap(), vec!["FR:EN-US"]);
    }

    #[tokio::test]
    async fn test_history_disabled_still_tracks_pairs() {
        let f = fixture(Some(KEY));
        f.service
            .update_settings(SettingsPatch {
                save_history: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        for _ in 0..2 {
            f.service
                .translate("Hello", Some(SourceLanguage::Auto), Some(code("DE")))
                .await
                .unwrap();
        }

        assert!(f.service.history().unwrap().is_empty());
        assert_eq!(f.service.recent_pairs().unwrap(), vec!["EN:DE"]);
    }

    #[tokio::test]
    async fn test_gateway_failure_mutates_nothing() {
        let f = fixture(Some(KEY));
        f.backend
            .fail_with(GatewayError::Network("connection reset".to_string()));

        let err = f
            .service
            .translate("Hello", None, Some(code("DE")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslationFailed);
        assert!(err.message.contains("connection reset"));
        assert!(f.service.history().unwrap().is_empty());
        assert!(f.service.recent_pairs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_survives_translation() {
        let f = fixture(Some(KEY));
        f.service
            .storage_for_tests()
            .set_value("translationHistory", "not a list")
            .unwrap();

        let outcome = f
            .service
            .translate("Hallo", None, Some(code("DE")))
            .await
            .unwrap();

        assert_eq!(outcome.translated_text, "[DE] Hallo");
        assert!(f.service.history().unwrap().is_empty());
        let raw: String = f
            .service
            .storage_for_tests()
            .get_value("translationHistory", String::new())
            .unwrap();
        assert_eq!(raw, "not a list");
        assert_eq!(f.service.recent_pairs().unwrap(), vec!["EN:DE"]);
    }

    #[tokio::test]
    async fn test_auto_without_detection_skips_history() {
        let f = fixture(Some(KEY));
        f.backend.add_reply("???", "???", None);

        let outcome = f
            .service
            .translate("???", Some(SourceLanguage::Auto), Some(code("DE")))
            .await
            .unwrap();
        assert_eq!(outcome.translated_text, "???");
        assert!(f.service.history().unwrap().is_empty());
        assert!(f.service.recent_pairs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_translate_reverse() {
        let f = fixture(Some(KEY));
        f.service
            .translate_reverse("Hallo")
            .await
            .unwrap();

        let request = &f.backend.requests()[0];
        assert_eq!(request.source.as_deref(), Some("EN-US"));
        assert_eq!(request.target, "EN-US");
    }

    #[test]
    fn test_swap_languages() {
        let f = fixture(None);
        let err = f.service.swap_languages().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        f.service
            .storage
            .lock()
            .set_value("sourceLanguage", "JA")
            .unwrap();
        let swapped = f.service.swap_languages().unwrap();
        assert_eq!(swapped.source_language.as_str(), "EN-US");
        assert_eq!(swapped.target_language.as_str(), "JA");
        assert_eq!(f.service.settings().unwrap(), swapped);
    }

    #[test]
    fn test_api_key_set_is_derived_from_secret_store() {
        let f = fixture(None);
        assert!(!f.service.api_key_set());
        assert!(!f.service.settings_snapshot().unwrap().api_key_set);

        f.secrets.set(KEY).unwrap();
        let snapshot = f.service.settings_snapshot().unwrap();
        assert!(snapshot.api_key_set);
        assert_eq!(snapshot.api_key, KEY);

        f.secrets.delete().unwrap();
        assert!(!f.service.api_key_set());
    }

    #[tokio::test]
    async fn test_update_settings_with_valid_key_initializes() {
        let f = fixture(None);
        let written = f
            .service
            .update_settings(SettingsPatch {
                api_key: Some(KEY.to_string()),
                dark_theme: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(written, vec!["darkTheme"]);
        assert!(f.service.is_initialized());
        assert_eq!(f.secrets.get().as_deref(), Some(KEY));
    }

    #[tokio::test]
    async fn test_update_settings_key_only_writes_no_settings() {
        let f = fixture(None);
        let written = f
            .service
            .update_settings(SettingsPatch {
                api_key: Some(KEY.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(written.is_empty());
        assert!(f.service.is_initialized());
        let stored: Option<bool> = f
            .service
            .storage_for_tests()
            .get_value("darkTheme", None)
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn test_update_settings_with_invalid_key_keeps_other_fields() {
        let f = fixture(None);
        let err = f
            .service
            .update_settings(SettingsPatch {
                api_key: Some("wrong".to_string()),
                dark_theme: Some(true),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(f.secrets.get().is_none());
        assert!(f.service.settings().unwrap().dark_theme);
    }

    #[tokio::test]
    async fn test_remove_credential_drops_gateway() {
        let f = fixture(Some(KEY));
        assert!(f.service.initialize());

        f.service.remove_credential().unwrap();
        assert!(!f.service.is_initialized());
        let err = f.service.usage().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotInitialized);
    }

    #[tokio::test]
    async fn test_usage_through_orchestrator() {
        let f = fixture(Some(KEY));
        f.backend.set_usage(490_000, 500_000);
        let usage = f.service.usage().await.unwrap();
        assert_eq!(usage.remaining_chars, 10_000);
        assert_eq!(usage.percent_used, 98.0);
    }

    #[test]
    fn test_history_entry_lookup_out_of_range() {
        let f = fixture(None);
        assert_eq!(
            f.service.history_entry(0).unwrap_err().code,
            ErrorCode::OutOfRange
        );
    }
}
