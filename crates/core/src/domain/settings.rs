use serde::{Deserialize, Serialize};

use super::language::{LanguageCode, SourceLanguage};

/// 翻訳履歴の上限件数
pub const HISTORY_LIMIT: usize = 50;
/// 最近使った言語ペアの上限件数
pub const RECENT_PAIRS_LIMIT: usize = 5;

/// 設定ストア上のキー（履歴・ペアは設定と同じドキュメントに保存する）
pub const HISTORY_KEY: &str = "translationHistory";
pub const RECENT_PAIRS_KEY: &str = "recentLanguagePairs";

pub const DEFAULT_TARGET_LANGUAGE: &str = "EN-US";
pub const DEFAULT_SHORTCUT: &str = "Control+Alt+H";

/// アプリケーション設定
///
/// キー名はストア上でもUI上でも camelCase。存在しないキーはデフォルト値で補う。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// 翻訳先言語（デフォルト "EN-US"）
    pub target_language: LanguageCode,
    /// 翻訳元言語（デフォルト自動検出）
    pub source_language: SourceLanguage,
    /// グローバルホットキー
    pub shortcut: String,
    pub minimize_to_tray: bool,
    pub minimize_to_tray_on_esc: bool,
    pub close_on_focus_loss: bool,
    /// ホットキー押下時にクリップボードの内容を翻訳ウィンドウへ送る
    pub auto_translate_clipboard: bool,
    /// 入力中にデバウンスして翻訳する
    pub real_time_translation: bool,
    pub show_tray_notifications: bool,
    /// 成功した翻訳を履歴に残すか
    pub save_history: bool,
    pub dark_theme: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            source_language: SourceLanguage::Auto,
            shortcut: DEFAULT_SHORTCUT.to_string(),
            minimize_to_tray: true,
            minimize_to_tray_on_esc: true,
            close_on_focus_loss: true,
            auto_translate_clipboard: true,
            real_time_translation: true,
            show_tray_notifications: true,
            save_history: true,
            dark_theme: false,
        }
    }
}

pub fn default_target_language() -> LanguageCode {
    LanguageCode::from_static(DEFAULT_TARGET_LANGUAGE)
}

/// 部分更新（UI の save-settings に対応）
///
/// `api_key` はシークレットストア行きなので設定ドキュメントには決して書き出さない。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_language: Option<LanguageCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<SourceLanguage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimize_to_tray: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimize_to_tray_on_esc: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_on_focus_loss: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_translate_clipboard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_time_translation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_tray_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dark_theme: Option<bool>,
}

impl SettingsPatch {
    /// 設定フィールドを1つでも含むか（api_key は数えない）
    pub fn has_settings_fields(&self) -> bool {
        self.target_language.is_some()
            || self.source_language.is_some()
            || self.shortcut.is_some()
            || self.minimize_to_tray.is_some()
            || self.minimize_to_tray_on_esc.is_some()
            || self.close_on_focus_loss.is_some()
            || self.auto_translate_clipboard.is_some()
            || self.real_time_translation.is_some()
            || self.show_tray_notifications.is_some()
            || self.save_history.is_some()
            || self.dark_theme.is_some()
    }
}

/// UI に渡す設定スナップショット
///
/// `api_key` は編集用にシークレットストアから都度読み出し、`api_key_set` は
/// 保存せず毎回シークレットストアから導出する。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    #[serde(flatten)]
    pub settings: AppSettings,
    pub api_key: String,
    pub api_key_set: bool,
}
