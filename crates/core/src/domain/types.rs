use serde::{Deserialize, Serialize};

use super::language::{LanguageCode, SourceLanguage};

/// 翻訳履歴エントリ（作成後は不変）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub original_text: String,
    pub translated_text: String,
    /// 解決済みの翻訳元言語。型の上で "auto" にはなり得ない
    pub source_lang: LanguageCode,
    pub target_lang: LanguageCode,
    /// ISO-8601（UTC, ミリ秒）
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn new(
        original_text: impl Into<String>,
        translated_text: impl Into<String>,
        source_lang: LanguageCode,
        target_lang: LanguageCode,
    ) -> Self {
        Self {
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            source_lang,
            target_lang,
            timestamp: chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

/// 対応言語の記述子
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Language {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supports_formality: Option<bool>,
}

/// 残り文字数がこれを下回ったら UI に警告を出す
pub const LOW_USAGE_THRESHOLD: u64 = 1_000;

/// 今期の文字数使用量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub used: u64,
    pub limit: u64,
    pub remaining_chars: u64,
    pub percent_used: f64,
    pub limit_reached: bool,
}

impl Usage {
    pub fn from_counts(used: u64, limit: u64) -> Self {
        let percent_used = if limit == 0 {
            0.0
        } else {
            used as f64 * 100.0 / limit as f64
        };
        Self {
            used,
            limit,
            remaining_chars: limit.saturating_sub(used),
            percent_used,
            limit_reached: limit > 0 && used >= limit,
        }
    }

    pub fn is_low(&self, threshold: u64) -> bool {
        self.remaining_chars < threshold
    }
}

/// 翻訳リクエストの結果（オーケストレーターが返す）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationOutcome {
    pub translated_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<LanguageCode>,
    pub original_text: String,
    /// リクエスト時の翻訳元（自動検出のままのこともある）
    #[serde(skip)]
    pub requested_source: SourceLanguage,
    #[serde(skip)]
    pub target: LanguageCode,
}

impl TranslationOutcome {
    /// 履歴・ペアに記録する実効的な翻訳元言語
    pub fn effective_source(&self) -> Option<&LanguageCode> {
        match &self.requested_source {
            SourceLanguage::Explicit(code) => Some(code),
            SourceLanguage::Auto => self.detected_language.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_from_counts() {
        let usage = Usage::from_counts(490_000, 500_000);
        assert_eq!(usage.remaining_chars, 10_000);
        assert_eq!(usage.percent_used, 98.0);
        assert!(!usage.limit_reached);
        assert!(!usage.is_low(LOW_USAGE_THRESHOLD));
    }

    #[test]
    fn test_usage_zero_limit() {
        let usage = Usage::from_counts(10, 0);
        assert_eq!(usage.remaining_chars, 0);
        assert_eq!(usage.percent_used, 0.0);
        assert!(!usage.limit_reached);
    }

    #[test]
    fn test_usage_over_limit_saturates() {
        let usage = Usage::from_counts(500_100, 500_000);
        assert_eq!(usage.remaining_chars, 0);
        assert!(usage.limit_reached);
        assert!(usage.is_low(LOW_USAGE_THRESHOLD));
    }

    #[test]
    fn test_effective_source_prefers_explicit_hint() {
        let outcome = TranslationOutcome {
            translated_text: "Hallo".to_string(),
            detected_language: Some(LanguageCode::new("EN").unwrap()),
            original_text: "Hello".to_string(),
            requested_source: SourceLanguage::parse("FR").unwrap(),
            target: LanguageCode::new("DE").unwrap(),
        };
        assert_eq!(outcome.effective_source().unwrap().as_str(), "FR");
    }

    #[test]
    fn test_history_timestamp_is_iso8601() {
        let entry = HistoryEntry::new(
            "a",
            "b",
            LanguageCode::new("EN").unwrap(),
            LanguageCode::new("DE").unwrap(),
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
        assert!(entry.timestamp.ends_with('Z'));
    }
}
