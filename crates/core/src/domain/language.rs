use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::AppError;

/// 自動検出を表す予約値（ワイヤー上の表現）
pub const AUTO: &str = "auto";

/// 言語ペアの区切り文字（"SRC:TGT"）
pub const PAIR_SEPARATOR: char = ':';

/// 具体的な言語コード。大文字に正規化され、"auto" にはならない
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: impl AsRef<str>) -> Result<Self, AppError> {
        let trimmed = code.as_ref().trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("Language code is empty"));
        }
        if trimmed.eq_ignore_ascii_case(AUTO) {
            return Err(AppError::invalid_input(
                "\"auto\" is not a concrete language code",
            ));
        }
        if trimmed.contains(PAIR_SEPARATOR) || trimmed.contains(char::is_whitespace) {
            return Err(AppError::invalid_input(format!(
                "Malformed language code: {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// 大文字の定数からそのまま作る（検証済みの既定値用）
    pub(crate) fn from_static(code: &'static str) -> Self {
        Self(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 地域バリアントを除いた基本コード（"EN-US" → "EN"）
    pub fn base(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LanguageCode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for LanguageCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for LanguageCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// 翻訳元言語。自動検出は文字列ではなく型で表す
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SourceLanguage {
    #[default]
    Auto,
    Explicit(LanguageCode),
}

impl SourceLanguage {
    /// 空文字列と "auto"（大小無視）は自動検出として扱う
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(AUTO) {
            return Ok(Self::Auto);
        }
        LanguageCode::new(trimmed).map(Self::Explicit)
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    pub fn explicit(&self) -> Option<&LanguageCode> {
        match self {
            Self::Auto => None,
            Self::Explicit(code) => Some(code),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => AUTO,
            Self::Explicit(code) => code.as_str(),
        }
    }
}

impl From<LanguageCode> for SourceLanguage {
    fn from(code: LanguageCode) -> Self {
        Self::Explicit(code)
    }
}

impl fmt::Display for SourceLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SourceLanguage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceLanguage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// 最近使った言語ペア
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub source: LanguageCode,
    pub target: LanguageCode,
}

impl LanguagePair {
    pub fn new(source: LanguageCode, target: LanguageCode) -> Self {
        Self { source, target }
    }

    /// 永続化キー（"EN:DE"）
    pub fn key(&self) -> String {
        format!("{}{PAIR_SEPARATOR}{}", self.source, self.target)
    }

    pub fn parse(key: &str) -> Option<Self> {
        let (source, target) = key.split_once(PAIR_SEPARATOR)?;
        Some(Self {
            source: LanguageCode::new(source).ok()?,
            target: LanguageCode::new(target).ok()?,
        })
    }
}
