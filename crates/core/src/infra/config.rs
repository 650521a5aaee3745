use std::path::PathBuf;
use std::time::Duration;

use crate::infra::gateway::DEFAULT_REQUEST_TIMEOUT;

const DATA_DIR_NAME: &str = "HermesTranslator";
const DB_FILE_NAME: &str = "hermes.db";

/// リアルタイム翻訳のデバウンス幅
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(800);

pub const ENV_DB_PATH: &str = "HT_DB_PATH";
pub const ENV_DEEPL_API_URL: &str = "HT_DEEPL_API_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "HT_REQUEST_TIMEOUT_SECS";
pub const ENV_DEBOUNCE_MS: &str = "HT_DEBOUNCE_MS";

/// 実行時設定（環境変数 + デフォルト）
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    /// DeepL のベース URL 上書き（未指定ならキー種別から決める）
    pub deepl_api_url: Option<String>,
    pub request_timeout: Duration,
    pub debounce: Duration,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意のキー参照関数から組み立てる（テスト用に環境変数から切り離してある）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let db_path = non_empty(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let request_timeout = non_empty(ENV_REQUEST_TIMEOUT_SECS)
            .and_then(|v| parse_or_warn::<u64>(ENV_REQUEST_TIMEOUT_SECS, &v))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let debounce = non_empty(ENV_DEBOUNCE_MS)
            .and_then(|v| parse_or_warn::<u64>(ENV_DEBOUNCE_MS, &v))
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_DEBOUNCE);

        Self {
            db_path,
            deepl_api_url: non_empty(ENV_DEEPL_API_URL),
            request_timeout,
            debounce,
        }
    }

    /// DB ファイルの親ディレクトリを作成する
    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        match self.db_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
        .join(DB_FILE_NAME)
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("環境変数 {key} の値が不正なため無視します: {value}");
            None
        }
    }
}
