use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::error::AppError;
use crate::domain::language::LanguagePair;
use crate::domain::settings::{
    AppSettings, SettingsPatch, HISTORY_KEY, HISTORY_LIMIT, RECENT_PAIRS_KEY, RECENT_PAIRS_LIMIT,
};
use crate::domain::types::HistoryEntry;

/// SQLite 設定ストア（設定・翻訳履歴・最近の言語ペアを1ファイルに保存）
///
/// 値は JSON 文字列としてキーごとに保存する。書き込みは都度即時に反映され、
/// 呼び出しをまたいだバッファリングはしない。
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// 新規接続（ファイルパス指定）
    pub fn open(path: &str) -> Result<Self, AppError> {
        let conn = Connection::open(path)
            .map_err(|e| AppError::storage(format!("DB接続に失敗: {e}")))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// in-memory DB（テスト用）
    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::storage(format!("in-memory DB作成に失敗: {e}")))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    /// スキーママイグレーション
    fn migrate(&self) -> Result<(), AppError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS settings (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
                ",
            )
            .map_err(|e| AppError::storage(format!("マイグレーション失敗: {e}")))?;
        Ok(())
    }

    // --- Key/Value ---

    fn read_raw(&self, key: &str) -> Result<Option<String>, AppError> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AppError::storage(format!("設定読み取り失敗 [{key}]: {e}")))
    }

    /// 保存値を返す。未保存または壊れた値ならデフォルトを返す
    pub fn get_value<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, AppError> {
        let Some(raw) = self.read_raw(key)? else {
            return Ok(default);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                log::warn!("設定値が不正なためデフォルトを使用 [{key}]: {e}");
                Ok(default)
            }
        }
    }

    /// 即時に永続化する（バッチ・トランザクションなし）
    pub fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AppError> {
        let value_str = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("設定値シリアライズ失敗 [{key}]: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value_str],
            )
            .map_err(|e| AppError::storage(format!("設定保存失敗 [{key}]: {e}")))?;
        Ok(())
    }

    /// 配列として保存された値を要素ごとに読む。読めない要素だけを落とす
    ///
    /// 値全体が配列として読めなければエラー（呼び出し側で扱いを決める）。
    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, ListError> {
        let Some(raw) = self.read_raw(key).map_err(ListError::Storage)? else {
            return Ok(Vec::new());
        };

        let items: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|e| ListError::Corrupt(e.to_string()))?;
        let total = items.len();
        let parsed: Vec<T> = items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect();

        if parsed.len() < total {
            log::warn!("不正な要素を {} 件読み飛ばしました [{key}]", total - parsed.len());
        }
        Ok(parsed)
    }

    /// 表示用。値全体が壊れていれば空として扱う
    fn list_or_empty<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, AppError> {
        match self.read_list(key) {
            Ok(list) => Ok(list),
            Err(ListError::Storage(e)) => Err(e),
            Err(ListError::Corrupt(e)) => {
                log::warn!("保存済みリストが壊れているため空として扱います [{key}]: {e}");
                Ok(Vec::new())
            }
        }
    }

    /// 更新用。値全体が壊れていれば上書きせずエラーにする
    fn list_for_update<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, AppError> {
        self.read_list(key).map_err(|e| match e {
            ListError::Storage(e) => e,
            ListError::Corrupt(e) => AppError::storage(format!(
                "保存済みリストが壊れているため更新できません [{key}]: {e}"
            )),
        })
    }

    // --- Settings ---

    pub fn get_settings(&self) -> Result<AppSettings, AppError> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings")
            .map_err(|e| AppError::storage(format!("クエリ準備失敗: {e}")))?;

        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| AppError::storage(format!("クエリ実行失敗: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::storage(format!("行読み取り失敗: {e}")))?;

        if rows.is_empty() {
            return Ok(AppSettings::default());
        }

        let serde_json::Value::Object(mut merged) = serde_json::to_value(AppSettings::default())
            .map_err(|e| AppError::internal(format!("settings serialize: {e}")))?
        else {
            return Err(AppError::internal("settings must serialize to an object"));
        };

        // 既知のキーだけを1つずつ重ね、壊れた値はそのキーだけデフォルトのままにする
        for (key, value) in rows {
            if !merged.contains_key(&key) {
                continue;
            }
            let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&value) else {
                log::warn!("設定値が JSON ではありません [{key}]");
                continue;
            };
            let mut candidate = merged.clone();
            candidate.insert(key.clone(), parsed);
            if serde_json::from_value::<AppSettings>(serde_json::Value::Object(candidate.clone()))
                .is_ok()
            {
                merged = candidate;
            } else {
                log::warn!("設定値が不正なためデフォルトを使用 [{key}]");
            }
        }

        serde_json::from_value(serde_json::Value::Object(merged))
            .map_err(|e| AppError::internal(format!("settings deserialize: {e}")))
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<(), AppError> {
        let json = serde_json::to_value(settings)
            .map_err(|e| AppError::internal(format!("settings serialize: {e}")))?;

        if let Some(obj) = json.as_object() {
            for (key, value) in obj {
                self.set_value(key, value)?;
            }
        }

        Ok(())
    }

    /// 部分更新を適用し、書き込んだキーを返す
    pub fn apply_patch(&self, patch: &SettingsPatch) -> Result<Vec<String>, AppError> {
        let json = serde_json::to_value(patch)
            .map_err(|e| AppError::internal(format!("settings patch serialize: {e}")))?;

        let mut written = vec![];
        if let Some(obj) = json.as_object() {
            for (key, value) in obj {
                self.set_value(key, value)?;
                written.push(key.clone());
            }
        }

        Ok(written)
    }

    // --- History ---

    /// 新しい順の翻訳履歴
    pub fn history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        self.list_or_empty(HISTORY_KEY)
    }

    /// 先頭に追加し、上限を超えた古いエントリを落とす
    pub fn append_history(&self, entry: HistoryEntry) -> Result<(), AppError> {
        let mut history: Vec<HistoryEntry> = self.list_for_update(HISTORY_KEY)?;
        history.insert(0, entry);
        history.truncate(HISTORY_LIMIT);
        self.set_value(HISTORY_KEY, &history)
    }

    /// 0 始まりのインデックスで1件削除する。範囲外なら何も変更しない
    pub fn delete_history_at(&self, index: usize) -> Result<HistoryEntry, AppError> {
        let mut history: Vec<HistoryEntry> = self.list_for_update(HISTORY_KEY)?;
        if index >= history.len() {
            return Err(AppError::out_of_range(index, history.len()));
        }
        let removed = history.remove(index);
        self.set_value(HISTORY_KEY, &history)?;
        Ok(removed)
    }

    pub fn clear_history(&self) -> Result<(), AppError> {
        self.set_value(HISTORY_KEY, &Vec::<HistoryEntry>::new())
    }

    // --- Recent language pairs ---

    pub fn recent_pairs(&self) -> Result<Vec<String>, AppError> {
        Ok(valid_pairs(self.list_or_empty(RECENT_PAIRS_KEY)?))
    }

    /// ペアを先頭へ移動（重複は除去）し、上限件数に切り詰める
    pub fn touch_pair(&self, pair: &LanguagePair) -> Result<Vec<String>, AppError> {
        let key = pair.key();
        let mut pairs = valid_pairs(self.list_for_update(RECENT_PAIRS_KEY)?);
        pairs.retain(|p| p != &key);
        pairs.insert(0, key);
        pairs.truncate(RECENT_PAIRS_LIMIT);
        self.set_value(RECENT_PAIRS_KEY, &pairs)?;
        Ok(pairs)
    }
}

enum ListError {
    Storage(AppError),
    Corrupt(String),
}

/// "SRC:TGT" として読めないペアを落とす
fn valid_pairs(pairs: Vec<String>) -> Vec<String> {
    pairs
        .into_iter()
        .filter(|key| {
            let valid = LanguagePair::parse(key).is_some();
            if !valid {
                log::warn!("不正な言語ペアを読み飛ばしました: {key}");
            }
            valid
        })
        .collect()
}
