use crate::domain::error::AppError;

/// クリップボード trait（ホットキー時の選択テキスト取得・翻訳結果のコピー）
pub trait Clipboard: Send + Sync {
    /// 前後の空白を除いたテキスト。空なら None
    fn read_text(&self) -> Result<Option<String>, AppError>;

    fn write_text(&self, text: &str) -> Result<(), AppError>;

    fn name(&self) -> &str;
}

/// arboard を使うシステムクリップボード
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }

    fn open() -> Result<arboard::Clipboard, AppError> {
        arboard::Clipboard::new()
            .map_err(|e| AppError::internal(format!("クリップボード初期化失敗: {e}")))
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Clipboard for SystemClipboard {
    fn read_text(&self) -> Result<Option<String>, AppError> {
        match Self::open()?.get_text() {
            Ok(text) => {
                let trimmed = text.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            // テキスト以外（画像など）や空のクリップボード
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(AppError::internal(format!("クリップボード読み取り失敗: {e}"))),
        }
    }

    fn write_text(&self, text: &str) -> Result<(), AppError> {
        Self::open()?
            .set_text(text)
            .map_err(|e| AppError::internal(format!("クリップボード書き込み失敗: {e}")))?;
        log::info!("クリップボードに出力: {} 文字", text.chars().count());
        Ok(())
    }

    fn name(&self) -> &str {
        "system"
    }
}
