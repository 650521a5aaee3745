use std::sync::Arc;

use crate::domain::error::AppError;
use crate::domain::surface::{SurfaceKind, SurfaceRegistry};
use crate::domain::types::HistoryEntry;
use crate::infra::clipboard::Clipboard;

use super::orchestrator::RequestOrchestrator;

/// 画面に送るメッセージ
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceMessage {
    /// 翻訳元テキストを差し替える（ホットキー時のクリップボード内容）
    SourceText(String),
    /// 履歴の1件を原文・訳文ごと復元する
    Translation(HistoryEntry),
}

/// 画面（ウィンドウ）の操作。実体はシェル側が提供する
pub trait Surface: Send {
    fn show(&mut self);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
    fn send(&mut self, message: SurfaceMessage);
}

pub trait SurfaceFactory: Send {
    fn create(&self, kind: SurfaceKind) -> Result<Box<dyn Surface>, AppError>;
}

/// メイン画面を閉じる操作の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// トレイに格納した。`notify` ならトレイ通知を出す
    Hidden { notify: bool },
    /// アプリを終了すべき
    Quit,
    /// 何もしない
    Ignored,
}

/// 画面の生成・表示ポリシーをまとめる
pub struct WindowCoordinator {
    service: Arc<RequestOrchestrator>,
    clipboard: Arc<dyn Clipboard>,
    factory: Box<dyn SurfaceFactory>,
    surfaces: SurfaceRegistry<Box<dyn Surface>>,
}

impl WindowCoordinator {
    pub fn new(
        service: Arc<RequestOrchestrator>,
        clipboard: Arc<dyn Clipboard>,
        factory: Box<dyn SurfaceFactory>,
    ) -> Self {
        Self {
            service,
            clipboard,
            factory,
            surfaces: SurfaceRegistry::new(),
        }
    }

    /// 起動時に最初に出す画面を決めて表示する
    ///
    /// API キーがないか翻訳クライアントを作れなければ設定画面を出す。
    pub fn startup(&mut self) -> Result<SurfaceKind, AppError> {
        let kind = if !self.service.api_key_set() {
            log::info!("API キー未設定のため設定画面を表示します");
            SurfaceKind::Settings
        } else if self.service.initialize() {
            SurfaceKind::Main
        } else {
            log::warn!("翻訳クライアントの初期化に失敗したため設定画面を表示します");
            SurfaceKind::Settings
        };
        self.open(kind)?;
        Ok(kind)
    }

    fn surface(&mut self, kind: SurfaceKind) -> Result<&mut Box<dyn Surface>, AppError> {
        let factory = &self.factory;
        self.surfaces.get_or_create(kind, |kind| {
            log::debug!("画面を生成: {}", kind.as_str());
            factory.create(kind)
        })
    }

    pub fn open(&mut self, kind: SurfaceKind) -> Result<(), AppError> {
        self.surface(kind)?.show();
        Ok(())
    }

    pub fn close(&mut self, kind: SurfaceKind) {
        if let Some(surface) = self.surfaces.get_mut(kind) {
            surface.hide();
        }
    }

    /// 表示中なら隠し、そうでなければ表示する（設定ボタン）
    pub fn toggle(&mut self, kind: SurfaceKind) -> Result<(), AppError> {
        let surface = self.surface(kind)?;
        if surface.is_visible() {
            surface.hide();
        } else {
            surface.show();
        }
        Ok(())
    }

    /// シェル側で実体が破棄されたときに呼ぶ
    pub fn destroyed(&mut self, kind: SurfaceKind) {
        if self.surfaces.destroy(kind).is_some() {
            log::debug!("画面を破棄: {}", kind.as_str());
        }
    }

    pub fn is_visible(&self, kind: SurfaceKind) -> bool {
        self.surfaces.get(kind).is_some_and(|s| s.is_visible())
    }

    pub fn live(&self) -> Vec<SurfaceKind> {
        self.surfaces.live()
    }

    /// グローバルホットキー
    ///
    /// メイン画面を出して設定画面を隠す。クリップボード翻訳が有効なら
    /// クリップボードのテキストをメイン画面に送り、そのテキストを返す。
    pub fn on_hotkey(&mut self) -> Result<Option<String>, AppError> {
        let text = self.clipboard.read_text().unwrap_or_else(|e| {
            log::warn!("クリップボードを読めません ({}): {e}", self.clipboard.name());
            None
        });

        let main = self.surface(SurfaceKind::Main)?;
        if !main.is_visible() {
            main.show();
        }
        if self.is_visible(SurfaceKind::Settings) {
            self.close(SurfaceKind::Settings);
        }

        let Some(text) = text else {
            return Ok(None);
        };
        if !self.service.settings()?.auto_translate_clipboard {
            return Ok(None);
        }

        self.surface(SurfaceKind::Main)?
            .send(SurfaceMessage::SourceText(text.clone()));
        Ok(Some(text))
    }

    /// メイン画面の閉じるボタン
    pub fn close_main(&mut self) -> Result<CloseAction, AppError> {
        let settings = self.service.settings()?;
        if !settings.minimize_to_tray {
            return Ok(CloseAction::Quit);
        }
        Ok(self.hide_main(settings.show_tray_notifications))
    }

    /// Esc キー。トレイ格納が有効なら格納し、無効なら minimizeToTrayOnEsc で終了する
    pub fn on_escape(&mut self) -> Result<CloseAction, AppError> {
        let settings = self.service.settings()?;
        if settings.minimize_to_tray {
            Ok(self.hide_main(settings.show_tray_notifications))
        } else if settings.minimize_to_tray_on_esc {
            Ok(CloseAction::Quit)
        } else {
            Ok(CloseAction::Ignored)
        }
    }

    /// メイン画面がフォーカスを失った。設定・履歴画面が出ている間は何もしない
    pub fn on_focus_lost(&mut self) -> Result<CloseAction, AppError> {
        let settings = self.service.settings()?;
        if !settings.close_on_focus_loss
            || self.is_visible(SurfaceKind::Settings)
            || self.is_visible(SurfaceKind::History)
        {
            return Ok(CloseAction::Ignored);
        }
        if !settings.minimize_to_tray {
            return Ok(CloseAction::Quit);
        }
        Ok(self.hide_main(settings.show_tray_notifications))
    }

    fn hide_main(&mut self, notify: bool) -> CloseAction {
        match self.surfaces.get_mut(SurfaceKind::Main) {
            Some(main) => {
                main.hide();
                CloseAction::Hidden { notify }
            }
            None => CloseAction::Ignored,
        }
    }

    /// 設定画面を閉じ、翻訳できる状態ならメイン画面に戻す
    pub fn close_settings(&mut self) -> Result<(), AppError> {
        self.close(SurfaceKind::Settings);
        if self.service.is_initialized() || self.service.api_key_set() {
            self.open(SurfaceKind::Main)?;
        }
        Ok(())
    }

    /// 履歴の1件をメイン画面に復元し、履歴画面を隠す
    pub fn use_history_item(&mut self, index: usize) -> Result<HistoryEntry, AppError> {
        let entry = self.service.history_entry(index)?;

        let main = self.surface(SurfaceKind::Main)?;
        main.send(SurfaceMessage::Translation(entry.clone()));
        main.show();
        self.close(SurfaceKind::History);
        Ok(entry)
    }
}
