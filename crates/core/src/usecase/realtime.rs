use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::domain::error::AppError;
use crate::domain::types::TranslationOutcome;
use crate::infra::config::{AppConfig, DEFAULT_DEBOUNCE};

use super::orchestrator::RequestOrchestrator;

/// 入力欄の向き
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// 原文欄の編集。設定の翻訳元から翻訳先へ
    #[default]
    SourceToTarget,
    /// 訳文欄の編集。翻訳先から翻訳元へ逆翻訳する
    TargetToSource,
}

/// 入力イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeEdit {
    pub text: String,
    pub direction: Direction,
}

impl RealtimeEdit {
    pub fn source(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            direction: Direction::SourceToTarget,
        }
    }

    pub fn target(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            direction: Direction::TargetToSource,
        }
    }
}

/// リアルタイム翻訳の結果通知
#[derive(Debug, Clone)]
pub enum RealtimeUpdate {
    Translated {
        sequence: u64,
        direction: Direction,
        outcome: TranslationOutcome,
    },
    Failed {
        sequence: u64,
        error: AppError,
    },
}

impl RealtimeUpdate {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Translated { sequence, .. } | Self::Failed { sequence, .. } => *sequence,
        }
    }
}

/// 入力中のテキストをデバウンスして翻訳するドライバー
///
/// 1リクエストごとにシーケンサーのチケットを取り、最新でないチケットの結果は
/// 捨てる。空白だけのテキストや realTimeTranslation が無効なときは送信しないが、
/// チケットは進めるのでそれ以前の結果も届かなくなる。
/// 両方の欄の入力は1本のチャネルで受け、窓の中では最後の入力が勝つ。
pub struct RealtimeTranslator {
    service: Arc<RequestOrchestrator>,
    debounce: Duration,
}

impl RealtimeTranslator {
    pub fn new(service: Arc<RequestOrchestrator>) -> Self {
        Self {
            service,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// デバウンス窓を設定ファイル/環境変数から取る
    pub fn from_config(service: Arc<RequestOrchestrator>, config: &AppConfig) -> Self {
        Self::new(service).with_debounce(config.debounce)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// ドライバーを起動し、入力用 Sender と結果用 Receiver を返す
    ///
    /// Sender をすべて drop すると、保留中の入力を送り出して実行中の
    /// リクエストを待ってから終了する。
    pub fn spawn(
        self,
    ) -> (
        mpsc::UnboundedSender<RealtimeEdit>,
        mpsc::UnboundedReceiver<RealtimeUpdate>,
        JoinHandle<()>,
    ) {
        let (edit_tx, edit_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(self.run(edit_rx, update_tx));
        (edit_tx, update_rx, handle)
    }

    pub async fn run(
        self,
        mut edits: mpsc::UnboundedReceiver<RealtimeEdit>,
        updates: mpsc::UnboundedSender<RealtimeUpdate>,
    ) {
        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        while let Some(mut edit) = edits.recv().await {
            let mut closed = false;

            // デバウンス窓の間に来た入力は最後のものだけ残す
            loop {
                match tokio::time::timeout(self.debounce, edits.recv()).await {
                    Ok(Some(next)) => edit = next,
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            in_flight.retain(|handle| !handle.is_finished());
            if let Some(handle) = self.dispatch(edit, updates.clone()) {
                in_flight.push(handle);
            }

            if closed {
                break;
            }
        }

        for handle in in_flight {
            if let Err(e) = handle.await {
                log::error!("リアルタイム翻訳タスクが異常終了: {e}");
            }
        }
        log::debug!("リアルタイム翻訳ドライバー終了");
    }

    fn dispatch(
        &self,
        edit: RealtimeEdit,
        updates: mpsc::UnboundedSender<RealtimeUpdate>,
    ) -> Option<JoinHandle<()>> {
        let ticket = self.service.begin_request();
        let sequence = ticket.sequence();

        if edit.text.trim().is_empty() {
            log::debug!("空の入力のため翻訳しません (#{sequence})");
            return None;
        }

        let settings = match self.service.settings() {
            Ok(settings) => settings,
            Err(error) => {
                let _ = updates.send(RealtimeUpdate::Failed { sequence, error });
                return None;
            }
        };
        if !settings.real_time_translation {
            log::debug!("リアルタイム翻訳が無効のため翻訳しません (#{sequence})");
            return None;
        }

        let service = self.service.clone();
        let RealtimeEdit { text, direction } = edit;
        Some(tokio::spawn(async move {
            let result = match direction {
                Direction::SourceToTarget => {
                    service
                        .translate(
                            &text,
                            Some(settings.source_language),
                            Some(settings.target_language),
                        )
                        .await
                }
                Direction::TargetToSource => service.translate_reverse(&text).await,
            };

            if !service.is_current(ticket) {
                log::debug!("古いリクエストの結果を破棄 (#{sequence})");
                return;
            }

            let update = match result {
                Ok(outcome) => RealtimeUpdate::Translated {
                    sequence,
                    direction,
                    outcome,
                },
                Err(error) => RealtimeUpdate::Failed { sequence, error },
            };
            // 受信側が閉じていれば誰も結果を待っていない
            let _ = updates.send(update);
        }))
    }
}
