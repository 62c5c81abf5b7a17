//! セッション状態機械
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// セッションの生存状態
///
/// 遷移は宣言順の前進のみ。`Stopping` に入った後で `Streaming` に
/// 戻ることはありません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Init,
    Streaming,
    Stopping,
    Closed,
}

impl SessionState {
    /// フレームを受け付ける状態か
    pub fn is_live(self) -> bool {
        matches!(self, SessionState::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// フレームキューに流すコマンド
///
/// `Stop` より前に積まれたフレームはFIFOで先に処理されます。
#[derive(Debug)]
pub(crate) enum FrameCommand {
    Frame(Bytes),
    Stop,
}

/// 1接続ぶんのリアルタイムセッション
///
/// 状態の書き込みは所有ワーカーと、同じ接続の stop/切断経路のみ。
#[derive(Debug)]
pub struct StreamingSession {
    id: String,
    language_code: String,
    created_at: Instant,
    state: Mutex<SessionState>,
    frame_tx: mpsc::Sender<FrameCommand>,
    rejected_frames: AtomicU64,
}

impl StreamingSession {
    pub(crate) fn new(
        id: impl Into<String>,
        language_code: impl Into<String>,
        frame_tx: mpsc::Sender<FrameCommand>,
    ) -> Self {
        Self {
            id: id.into(),
            language_code: language_code.into(),
            created_at: Instant::now(),
            state: Mutex::new(SessionState::Init),
            frame_tx,
            rejected_frames: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn language_code(&self) -> &str {
        &self.language_code
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// 前進遷移のみ反映する。状態が変わったら true
    pub(crate) fn advance_to(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if next > *state {
            *state = next;
            true
        } else {
            false
        }
    }

    pub(crate) fn frame_sender(&self) -> mpsc::Sender<FrameCommand> {
        self.frame_tx.clone()
    }

    /// 遅延フレームの棄却を記録し、累計を返す
    pub(crate) fn record_rejected_frame(&self) -> u64 {
        self.rejected_frames.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 棄却したフレームの累計
    pub fn rejected_frames(&self) -> u64 {
        self.rejected_frames.load(Ordering::Relaxed)
    }
}
