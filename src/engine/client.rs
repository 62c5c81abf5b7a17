//! 認識エンジン・コラボレータ共通の型とトレイト
//!
//! - `RecognitionResult` は途中/最終のテキスト更新イベント
//! - `RecognitionStream` は1セッションの送受信チャネルを保持
//! - `StreamingRecognizer` / `BatchRecognizer` / `BlobStore` が外部連携の最小インタフェース
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use super::error::EngineError;

/// 文字起こし結果の更新イベント
///
/// `is_partial` が真の結果は後続の結果で置き換わる可能性があります。
/// 偽（最終結果）になった発話区間が再び途中結果へ戻ることはありません。
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub text: String,
    pub is_partial: bool,
}

/// 認識ストリームへ流すコマンド
///
/// コマンドチャネルは1本なので、`Close` より前に送られたフレームは
/// 必ず先に処理されます。実装側はこの順序を崩してはいけません。
#[derive(Debug)]
pub enum StreamCommand {
    Frame(Bytes),
    Close,
}

/// ストリーミング認識セッションのハンドル
///
/// セッションごとに1つだけ生成され、所有ワーカー以外と共有されません。
#[derive(Debug)]
pub struct RecognitionStream {
    session_id: String,
    command_tx: mpsc::Sender<StreamCommand>,
    result_rx: Option<mpsc::Receiver<RecognitionResult>>,
}

impl RecognitionStream {
    /// コラボレータ実装側がセッションIDと送受信チャネルで生成する
    pub fn new(
        session_id: impl Into<String>,
        command_tx: mpsc::Sender<StreamCommand>,
        result_rx: mpsc::Receiver<RecognitionResult>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            command_tx,
            result_rx: Some(result_rx),
        }
    }

    /// セッションIDを取得
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// 音声フレーム（PCM S16LE, 16kHz モノラル）を送信
    pub async fn send_frame(&self, frame: Bytes) -> Result<(), EngineError> {
        self.command_tx
            .send(StreamCommand::Frame(frame))
            .await
            .map_err(|_| EngineError::StreamClosed {
                session_id: self.session_id.clone(),
            })
    }

    /// ストリームの終了を通知
    pub async fn close(&self) -> Result<(), EngineError> {
        self.command_tx
            .send(StreamCommand::Close)
            .await
            .map_err(|_| EngineError::StreamClosed {
                session_id: self.session_id.clone(),
            })
    }

    /// 結果レシーバを取り出す（リレー側が一度だけ呼ぶ）
    pub fn take_results(&mut self) -> Option<mpsc::Receiver<RecognitionResult>> {
        self.result_rx.take()
    }
}

/// ストリーミング認識クライアント最小インタフェース
pub trait StreamingRecognizer: Send + Sync {
    fn open(&self, session_id: &str, language_code: &str)
        -> Result<RecognitionStream, EngineError>;
}

/// バッチジョブの上流ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteJobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

/// `poll_job` の応答
#[derive(Debug, Clone)]
pub struct JobPoll {
    pub status: RemoteJobStatus,
    pub transcript: Option<String>,
    pub failure_reason: Option<String>,
    pub media_format: Option<String>,
    pub sample_rate_hz: Option<u32>,
}

/// バッチ認識クライアント最小インタフェース
#[async_trait]
pub trait BatchRecognizer: Send + Sync {
    /// ジョブを開始し、一意なジョブ名を返す
    async fn start_job(
        &self,
        source_uri: &str,
        language_code: &str,
    ) -> Result<String, EngineError>;

    /// ジョブの現在状態を取得
    async fn poll_job(&self, job_name: &str) -> Result<JobPoll, EngineError>;
}

/// ブロブストア最小インタフェース
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// バイト列を保存し、参照URIを返す
    async fn upload(&self, data: Bytes, path_hint: &str) -> Result<String, EngineError>;

    /// URIが指すアーティファクトを削除
    async fn delete(&self, uri: &str) -> Result<(), EngineError>;
}
