//! リアルタイム文字起こしプロトコルのイベント定義
//!
//! 音声は PCM（16kHz・モノラル・16bit little-endian）を base64 で包んだ
//! `audio_chunk` として届きます（1チャンクは 3200〜6400 バイト相当）。
use serde::{Deserialize, Serialize};

/// クライアント→サーバのイベント
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    /// セッション開始要求
    #[serde(rename = "start_transcription")]
    StartTranscription {
        #[serde(default)]
        language_code: Option<String>,
    },

    /// base64エンコードされたPCMチャンク
    #[serde(rename = "audio_chunk")]
    AudioChunk { chunk: String },

    /// 停止要求（冪等）
    #[serde(rename = "stop_transcription")]
    StopTranscription {},
}

/// サーバ→クライアントのイベント
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    /// 接続確立の通知
    #[serde(rename = "connected")]
    Connected { status: String },

    /// セッション開始の通知
    #[serde(rename = "transcription_started")]
    TranscriptionStarted {
        status: String,
        message: String,
        language_code: String,
    },

    /// 途中/最終の文字起こし結果
    #[serde(rename = "transcription_result")]
    TranscriptionResult { text: String, is_partial: bool },

    /// セッション終了の通知（アーカイブ保存先を含む）
    #[serde(rename = "transcription_stopped")]
    TranscriptionStopped {
        status: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        s3_url: Option<String>,
    },

    /// エラー
    #[serde(rename = "error")]
    Error { message: String },
}
