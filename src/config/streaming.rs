//! リアルタイムセッション設定
use serde::Deserialize;

/// ストリーミングセッションの挙動に関する設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamingSessionConfig {
    /// セッションごとのフレームキュー容量
    pub frame_queue_capacity: usize,
    /// `language_code` 未指定時の既定値
    pub default_language_code: String,
    /// 接続ごとの送出イベントチャネル容量
    pub outbound_queue_capacity: usize,
}

impl Default for StreamingSessionConfig {
    fn default() -> Self {
        Self {
            frame_queue_capacity: 64,
            default_language_code: "en-US".to_string(),
            outbound_queue_capacity: 100,
        }
    }
}
