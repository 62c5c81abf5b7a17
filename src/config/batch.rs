//! バッチジョブ監視設定
use std::time::Duration;

use serde::Deserialize;

/// ポーリング間隔・回数上限と終端ジョブの保持期間
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchPollingConfig {
    /// ステータス確認の間隔（ミリ秒）
    pub poll_interval_ms: u64,
    /// ポーリング試行の上限回数
    pub max_poll_attempts: u32,
    /// 終端状態のジョブを保持する秒数。未設定なら無期限に保持
    pub finished_job_retention_s: Option<u64>,
}

impl BatchPollingConfig {
    /// ポーリング間隔（ミリ秒→Duration）
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 終端ジョブの保持期間
    pub fn finished_job_retention(&self) -> Option<Duration> {
        self.finished_job_retention_s.map(Duration::from_secs)
    }
}

impl Default for BatchPollingConfig {
    fn default() -> Self {
        // 既定は 5 秒間隔 × 60 回（最大およそ 5 分待つ）
        Self {
            poll_interval_ms: 5_000,
            max_poll_attempts: 60,
            finished_job_retention_s: None,
        }
    }
}
