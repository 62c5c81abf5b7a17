//! バッチジョブ・オーケストレータ
//!
//! - `submit` はレジストリ登録と監視タスクの起動だけで即時返却する
//! - 監視タスクは一定間隔・回数上限つきのポーリングでジョブ状態を
//!   レジストリへ反映する
//! - 終了時のアーティファクト削除は、結末（終端・タイムアウト）に
//!   かかわらずジョブにつきちょうど1回
//!
//! 監視は呼び出し元の待機から切り離されているため、呼び出し側が
//! 先にタイムアウトしても監視と後片付けは継続する。
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::BatchPollingConfig;
use crate::engine::{BatchRecognizer, BlobStore, JobPoll, RemoteJobStatus};

use super::error::BatchError;
use super::job::{BatchJob, JobStatus};
use super::registry::JobRegistry;

/// ポーリングの結末
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { transcript: String },
    Failed { reason: String },
    TimedOut,
}

/// `submit` の戻り値。ジョブ名と結末待ちチャネルを持つ
#[derive(Debug)]
pub struct JobHandle {
    pub job_name: String,
    outcome_rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// 監視タスクの結末を待つ。待たなくても監視は継続する
    pub async fn outcome(self) -> Result<JobOutcome, BatchError> {
        let job_name = self.job_name;
        self.outcome_rx
            .await
            .map_err(|_| BatchError::PollerGone(job_name))
    }
}

pub struct BatchOrchestrator<R, B>
where
    R: BatchRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    recognizer: Arc<R>,
    blobs: Arc<B>,
    registry: Arc<JobRegistry>,
    config: BatchPollingConfig,
}

impl<R, B> BatchOrchestrator<R, B>
where
    R: BatchRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    pub fn new(
        recognizer: Arc<R>,
        blobs: Arc<B>,
        registry: Arc<JobRegistry>,
        config: BatchPollingConfig,
    ) -> Self {
        Self {
            recognizer,
            blobs,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> Arc<JobRegistry> {
        self.registry.clone()
    }

    /// ジョブを開始して QUEUED で登録し、監視タスクを切り離して起動
    ///
    /// アップロード自体は呼び出し前に済んでいる前提で、ここでは
    /// `source_uri` を預かるだけ。
    pub async fn submit(
        &self,
        source_uri: &str,
        language_code: &str,
    ) -> Result<JobHandle, BatchError> {
        let job_name = self
            .recognizer
            .start_job(source_uri, language_code)
            .await?;

        self.registry
            .insert(BatchJob::queued(&job_name, source_uri, language_code));
        info!(job_name = %job_name, source_uri = %source_uri, "transcription job submitted");

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let poller = JobPoller {
            recognizer: self.recognizer.clone(),
            blobs: self.blobs.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
            job_name: job_name.clone(),
            source_uri: source_uri.to_string(),
        };
        tokio::spawn(async move {
            let outcome = poller.run().await;
            let _ = outcome_tx.send(outcome);
        });

        Ok(JobHandle {
            job_name,
            outcome_rx,
        })
    }

    /// 送信して結末まで待つ同期版。成功時は本文を返す
    pub async fn submit_and_wait(
        &self,
        source_uri: &str,
        language_code: &str,
    ) -> Result<String, BatchError> {
        let handle = self.submit(source_uri, language_code).await?;
        let job_name = handle.job_name.clone();
        match handle.outcome().await? {
            JobOutcome::Completed { transcript } => Ok(transcript),
            JobOutcome::Failed { reason } => Err(BatchError::JobFailed { reason }),
            JobOutcome::TimedOut => Err(BatchError::Timeout { job_name }),
        }
    }

    /// レジストリの読み取り専用スナップショット
    pub fn get_status(&self, job_name: &str) -> Result<BatchJob, BatchError> {
        self.registry
            .get(job_name)
            .ok_or_else(|| BatchError::NotFound(job_name.to_string()))
    }

    /// 新しい順・フィルタつきの一覧
    pub fn list_jobs(
        &self,
        status_filter: Option<JobStatus>,
        max_results: usize,
    ) -> Vec<BatchJob> {
        self.registry.list(status_filter, max_results)
    }
}

/// 1ジョブぶんの監視タスク
struct JobPoller<R, B>
where
    R: BatchRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    recognizer: Arc<R>,
    blobs: Arc<B>,
    registry: Arc<JobRegistry>,
    config: BatchPollingConfig,
    job_name: String,
    source_uri: String,
}

impl<R, B> JobPoller<R, B>
where
    R: BatchRecognizer + Send + Sync + 'static,
    B: BlobStore + Send + Sync + 'static,
{
    async fn run(self) -> JobOutcome {
        let outcome = self.poll_until_terminal().await;

        // 結末にかかわらず、預かったアーティファクトをちょうど1回だけ削除。
        // 失敗してもログに残すのみで結末には影響させない
        if let Err(e) = self.blobs.delete(&self.source_uri).await {
            warn!(job_name = %self.job_name, error = %e, "artifact cleanup failed");
        }
        outcome
    }

    async fn poll_until_terminal(&self) -> JobOutcome {
        let interval = self.config.poll_interval();

        for attempt in 1..=self.config.max_poll_attempts {
            match self.recognizer.poll_job(&self.job_name).await {
                Ok(poll) => {
                    self.apply(&poll);
                    match poll.status {
                        RemoteJobStatus::Completed => {
                            let transcript = poll.transcript.unwrap_or_default();
                            info!(job_name = %self.job_name, attempt, "transcription job completed");
                            return JobOutcome::Completed { transcript };
                        }
                        RemoteJobStatus::Failed => {
                            let reason = poll
                                .failure_reason
                                .unwrap_or_else(|| "unknown failure".to_string());
                            warn!(job_name = %self.job_name, attempt, reason = %reason, "transcription job failed");
                            return JobOutcome::Failed { reason };
                        }
                        RemoteJobStatus::Queued | RemoteJobStatus::InProgress => {}
                    }
                }
                Err(e) => {
                    // 一時的な失敗は予算内で再試行する
                    warn!(job_name = %self.job_name, attempt, error = %e, "job poll failed");
                }
            }

            if attempt < self.config.max_poll_attempts {
                sleep(interval).await;
            }
        }

        // 予算超過。レジストリは最後に観測した状態のまま残す
        warn!(job_name = %self.job_name, "polling budget exhausted");
        JobOutcome::TimedOut
    }

    /// ポーリング結果をレジストリのエントリへ反映
    fn apply(&self, poll: &JobPoll) {
        self.registry.update(&self.job_name, |job| {
            match poll.status {
                RemoteJobStatus::Queued => {}
                RemoteJobStatus::InProgress => job.mark_in_progress(),
                RemoteJobStatus::Completed => {
                    job.complete(poll.transcript.clone().unwrap_or_default());
                }
                RemoteJobStatus::Failed => {
                    job.fail(
                        poll.failure_reason
                            .clone()
                            .unwrap_or_else(|| "unknown failure".to_string()),
                    );
                }
            }
            if poll.media_format.is_some() {
                job.media_format = poll.media_format.clone();
            }
            if poll.sample_rate_hz.is_some() {
                job.sample_rate_hz = poll.sample_rate_hz;
            }
        });
    }
}
