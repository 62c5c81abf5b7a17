use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::client::{
    BatchRecognizer, BlobStore, JobPoll, RecognitionResult, RecognitionStream, RemoteJobStatus,
    StreamCommand, StreamingRecognizer,
};
use super::error::EngineError;

/// フレーム到着ごとに途中結果、終了時に最終結果を返すエコー実装
#[derive(Debug, Clone, Default)]
pub struct MockRecognizer;

impl StreamingRecognizer for MockRecognizer {
    fn open(
        &self,
        session_id: &str,
        _language_code: &str,
    ) -> Result<RecognitionStream, EngineError> {
        let (command_tx, mut command_rx) = mpsc::channel::<StreamCommand>(32);
        let (result_tx, result_rx) = mpsc::channel::<RecognitionResult>(32);
        let session_id = session_id.to_string();
        let session_id_for_task = session_id.clone();

        let _worker: JoinHandle<()> = tokio::spawn(async move {
            let mut frame_index = 0_u32;
            let mut total_bytes = 0_usize;
            while let Some(command) = command_rx.recv().await {
                match command {
                    StreamCommand::Frame(frame) => {
                        frame_index += 1;
                        total_bytes += frame.len();
                        let _ = result_tx
                            .send(RecognitionResult {
                                text: format!(
                                    "session {} frame {} bytes {}",
                                    session_id_for_task,
                                    frame_index,
                                    frame.len()
                                ),
                                is_partial: true,
                            })
                            .await;
                    }
                    StreamCommand::Close => {
                        let _ = result_tx
                            .send(RecognitionResult {
                                text: format!(
                                    "session {} complete ({} frames, {} bytes)",
                                    session_id_for_task, frame_index, total_bytes
                                ),
                                is_partial: false,
                            })
                            .await;
                        break;
                    }
                }
            }
        });

        Ok(RecognitionStream::new(session_id, command_tx, result_rx))
    }
}

/// ポーリングN回目で終端状態に達するバッチ認識のモック
#[derive(Debug)]
pub struct MockBatchRecognizer {
    polls_until_terminal: u32,
    transcript: Option<String>,
    failure_reason: Option<String>,
    poll_counts: Mutex<HashMap<String, u32>>,
}

impl MockBatchRecognizer {
    /// `polls` 回目の確認で COMPLETED になる
    pub fn completes_after(polls: u32, transcript: impl Into<String>) -> Self {
        Self {
            polls_until_terminal: polls.max(1),
            transcript: Some(transcript.into()),
            failure_reason: None,
            poll_counts: Mutex::new(HashMap::new()),
        }
    }

    /// `polls` 回目の確認で FAILED になる
    pub fn fails_after(polls: u32, reason: impl Into<String>) -> Self {
        Self {
            polls_until_terminal: polls.max(1),
            transcript: None,
            failure_reason: Some(reason.into()),
            poll_counts: Mutex::new(HashMap::new()),
        }
    }

    /// いつまでも IN_PROGRESS のまま（タイムアウト検証用）
    pub fn never_completes() -> Self {
        Self {
            polls_until_terminal: u32::MAX,
            transcript: None,
            failure_reason: None,
            poll_counts: Mutex::new(HashMap::new()),
        }
    }

    /// 指定ジョブがこれまでに確認された回数
    pub fn poll_count(&self, job_name: &str) -> u32 {
        self.poll_counts.lock().get(job_name).copied().unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl BatchRecognizer for MockBatchRecognizer {
    async fn start_job(
        &self,
        _source_uri: &str,
        _language_code: &str,
    ) -> Result<String, EngineError> {
        Ok(format!("transcribe-{}", Uuid::new_v4()))
    }

    async fn poll_job(&self, job_name: &str) -> Result<JobPoll, EngineError> {
        let count = {
            let mut counts = self.poll_counts.lock();
            let entry = counts.entry(job_name.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        if count < self.polls_until_terminal {
            return Ok(JobPoll {
                status: RemoteJobStatus::InProgress,
                transcript: None,
                failure_reason: None,
                media_format: None,
                sample_rate_hz: None,
            });
        }

        if let Some(reason) = &self.failure_reason {
            return Ok(JobPoll {
                status: RemoteJobStatus::Failed,
                transcript: None,
                failure_reason: Some(reason.clone()),
                media_format: None,
                sample_rate_hz: None,
            });
        }

        Ok(JobPoll {
            status: RemoteJobStatus::Completed,
            transcript: self.transcript.clone(),
            failure_reason: None,
            media_format: Some("mp3".to_string()),
            sample_rate_hz: Some(16_000),
        })
    }
}

/// アップロード/削除を記録するだけのブロブストア
#[derive(Debug, Default)]
pub struct MockBlobStore {
    uploaded: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl MockBlobStore {
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

#[async_trait::async_trait]
impl BlobStore for MockBlobStore {
    async fn upload(&self, _data: Bytes, path_hint: &str) -> Result<String, EngineError> {
        let uri = format!("s3://mock-bucket/{path_hint}");
        self.uploaded.lock().push(uri.clone());
        Ok(uri)
    }

    async fn delete(&self, uri: &str) -> Result<(), EngineError> {
        self.deleted.lock().push(uri.to_string());
        Ok(())
    }
}
