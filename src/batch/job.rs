//! バッチジョブのレコード定義
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ジョブの状態
///
/// 遷移は QUEUED → IN_PROGRESS → {COMPLETED | FAILED} のみで、
/// 終端状態からは動かない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// 前進遷移として妥当か
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::InProgress)
                | (JobStatus::Queued, JobStatus::Completed)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::InProgress, JobStatus::Completed)
                | (JobStatus::InProgress, JobStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// `"FAILED"` などの表記から復元（大文字小文字は問わない）
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "QUEUED" => Some(JobStatus::Queued),
            "IN_PROGRESS" => Some(JobStatus::InProgress),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// バッチ文字起こしジョブ1件ぶんのメタデータ
///
/// `transcript` は COMPLETED のとき、`failure_reason` は FAILED の
/// ときだけ設定されます。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_name: String,
    pub status: JobStatus,
    pub language_code: String,
    pub source_uri: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub transcript: Option<String>,
    pub failure_reason: Option<String>,
    pub media_format: Option<String>,
    pub sample_rate_hz: Option<u32>,
}

impl BatchJob {
    pub fn queued(
        job_name: impl Into<String>,
        source_uri: impl Into<String>,
        language_code: impl Into<String>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            status: JobStatus::Queued,
            language_code: language_code.into(),
            source_uri: source_uri.into(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            transcript: None,
            failure_reason: None,
            media_format: None,
            sample_rate_hz: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// IN_PROGRESS へ進める（初回のみ `started_at` を記録）
    pub(crate) fn mark_in_progress(&mut self) {
        if self.status.can_transition_to(JobStatus::InProgress) {
            self.status = JobStatus::InProgress;
            self.started_at.get_or_insert_with(Utc::now);
        }
    }

    /// COMPLETED へ進め、本文を確定する
    pub(crate) fn complete(&mut self, transcript: String) {
        if self.status.can_transition_to(JobStatus::Completed) {
            self.status = JobStatus::Completed;
            self.transcript = Some(transcript);
            self.completed_at = Some(Utc::now());
        }
    }

    /// FAILED へ進め、理由を確定する
    pub(crate) fn fail(&mut self, reason: String) {
        if self.status.can_transition_to(JobStatus::Failed) {
            self.status = JobStatus::Failed;
            self.failure_reason = Some(reason);
            self.completed_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(JobStatus::parse("failed"), Some(JobStatus::Failed));
        assert_eq!(JobStatus::parse("bogus"), None);
    }

    #[test]
    fn transitions_are_monotonic() {
        let mut job = BatchJob::queued("transcribe-1", "s3://b/a.mp3", "en-US");
        assert_eq!(job.status, JobStatus::Queued);

        job.mark_in_progress();
        assert_eq!(job.status, JobStatus::InProgress);
        assert!(job.started_at.is_some());

        job.complete("hello".to_string());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.transcript.as_deref(), Some("hello"));
        assert!(job.completed_at.is_some());

        // 終端状態からは動かない
        job.fail("late failure".to_string());
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.failure_reason.is_none());
    }

    #[test]
    fn failure_reason_is_set_only_on_failed() {
        let mut job = BatchJob::queued("transcribe-2", "s3://b/b.mp3", "en-US");
        job.mark_in_progress();
        job.fail("bad media".to_string());
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_reason.as_deref(), Some("bad media"));
        assert!(job.transcript.is_none());
    }
}
