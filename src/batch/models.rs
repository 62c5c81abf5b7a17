//! バッチREST表面のレスポンスモデル
//!
//! ルーティングやマルチパート解釈は持たず、レジストリのエントリから
//! 応答ボディを組み立てる型だけを提供します。
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job::{BatchJob, JobStatus};

/// `POST start-job` の 201 応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_name: String,
    pub status: JobStatus,
    pub s3_url: String,
    pub status_endpoint: String,
}

impl StartJobResponse {
    pub fn from_job(job: &BatchJob) -> Self {
        Self {
            job_name: job.job_name.clone(),
            status: job.status,
            s3_url: job.source_uri.clone(),
            status_endpoint: format!("/transcribe-job/{}", job.job_name),
        }
    }
}

/// `GET job/<name>` の 200 応答
///
/// 項目は状態によって増減する: COMPLETED なら `transcript`、
/// FAILED なら `failure_reason` が付く。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_name: String,
    pub status: JobStatus,
    pub language_code: String,
    pub creation_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_sample_rate_hz: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobStatusResponse {
    pub fn from_job(job: &BatchJob) -> Self {
        Self {
            job_name: job.job_name.clone(),
            status: job.status,
            language_code: job.language_code.clone(),
            creation_time: job.created_at,
            completion_time: job.completed_at,
            media_format: job.media_format.clone(),
            media_sample_rate_hz: job.sample_rate_hz,
            transcript: job.transcript.clone(),
            failure_reason: job.failure_reason.clone(),
        }
    }
}

/// 一覧応答の1エントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_name: String,
    pub status: JobStatus,
    pub language_code: String,
    pub creation_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobSummary {
    pub fn from_job(job: &BatchJob) -> Self {
        Self {
            job_name: job.job_name.clone(),
            status: job.status,
            language_code: job.language_code.clone(),
            creation_time: job.created_at,
            completion_time: job.completed_at,
            failure_reason: job.failure_reason.clone(),
        }
    }
}

/// `GET jobs` の応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobSummary>,
    pub count: usize,
    pub filters: JobListFilters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListFilters {
    pub status: Option<JobStatus>,
    pub max_results: usize,
}

impl JobListResponse {
    pub fn new(jobs: &[BatchJob], status: Option<JobStatus>, max_results: usize) -> Self {
        let jobs: Vec<JobSummary> = jobs.iter().map(JobSummary::from_job).collect();
        Self {
            count: jobs.len(),
            jobs,
            filters: JobListFilters {
                status,
                max_results,
            },
        }
    }
}

/// 404 等のエラー応答ボディ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
