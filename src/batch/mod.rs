//! バッチ文字起こしモジュール
//!
//! `BatchOrchestrator` がジョブの送信と監視を束ねます。
//!
//! - ジョブのメタデータは `JobRegistry`（in-memory ストア）で管理
//! - 1ジョブにつき1つの監視タスクが間隔・回数上限つきでポーリング
//! - 終端状態に達したエントリも一覧・照会のために保持される
mod error;
mod job;
mod models;
mod orchestrator;
mod registry;

pub use error::BatchError;
pub use job::{BatchJob, JobStatus};
pub use models::{
    ErrorBody, JobListFilters, JobListResponse, JobStatusResponse, JobSummary, StartJobResponse,
};
pub use orchestrator::{BatchOrchestrator, JobHandle, JobOutcome};
pub use registry::{JobRegistry, MAX_LIST_RESULTS};
