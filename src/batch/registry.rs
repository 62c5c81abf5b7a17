//! ジョブレジストリ
use std::collections::HashMap;

use parking_lot::RwLock;

use super::job::{BatchJob, JobStatus};

/// 一覧取得の上限件数
pub const MAX_LIST_RESULTS: usize = 100;

/// ジョブ名→メタデータの in-memory ストア
///
/// 書き込みは当該ジョブの監視タスクのみ。読み手（ステータス照会・
/// 一覧）は複製したスナップショットを受け取る。
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, BatchJob>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: BatchJob) {
        self.jobs.write().insert(job.job_name.clone(), job);
    }

    pub fn get(&self, job_name: &str) -> Option<BatchJob> {
        self.jobs.read().get(job_name).cloned()
    }

    /// クロージャでジョブを更新する。存在しなければ false
    pub(crate) fn update<F>(&self, job_name: &str, f: F) -> bool
    where
        F: FnOnce(&mut BatchJob),
    {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(job_name) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }

    /// 新しい順に並べ、フィルタと件数上限を適用した一覧
    pub fn list(&self, status_filter: Option<JobStatus>, max_results: usize) -> Vec<BatchJob> {
        let cap = max_results.min(MAX_LIST_RESULTS);
        let mut jobs: Vec<BatchJob> = self
            .jobs
            .read()
            .values()
            .filter(|job| status_filter.map_or(true, |status| job.status == status))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(cap);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// 終端状態かつ保持期間を過ぎたジョブを削除し、件数を返す
    pub fn prune_finished(&self, older_than: std::time::Duration) -> usize {
        let age = match chrono::Duration::from_std(older_than) {
            Ok(age) => age,
            Err(_) => return 0,
        };
        let cutoff = chrono::Utc::now() - age;
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.is_terminal() && job.completed_at.map_or(false, |t| t < cutoff))
        });
        before - jobs.len()
    }
}
