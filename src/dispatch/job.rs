use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::core::time::primitive_now_utc;
use crate::model::types::JobStatus;

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    SheetProcessing,
    Training,
    Grading,
    PdfGeneration,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SheetProcessing => "sheet-processing",
            Self::Training => "training",
            Self::Grading => "grading",
            Self::PdfGeneration => "pdf-generation",
        }
    }

    pub fn all() -> [JobType; 4] {
        [Self::SheetProcessing, Self::Training, Self::Grading, Self::PdfGeneration]
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dispatcher-internal record wrapping one unit of work. Append-only: ids are
/// never reused across submissions.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    pub data: serde_json::Value,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: PrimitiveDateTime,
}

impl Job {
    pub(crate) fn new(job_type: JobType, data: serde_json::Value) -> Self {
        Self {
            id: next_job_id(job_type),
            job_type,
            data,
            status: JobStatus::Pending,
            error: None,
            created_at: primitive_now_utc(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

static JOB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// `{type}-{monotonic counter}-{timestamp}`: unique within a process lifetime.
fn next_job_id(job_type: JobType) -> JobId {
    let seq = JOB_COUNTER.fetch_add(1, Ordering::Relaxed);
    let timestamp = OffsetDateTime::now_utc().unix_timestamp();
    format!("{}-{}-{}", job_type.as_str(), seq, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let first = Job::new(JobType::Training, serde_json::json!({}));
        let second = Job::new(JobType::Training, serde_json::json!({}));
        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("training-"));
        assert!(second.id.starts_with("training-"));
    }

    #[test]
    fn new_jobs_start_pending() {
        let job = Job::new(JobType::PdfGeneration, serde_json::json!({"sheetId": "s1"}));
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error.is_none());
        assert!(job.id.starts_with("pdf-generation-"));
    }
}
