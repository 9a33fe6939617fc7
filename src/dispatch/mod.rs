//! In-process job dispatcher: a bounded queue per job type feeding a fixed
//! pool of workers, with job records held in a concurrency-safe table.
//!
//! Dispatch is fire-and-forget: `submit` records the job as pending and
//! returns; handler failures are captured on the job record and logged, never
//! re-raised to the submitter. A failed job is terminal and must be
//! resubmitted by the caller if desired.

mod job;

pub use job::{Job, JobId, JobType, QueueStats};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::core::config::DispatchSettings;
use crate::error::Error;
use crate::model::types::JobStatus;

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job_id: &str, payload: serde_json::Value) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct JobDispatcher {
    shared: Arc<Shared>,
    lifecycle: Arc<Lifecycle>,
}

struct Shared {
    jobs: RwLock<HashMap<JobId, Job>>,
    handlers: RwLock<HashMap<JobType, Arc<dyn JobHandler>>>,
}

struct Lifecycle {
    senders: Mutex<Option<HashMap<JobType, mpsc::Sender<JobId>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobDispatcher {
    /// Spawns the worker pool. Must be called within a tokio runtime.
    pub fn start(settings: &DispatchSettings) -> Self {
        let shared = Arc::new(Shared {
            jobs: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
        });

        let mut senders = HashMap::new();
        let mut workers = Vec::new();
        for job_type in JobType::all() {
            let (tx, rx) = mpsc::channel::<JobId>(settings.queue_capacity);
            let rx = Arc::new(Mutex::new(rx));
            for _ in 0..settings.workers_per_queue {
                workers.push(tokio::spawn(worker_loop(shared.clone(), job_type, rx.clone())));
            }
            senders.insert(job_type, tx);
        }

        Self {
            shared,
            lifecycle: Arc::new(Lifecycle {
                senders: Mutex::new(Some(senders)),
                workers: Mutex::new(workers),
            }),
        }
    }

    /// Binds the handler for a job type. Exactly one handler per type; the
    /// last registration wins.
    pub async fn register_handler(&self, job_type: JobType, handler: Arc<dyn JobHandler>) {
        self.shared.handlers.write().await.insert(job_type, handler);
    }

    /// Creates a pending job record and schedules it. The handler never runs
    /// inside `submit`.
    pub async fn submit(
        &self,
        job_type: JobType,
        payload: serde_json::Value,
    ) -> Result<JobId, Error> {
        let job = Job::new(job_type, payload);
        let job_id = job.id.clone();
        self.shared.jobs.write().await.insert(job_id.clone(), job);

        let sender = {
            let senders = self.lifecycle.senders.lock().await;
            let Some(senders) = senders.as_ref() else {
                self.shared.jobs.write().await.remove(&job_id);
                return Err(Error::QueueClosed(job_type.as_str()));
            };
            senders.get(&job_type).cloned()
        };

        let Some(sender) = sender else {
            self.shared.jobs.write().await.remove(&job_id);
            return Err(Error::QueueClosed(job_type.as_str()));
        };

        if sender.send(job_id.clone()).await.is_err() {
            self.shared.jobs.write().await.remove(&job_id);
            return Err(Error::QueueClosed(job_type.as_str()));
        }

        metrics::counter!("jobs_submitted_total", "type" => job_type.as_str()).increment(1);
        Ok(job_id)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<Job, Error> {
        self.shared
            .jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
    }

    pub async fn queue_stats(&self) -> QueueStats {
        let jobs = self.shared.jobs.read().await;
        let mut stats = QueueStats { total: jobs.len(), ..QueueStats::default() };
        for job in jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Stops accepting new jobs, drains everything already queued, and joins
    /// the worker tasks.
    pub async fn shutdown(&self) {
        {
            let mut senders = self.lifecycle.senders.lock().await;
            senders.take();
        }

        let workers = {
            let mut workers = self.lifecycle.workers.lock().await;
            std::mem::take(&mut *workers)
        };
        for handle in workers {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Dispatcher worker join failed");
            }
        }
        tracing::info!("job dispatcher drained and stopped");
    }
}

async fn worker_loop(
    shared: Arc<Shared>,
    job_type: JobType,
    rx: Arc<Mutex<mpsc::Receiver<JobId>>>,
) {
    loop {
        let job_id = {
            let mut rx = rx.lock().await;
            match rx.recv().await {
                Some(id) => id,
                // Channel closed and drained: shutdown.
                None => break,
            }
        };
        run_job(&shared, job_type, &job_id).await;
    }
}

async fn run_job(shared: &Shared, job_type: JobType, job_id: &str) {
    let payload = {
        let mut jobs = shared.jobs.write().await;
        let Some(job) = jobs.get_mut(job_id) else {
            tracing::warn!(job_id, "Queued job has no record; skipping");
            return;
        };
        job.status = JobStatus::Processing;
        job.data.clone()
    };

    let handler = shared.handlers.read().await.get(&job_type).cloned();
    let Some(handler) = handler else {
        mark_finished(shared, job_id, JobStatus::Failed, Some("no handler registered".to_string()))
            .await;
        tracing::error!(job_id, job_type = %job_type, "No handler registered for job type");
        metrics::counter!("jobs_total", "type" => job_type.as_str(), "status" => "failed")
            .increment(1);
        return;
    };

    let timer = Instant::now();
    match handler.handle(job_id, payload).await {
        Ok(()) => {
            mark_finished(shared, job_id, JobStatus::Completed, None).await;
            metrics::counter!("jobs_total", "type" => job_type.as_str(), "status" => "completed")
                .increment(1);
        }
        Err(err) => {
            tracing::error!(job_id, job_type = %job_type, error = %err, "Job handler failed");
            mark_finished(shared, job_id, JobStatus::Failed, Some(err.to_string())).await;
            metrics::counter!("jobs_total", "type" => job_type.as_str(), "status" => "failed")
                .increment(1);
        }
    }
    metrics::histogram!("job_duration_seconds", "type" => job_type.as_str())
        .record(timer.elapsed().as_secs_f64());
}

async fn mark_finished(shared: &Shared, job_id: &str, status: JobStatus, error: Option<String>) {
    let mut jobs = shared.jobs.write().await;
    if let Some(job) = jobs.get_mut(job_id) {
        job.status = status;
        job.error = error;
    }
}
