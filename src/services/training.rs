//! Manages long-running model-training sessions. Execution is delegated to
//! the job dispatcher under the `training` job type; this component only
//! tracks session lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::dispatch::{JobDispatcher, JobId, JobType};
use crate::error::Error;
use crate::model::training::{TrainingConfig, TrainingSession};
use crate::model::types::TrainingStatus;
use crate::schemas::jobs::TrainingJob;

#[derive(Clone)]
pub struct TrainingOrchestrator {
    sessions: Arc<RwLock<HashMap<String, TrainingSession>>>,
    dispatcher: JobDispatcher,
}

impl TrainingOrchestrator {
    pub fn new(dispatcher: JobDispatcher) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), dispatcher }
    }

    /// Creates a pending session and schedules it. Concurrent sessions for
    /// the same (template, teacher) pair are allowed; callers needing
    /// exclusivity must serialize submissions themselves.
    pub async fn submit(
        &self,
        template_id: &str,
        teacher_id: &str,
        config: TrainingConfig,
    ) -> Result<(TrainingSession, JobId), Error> {
        config.validate()?;

        let session =
            TrainingSession::new(Uuid::new_v4().to_string(), template_id, teacher_id, config);
        self.sessions.write().await.insert(session.id.clone(), session.clone());

        let payload = TrainingJob {
            session_id: session.id.clone(),
            template_id: template_id.to_string(),
            teacher_id: teacher_id.to_string(),
            config,
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|err| Error::InvalidPayload(err.to_string()))?;
        let job_id = self.dispatcher.submit(JobType::Training, payload).await?;

        tracing::info!(session_id = %session.id, job_id, template_id, "Training session submitted");
        Ok((session, job_id))
    }

    pub async fn get(&self, session_id: &str) -> Result<TrainingSession, Error> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))
    }

    /// Administrative cancellation: marks the session terminal. This is not
    /// a best-effort interrupt; dispatched work runs to completion and its
    /// result is discarded by the terminal-status guard.
    pub async fn cancel(&self, session_id: &str) -> Result<TrainingSession, Error> {
        self.update(session_id, |session| {
            if session.status.is_terminal() {
                return Err(Error::SessionTerminal {
                    session_id: session.id.clone(),
                    status: session.status,
                });
            }
            session.status = TrainingStatus::Cancelled;
            Ok(())
        })
        .await
    }

    pub(crate) async fn mark_running(&self, session_id: &str) -> Result<TrainingSession, Error> {
        self.update(session_id, |session| {
            if session.status.is_terminal() {
                return Err(Error::SessionTerminal {
                    session_id: session.id.clone(),
                    status: session.status,
                });
            }
            session.status = TrainingStatus::Running;
            Ok(())
        })
        .await
    }

    pub(crate) async fn mark_completed(
        &self,
        session_id: &str,
        validation_accuracy: f64,
        duration_seconds: f64,
    ) -> Result<TrainingSession, Error> {
        self.update(session_id, |session| {
            if session.status == TrainingStatus::Cancelled {
                // Cancelled stays cancelled; the late result is dropped.
                return Ok(());
            }
            session.status = TrainingStatus::Completed;
            session.validation_accuracy = Some(validation_accuracy);
            session.duration_seconds = Some(duration_seconds);
            Ok(())
        })
        .await
    }

    pub(crate) async fn mark_failed(&self, session_id: &str) -> Result<TrainingSession, Error> {
        self.update(session_id, |session| {
            if session.status == TrainingStatus::Cancelled {
                return Ok(());
            }
            session.status = TrainingStatus::Failed;
            Ok(())
        })
        .await
    }

    async fn update<F>(&self, session_id: &str, apply: F) -> Result<TrainingSession, Error>
    where
        F: FnOnce(&mut TrainingSession) -> Result<(), Error>,
    {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        apply(session)?;
        session.updated_at = primitive_now_utc();
        Ok(session.clone())
    }
}
