use thiserror::Error;

use crate::model::types::{SheetStatus, TrainingStatus};

/// Core error taxonomy. Region-level scoring failures are not represented
/// here: they are recovered locally by the grading engine (see
/// `services::scoring::ScoreError`).
#[derive(Debug, Error)]
pub enum Error {
    #[error("template {template_id} version {version} not found")]
    TemplateNotFound { template_id: String, version: u32 },

    #[error("sheet {0} not found")]
    SheetNotFound(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("training session {0} not found")]
    SessionNotFound(String),

    #[error("sheet {sheet_id}: illegal transition {from} -> {to}")]
    InvalidTransition { sheet_id: String, from: SheetStatus, to: SheetStatus },

    #[error("sheet {sheet_id} is {status}; reports require graded or reviewed")]
    InvalidStateForReport { sheet_id: String, status: SheetStatus },

    #[error("training session {session_id} is already terminal ({status})")]
    SessionTerminal { session_id: String, status: TrainingStatus },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("dispatcher is shut down; queue for {0} no longer accepts jobs")]
    QueueClosed(&'static str),
}
