use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::core::time::primitive_now_utc;
use crate::error::Error;
use crate::model::types::{Correctness, Disposition, ReviewPriority, SheetStatus};

/// Per-region grading verdict. Owned exclusively by its sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradingResult {
    pub region_id: String,
    pub correctness: Correctness,
    pub confidence: f64,
    pub awarded_points: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub status: SheetStatus,
    pub at: PrimitiveDateTime,
}

/// One scanned submission bound to exactly one template version. Immutable
/// once `Reviewed` except for the reviewer audit fields.
#[derive(Debug, Clone, Serialize)]
pub struct Sheet {
    pub id: String,
    pub template_id: String,
    pub template_version: u32,
    pub student_id: String,
    pub image_ref: String,
    pub status: SheetStatus,
    pub results: Vec<GradingResult>,
    pub aggregate_score: Option<f64>,
    pub aggregate_confidence: Option<f64>,
    pub disposition: Option<Disposition>,
    pub review_priority: Option<ReviewPriority>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<PrimitiveDateTime>,
    pub error_reason: Option<String>,
    pub created_at: PrimitiveDateTime,
    pub status_history: Vec<StatusChange>,
}

impl Sheet {
    pub fn new(
        id: impl Into<String>,
        template_id: impl Into<String>,
        template_version: u32,
        student_id: impl Into<String>,
        image_ref: impl Into<String>,
    ) -> Self {
        let now = primitive_now_utc();
        Self {
            id: id.into(),
            template_id: template_id.into(),
            template_version,
            student_id: student_id.into(),
            image_ref: image_ref.into(),
            status: SheetStatus::Uploaded,
            results: Vec::new(),
            aggregate_score: None,
            aggregate_confidence: None,
            disposition: None,
            review_priority: None,
            reviewed_by: None,
            reviewed_at: None,
            error_reason: None,
            created_at: now,
            status_history: vec![StatusChange { status: SheetStatus::Uploaded, at: now }],
        }
    }

    /// Moves the sheet forward one lifecycle step, stamping the transition.
    pub fn transition(&mut self, next: SheetStatus) -> Result<(), Error> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                sheet_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.status_history.push(StatusChange { status: next, at: primitive_now_utc() });
        Ok(())
    }

    pub fn mark_error(&mut self, reason: impl Into<String>) -> Result<(), Error> {
        self.transition(SheetStatus::Error)?;
        self.error_reason = Some(reason.into());
        Ok(())
    }
}
