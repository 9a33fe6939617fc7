//! Downstream messaging is informed, not queried, when a sheet reaches a
//! terminal state. The real notification service lives outside this core.

use async_trait::async_trait;

use crate::model::sheet::Sheet;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn sheet_reviewed(&self, sheet: &Sheet);
    async fn sheet_errored(&self, sheet: &Sheet, reason: &str);
}

/// Default fan-out: structured log events only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn sheet_reviewed(&self, sheet: &Sheet) {
        tracing::info!(
            sheet_id = %sheet.id,
            student_id = %sheet.student_id,
            score = sheet.aggregate_score,
            "Sheet finalized"
        );
    }

    async fn sheet_errored(&self, sheet: &Sheet, reason: &str) {
        tracing::warn!(
            sheet_id = %sheet.id,
            student_id = %sheet.student_id,
            reason,
            "Sheet requires manual intervention"
        );
    }
}
