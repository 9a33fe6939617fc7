//! Handlers bound to the dispatcher's job types. Each handler owns one kind
//! of background work end to end; a handler error fails the job record only,
//! never the worker.

use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use validator::Validate;

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::dispatch::JobHandler;
use crate::model::types::{Disposition, SheetStatus, TrainingStatus};
use crate::schemas::jobs::{GradingJobData, PdfGenerationJob, SheetProcessingJob, TrainingJob};
use crate::services::reports::{render_report, ReportOptions};
use crate::services::review;
use crate::services::scoring::ScoreError;

/// Runs the full pipeline for an uploaded sheet: processing, region scoring,
/// annotation, routing. Sheets already past `uploaded` are left alone so a
/// duplicate submission cannot rewind recorded results.
pub struct SheetProcessingHandler {
    state: AppState,
}

impl SheetProcessingHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl JobHandler for SheetProcessingHandler {
    async fn handle(&self, job_id: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let job: SheetProcessingJob =
            serde_json::from_value(payload).context("Failed to parse sheet processing payload")?;
        job.validate().context("Invalid sheet processing payload")?;

        let sheet = self
            .state
            .sheets()
            .get(&job.sheet_id)
            .await
            .context("Sheet not found for processing job")?;
        if sheet.status != SheetStatus::Uploaded {
            tracing::info!(
                job_id,
                sheet_id = %job.sheet_id,
                status = %sheet.status,
                "Sheet already processed; skipping"
            );
            return Ok(());
        }

        let model_id = self.state.settings().ml().model_id.clone();
        process_sheet(&self.state, &job.sheet_id, &model_id).await
    }
}

/// Re-scores a batch of uploaded sheets against an explicit model. Sheets in
/// the batch fail or succeed independently.
pub struct GradingHandler {
    state: AppState,
}

impl GradingHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl JobHandler for GradingHandler {
    async fn handle(&self, job_id: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let job: GradingJobData =
            serde_json::from_value(payload).context("Failed to parse grading payload")?;
        job.validate().context("Invalid grading payload")?;

        for sheet_id in &job.sheet_ids {
            let sheet = match self.state.sheets().get(sheet_id).await {
                Ok(sheet) => sheet,
                Err(err) => {
                    tracing::warn!(job_id, sheet_id, error = %err, "Skipping unknown sheet");
                    continue;
                }
            };
            if sheet.status != SheetStatus::Uploaded {
                tracing::info!(
                    job_id,
                    sheet_id,
                    status = %sheet.status,
                    "Sheet not awaiting grading; skipping"
                );
                continue;
            }
            if let Err(err) = process_sheet(&self.state, sheet_id, &job.model_id).await {
                tracing::error!(job_id, sheet_id, error = %err, "Sheet failed within batch");
            }
        }
        Ok(())
    }
}

/// Drives one training session from pending to a terminal status.
pub struct TrainingHandler {
    state: AppState,
}

impl TrainingHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl JobHandler for TrainingHandler {
    async fn handle(&self, job_id: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let job: TrainingJob =
            serde_json::from_value(payload).context("Failed to parse training payload")?;
        job.validate().context("Invalid training payload")?;

        let session = self
            .state
            .training()
            .get(&job.session_id)
            .await
            .context("Training session not found")?;
        if session.status != TrainingStatus::Pending {
            // Typically a session cancelled between submit and pickup.
            tracing::info!(
                job_id,
                session_id = %job.session_id,
                status = %session.status,
                "Training session no longer pending; skipping"
            );
            return Ok(());
        }

        self.state.training().mark_running(&job.session_id).await?;
        tracing::info!(job_id, session_id = %job.session_id, "Training started");

        match self.state.trainer().train(&job).await {
            Ok(report) => {
                self.state
                    .training()
                    .mark_completed(
                        &job.session_id,
                        report.validation_accuracy,
                        report.duration_seconds,
                    )
                    .await?;
                metrics::counter!("training_sessions_total", "status" => "completed").increment(1);
                tracing::info!(
                    job_id,
                    session_id = %job.session_id,
                    accuracy = report.validation_accuracy,
                    "Training completed"
                );
                Ok(())
            }
            Err(err) => {
                self.state.training().mark_failed(&job.session_id).await?;
                metrics::counter!("training_sessions_total", "status" => "failed").increment(1);
                Err(err).context("Training run failed")
            }
        }
    }
}

/// Renders the report document for one finalized sheet.
pub struct PdfGenerationHandler {
    state: AppState,
}

impl PdfGenerationHandler {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[async_trait]
impl JobHandler for PdfGenerationHandler {
    async fn handle(&self, job_id: &str, payload: serde_json::Value) -> anyhow::Result<()> {
        let job: PdfGenerationJob =
            serde_json::from_value(payload).context("Failed to parse report payload")?;
        job.validate().context("Invalid report payload")?;

        let sheet = self
            .state
            .sheets()
            .get(&job.sheet_id)
            .await
            .context("Sheet not found for report job")?;
        if !matches!(sheet.status, SheetStatus::Graded | SheetStatus::Reviewed) {
            anyhow::bail!(
                "sheet '{}' is {} and cannot be reported on",
                job.sheet_id,
                sheet.status
            );
        }

        let regions = self
            .state
            .registry()
            .get_regions(&sheet.template_id, sheet.template_version)
            .await?;
        let options = ReportOptions::from_payload(job.options);
        let report = render_report(&sheet, &regions, options);
        self.state.reports().store_rendered(&job.sheet_id, report).await;

        metrics::counter!("reports_generated_total").increment(1);
        tracing::info!(job_id, sheet_id = %job.sheet_id, "Report rendered");
        Ok(())
    }
}

/// Shared pipeline body: uploaded -> processing -> processed -> annotated ->
/// graded, then auto-approval or the review queue. Scoring failures put the
/// sheet in the error state and complete the job; the sheet itself carries
/// the failure.
pub(crate) async fn process_sheet(
    state: &AppState,
    sheet_id: &str,
    model_id: &str,
) -> anyhow::Result<()> {
    let timer = Instant::now();
    state.sheets().transition(sheet_id, SheetStatus::Processing).await?;

    let sheet = state.sheets().get(sheet_id).await?;
    let regions =
        match state.registry().get_regions(&sheet.template_id, sheet.template_version).await {
            Ok(regions) => regions,
            Err(err) => {
                fail_sheet(state, sheet_id, &err.to_string()).await?;
                return Ok(());
            }
        };

    // Region extraction is complete once the template layout is resolved.
    let sheet = state.sheets().transition(sheet_id, SheetStatus::Processed).await?;

    let outcome = match state.engine().grade(&sheet, &regions, model_id).await {
        Ok(outcome) => outcome,
        Err(ScoreError::Fatal(reason)) | Err(ScoreError::Recoverable(reason)) => {
            fail_sheet(state, sheet_id, &reason).await?;
            return Ok(());
        }
    };

    state
        .sheets()
        .update(sheet_id, |sheet| {
            sheet.results = outcome.results.clone();
            sheet.transition(SheetStatus::Annotated)
        })
        .await?;

    let disposition = review::route(outcome.aggregate_confidence);
    let priority = review::priority_for(disposition);
    state
        .sheets()
        .update(sheet_id, |sheet| {
            sheet.aggregate_score = Some(outcome.aggregate_score);
            sheet.aggregate_confidence = Some(outcome.aggregate_confidence);
            sheet.disposition = Some(disposition);
            sheet.review_priority = Some(priority);
            sheet.transition(SheetStatus::Graded)
        })
        .await?;

    if disposition == Disposition::AutoApprove {
        let sheet = state
            .sheets()
            .update(sheet_id, |sheet| {
                sheet.transition(SheetStatus::Reviewed)?;
                sheet.reviewed_by = Some("auto-approval".to_string());
                sheet.reviewed_at = Some(primitive_now_utc());
                Ok(())
            })
            .await?;
        state.notifier().sheet_reviewed(&sheet).await;
    } else {
        state.review().enqueue(sheet_id, priority).await;
    }

    metrics::counter!("sheets_graded_total", "disposition" => disposition.as_str()).increment(1);
    metrics::histogram!("grading_duration_seconds").record(timer.elapsed().as_secs_f64());
    tracing::info!(
        sheet_id,
        score = outcome.aggregate_score,
        confidence = outcome.aggregate_confidence,
        disposition = disposition.as_str(),
        "Sheet graded"
    );
    Ok(())
}

async fn fail_sheet(state: &AppState, sheet_id: &str, reason: &str) -> anyhow::Result<()> {
    let sheet = state
        .sheets()
        .update(sheet_id, |sheet| sheet.mark_error(reason))
        .await?;
    state.notifier().sheet_errored(&sheet, reason).await;
    metrics::counter!("sheets_failed_total").increment(1);
    Ok(())
}
