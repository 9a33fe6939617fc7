//! End-to-end pipeline runs against in-process stubs: upload, dispatch,
//! scoring, routing, review, and reporting.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use scangrade::core::config::Settings;
use scangrade::core::state::AppState;
use scangrade::dispatch::{Job, JobDispatcher, JobType};
use scangrade::model::sheet::Sheet;
use scangrade::model::template::RegionSpec;
use scangrade::model::training::TrainingConfig;
use scangrade::model::types::{
    Correctness, Disposition, JobStatus, QuestionType, ReviewPriority, SheetStatus, TrainingStatus,
};
use scangrade::schemas::jobs::TrainingJob;
use scangrade::services::notify::LogNotifier;
use scangrade::services::reports::ReportOptions;
use scangrade::services::scoring::{
    ModelTrainer, RegionScore, ScoreError, ScoreRequest, Scorer, TrainingReport,
};
use scangrade::tasks::register_handlers;

use scangrade::model::template::BoundingBox;

/// Awards full points on every region at a fixed confidence.
struct FixedScorer {
    confidence: f64,
    delay: Duration,
}

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, request: ScoreRequest) -> Result<RegionScore, ScoreError> {
        sleep(self.delay).await;
        Ok(RegionScore {
            correctness: Correctness::Correct,
            confidence: self.confidence,
            awarded_points: request.max_points,
            explanation: "stubbed".to_string(),
        })
    }
}

struct FatalScorer;

#[async_trait]
impl Scorer for FatalScorer {
    async fn score(&self, _request: ScoreRequest) -> Result<RegionScore, ScoreError> {
        Err(ScoreError::Fatal("unreadable scan image".to_string()))
    }
}

struct StubTrainer {
    fail: bool,
}

#[async_trait]
impl ModelTrainer for StubTrainer {
    async fn train(&self, _job: &TrainingJob) -> anyhow::Result<TrainingReport> {
        if self.fail {
            anyhow::bail!("training diverged");
        }
        Ok(TrainingReport { validation_accuracy: 0.93, duration_seconds: 42.0 })
    }
}

async fn app_state(scorer: Arc<dyn Scorer>, trainer: Arc<dyn ModelTrainer>) -> AppState {
    let settings = Settings::load().expect("default settings");
    let dispatcher = JobDispatcher::start(settings.dispatch());
    let state = AppState::new(settings, dispatcher, scorer, trainer, Arc::new(LogNotifier));
    register_handlers(&state).await;
    state
}

fn region_spec(label: &str, points: f64, order_index: u32) -> RegionSpec {
    RegionSpec {
        label: label.to_string(),
        question_type: QuestionType::ShortAnswer,
        points,
        bbox: BoundingBox { x: 0.1, y: 0.1 * (order_index + 1) as f64, width: 0.8, height: 0.08 },
        order_index,
        metadata: None,
    }
}

/// Registers a three-region template worth 20 points and uploads one sheet
/// bound to it.
async fn upload_sheet(state: &AppState, sheet_id: &str) -> String {
    let template = state
        .registry()
        .register(
            "quiz",
            vec![region_spec("q1", 5.0, 0), region_spec("q2", 5.0, 1), region_spec("q3", 10.0, 2)],
        )
        .await
        .expect("register template");
    state
        .sheets()
        .insert(Sheet::new(
            sheet_id,
            template.id.clone(),
            template.version,
            "student-1",
            format!("scans/{sheet_id}.png"),
        ))
        .await;
    template.id
}

async fn submit_processing_job(state: &AppState, sheet_id: &str, template_id: &str) -> String {
    state
        .dispatcher()
        .submit(
            JobType::SheetProcessing,
            serde_json::json!({
                "sheetId": sheet_id,
                "templateId": template_id,
                "regions": [],
            }),
        )
        .await
        .expect("submit")
}

async fn wait_for_job(state: &AppState, job_id: &str) -> Job {
    for _ in 0..300 {
        let job = state.dispatcher().get_status(job_id).await.expect("job exists");
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return job;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never finished");
}

#[tokio::test]
async fn high_confidence_sheet_is_auto_approved() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.97, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;
    let template_id = upload_sheet(&state, "s1").await;

    let job_id = submit_processing_job(&state, "s1", &template_id).await;
    let job = wait_for_job(&state, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);

    let sheet = state.sheets().get("s1").await.expect("sheet");
    assert_eq!(sheet.status, SheetStatus::Reviewed);
    assert_eq!(sheet.disposition, Some(Disposition::AutoApprove));
    assert_eq!(sheet.aggregate_score, Some(20.0));
    assert_eq!(sheet.aggregate_confidence, Some(0.97));
    assert_eq!(sheet.reviewed_by.as_deref(), Some("auto-approval"));
    assert_eq!(sheet.results.len(), 3);

    // Auto-approved sheets never hit the human queue.
    assert_eq!(state.review().pending().await, 0);
}

#[tokio::test]
async fn low_confidence_sheet_waits_for_detailed_review() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.6, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;
    let template_id = upload_sheet(&state, "s1").await;

    let job_id = submit_processing_job(&state, "s1", &template_id).await;
    wait_for_job(&state, &job_id).await;

    let sheet = state.sheets().get("s1").await.expect("sheet");
    assert_eq!(sheet.status, SheetStatus::Graded);
    assert_eq!(sheet.disposition, Some(Disposition::DetailedReview));
    assert_eq!(sheet.review_priority, Some(ReviewPriority::High));

    let item = state.review().next_for_review().await.expect("queued item");
    assert_eq!(item.sheet_id, "s1");
    assert_eq!(item.priority, ReviewPriority::High);

    // The human confirms the grade and the sheet is finalized.
    let reviewed = state
        .review()
        .resolve(state.sheets(), state.notifier().as_ref(), "s1", "teacher-7")
        .await
        .expect("resolve");
    assert_eq!(reviewed.status, SheetStatus::Reviewed);
    assert_eq!(reviewed.reviewed_by.as_deref(), Some("teacher-7"));
}

#[tokio::test]
async fn submission_returns_before_the_pipeline_runs() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.97, delay: Duration::from_millis(60) }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;
    let template_id = upload_sheet(&state, "s1").await;

    let job_id = submit_processing_job(&state, "s1", &template_id).await;

    // Fire-and-forget: the record exists but the sheet has not reached a
    // terminal state yet.
    let job = state.dispatcher().get_status(&job_id).await.expect("job");
    assert!(matches!(job.status, JobStatus::Pending | JobStatus::Processing));
    let sheet = state.sheets().get("s1").await.expect("sheet");
    assert!(!sheet.status.is_terminal());

    wait_for_job(&state, &job_id).await;
    assert_eq!(state.sheets().get("s1").await.expect("sheet").status, SheetStatus::Reviewed);
}

#[tokio::test]
async fn fatal_scoring_failure_parks_the_sheet_in_error() {
    let state =
        app_state(Arc::new(FatalScorer), Arc::new(StubTrainer { fail: false })).await;
    let template_id = upload_sheet(&state, "s1").await;

    let job_id = submit_processing_job(&state, "s1", &template_id).await;
    let job = wait_for_job(&state, &job_id).await;

    // The job itself completes; the failure lives on the sheet.
    assert_eq!(job.status, JobStatus::Completed);
    let sheet = state.sheets().get("s1").await.expect("sheet");
    assert_eq!(sheet.status, SheetStatus::Error);
    assert_eq!(sheet.error_reason.as_deref(), Some("unreadable scan image"));
    assert_eq!(state.review().pending().await, 0);
}

#[tokio::test]
async fn duplicate_submission_does_not_rewind_a_graded_sheet() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.97, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;
    let template_id = upload_sheet(&state, "s1").await;

    let first = submit_processing_job(&state, "s1", &template_id).await;
    wait_for_job(&state, &first).await;
    let before = state.sheets().get("s1").await.expect("sheet");

    let second = submit_processing_job(&state, "s1", &template_id).await;
    let job = wait_for_job(&state, &second).await;
    assert_eq!(job.status, JobStatus::Completed);

    let after = state.sheets().get("s1").await.expect("sheet");
    assert_eq!(after.status, before.status);
    assert_eq!(after.status_history.len(), before.status_history.len());
}

#[tokio::test]
async fn grading_batch_scores_uploaded_sheets_independently() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.9, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;
    let template_id = upload_sheet(&state, "s1").await;
    state
        .sheets()
        .insert(Sheet::new("s2", template_id.clone(), 1, "student-2", "scans/s2.png"))
        .await;

    let job_id = state
        .dispatcher()
        .submit(
            JobType::Grading,
            serde_json::json!({
                "jobId": "batch-1",
                "sheetIds": ["s1", "missing", "s2"],
                "modelId": "experimental-2",
                "templateId": template_id,
            }),
        )
        .await
        .expect("submit");

    let job = wait_for_job(&state, &job_id).await;
    assert_eq!(job.status, JobStatus::Completed);

    // Both known sheets graded at medium confidence; the unknown id is skipped.
    for sheet_id in ["s1", "s2"] {
        let sheet = state.sheets().get(sheet_id).await.expect("sheet");
        assert_eq!(sheet.status, SheetStatus::Graded);
        assert_eq!(sheet.disposition, Some(Disposition::QuickReview));
    }
    assert_eq!(state.review().pending().await, 2);
}

#[tokio::test]
async fn training_session_runs_to_completion() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.97, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;

    let config =
        TrainingConfig { epochs: 5, learning_rate: 0.01, batch_size: 8, validation_split: 0.2 };
    let (session, job_id) =
        state.training().submit("t1", "teacher-1", config).await.expect("submit");
    assert_eq!(session.status, TrainingStatus::Pending);

    wait_for_job(&state, &job_id).await;
    let finished = state.training().get(&session.id).await.expect("session");
    assert_eq!(finished.status, TrainingStatus::Completed);
    assert_eq!(finished.validation_accuracy, Some(0.93));
    assert_eq!(finished.duration_seconds, Some(42.0));
}

#[tokio::test]
async fn failed_training_marks_the_session_and_the_job() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.97, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: true }),
    )
    .await;

    let config =
        TrainingConfig { epochs: 5, learning_rate: 0.01, batch_size: 8, validation_split: 0.2 };
    let (session, job_id) =
        state.training().submit("t1", "teacher-1", config).await.expect("submit");

    let job = wait_for_job(&state, &job_id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.as_deref().unwrap_or_default().contains("Training run failed"));

    let finished = state.training().get(&session.id).await.expect("session");
    assert_eq!(finished.status, TrainingStatus::Failed);
}

#[tokio::test]
async fn batch_reports_render_for_finalized_sheets_only() {
    let state = app_state(
        Arc::new(FixedScorer { confidence: 0.9, delay: Duration::ZERO }),
        Arc::new(StubTrainer { fail: false }),
    )
    .await;
    let template_id = upload_sheet(&state, "s1").await;
    state
        .sheets()
        .insert(Sheet::new("s2", template_id.clone(), 1, "student-2", "scans/s2.png"))
        .await;
    state
        .sheets()
        .insert(Sheet::new("pending", template_id.clone(), 1, "student-3", "scans/p.png"))
        .await;

    // Grade two of the three sheets.
    for sheet_id in ["s1", "s2"] {
        let job_id = submit_processing_job(&state, sheet_id, &template_id).await;
        wait_for_job(&state, &job_id).await;
    }

    let ids = vec!["s1".to_string(), "pending".to_string(), "s2".to_string()];
    let jobs = state.reports().generate_batch(&ids, ReportOptions::default()).await;
    assert!(jobs[0].is_ok());
    assert!(jobs[1].is_err());
    assert!(jobs[2].is_ok());

    for job_id in jobs.into_iter().flatten() {
        let job = wait_for_job(&state, &job_id).await;
        assert_eq!(job.status, JobStatus::Completed);
    }

    for sheet_id in ["s1", "s2"] {
        let report = state.reports().report_for(sheet_id).await.expect("rendered report");
        assert_eq!(report["sheetId"], sheet_id);
        assert_eq!(report["scoreBreakdown"]["totalScore"], 20.0);
        assert_eq!(report["confidence"]["aggregate"], 0.9);
        assert_eq!(report["overlay"].as_array().map(Vec::len), Some(3));
    }
    assert!(state.reports().report_for("pending").await.is_none());
}
