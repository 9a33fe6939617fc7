//! Batches finalized sheets into rendered output (overlay + score
//! breakdown). Each sheet gets its own job; a batch is never one atomic job.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;

use crate::core::time::{format_primitive, primitive_now_utc};
use crate::dispatch::{JobDispatcher, JobId, JobType};
use crate::error::Error;
use crate::model::sheet::Sheet;
use crate::model::template::Region;
use crate::model::types::SheetStatus;
use crate::schemas::jobs::{PdfGenerationJob, ReportOptionsPayload};
use crate::store::SheetStore;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    pub include_overlay: bool,
    pub include_score_breakdown: bool,
    pub include_confidence: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self { include_overlay: true, include_score_breakdown: true, include_confidence: true }
    }
}

impl ReportOptions {
    pub fn from_payload(payload: Option<ReportOptionsPayload>) -> Self {
        let defaults = Self::default();
        let Some(payload) = payload else { return defaults };
        Self {
            include_overlay: payload.include_overlay.unwrap_or(defaults.include_overlay),
            include_score_breakdown: payload
                .include_score_breakdown
                .unwrap_or(defaults.include_score_breakdown),
            include_confidence: payload.include_confidence.unwrap_or(defaults.include_confidence),
        }
    }

    fn to_payload(self) -> ReportOptionsPayload {
        ReportOptionsPayload {
            include_overlay: Some(self.include_overlay),
            include_score_breakdown: Some(self.include_score_breakdown),
            include_confidence: Some(self.include_confidence),
        }
    }
}

#[derive(Clone)]
pub struct ReportGenerator {
    dispatcher: JobDispatcher,
    sheets: SheetStore,
    rendered: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl ReportGenerator {
    pub fn new(dispatcher: JobDispatcher, sheets: SheetStore) -> Self {
        Self { dispatcher, sheets, rendered: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Only graded or reviewed sheets may be submitted.
    pub async fn generate(&self, sheet_id: &str, options: ReportOptions) -> Result<JobId, Error> {
        let sheet = self.sheets.get(sheet_id).await?;
        if !matches!(sheet.status, SheetStatus::Graded | SheetStatus::Reviewed) {
            return Err(Error::InvalidStateForReport {
                sheet_id: sheet_id.to_string(),
                status: sheet.status,
            });
        }

        let payload = PdfGenerationJob {
            sheet_id: sheet_id.to_string(),
            options: Some(options.to_payload()),
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|err| Error::InvalidPayload(err.to_string()))?;
        self.dispatcher.submit(JobType::PdfGeneration, payload).await
    }

    /// One job per sheet; a failing sheet never blocks the others.
    pub async fn generate_batch(
        &self,
        sheet_ids: &[String],
        options: ReportOptions,
    ) -> Vec<Result<JobId, Error>> {
        let mut jobs = Vec::with_capacity(sheet_ids.len());
        for sheet_id in sheet_ids {
            jobs.push(self.generate(sheet_id, options).await);
        }
        jobs
    }

    pub(crate) async fn store_rendered(&self, sheet_id: &str, report: serde_json::Value) {
        self.rendered.write().await.insert(sheet_id.to_string(), report);
    }

    pub async fn report_for(&self, sheet_id: &str) -> Option<serde_json::Value> {
        self.rendered.read().await.get(sheet_id).cloned()
    }
}

pub(crate) fn render_report(
    sheet: &Sheet,
    regions: &[Region],
    options: ReportOptions,
) -> serde_json::Value {
    let mut report = json!({
        "sheetId": sheet.id,
        "studentId": sheet.student_id,
        "templateId": sheet.template_id,
        "templateVersion": sheet.template_version,
        "status": sheet.status,
        "generatedAt": format_primitive(primitive_now_utc()),
    });

    if options.include_overlay {
        report["overlay"] = regions
            .iter()
            .map(|region| {
                json!({
                    "regionId": region.id,
                    "label": region.label,
                    "bbox": region.bbox,
                })
            })
            .collect();
    }

    if options.include_score_breakdown {
        let max_score: f64 = regions.iter().map(|region| region.points).sum();
        let breakdown: Vec<_> = sheet
            .results
            .iter()
            .map(|result| {
                let max_points = regions
                    .iter()
                    .find(|region| region.id == result.region_id)
                    .map(|region| region.points);
                json!({
                    "regionId": result.region_id,
                    "correctness": result.correctness,
                    "awardedPoints": result.awarded_points,
                    "maxPoints": max_points,
                    "explanation": result.explanation,
                })
            })
            .collect();
        report["scoreBreakdown"] = json!({
            "totalScore": sheet.aggregate_score,
            "maxScore": max_score,
            "regions": breakdown,
        });
    }

    if options.include_confidence {
        let per_region: Vec<_> = sheet
            .results
            .iter()
            .map(|result| json!({"regionId": result.region_id, "confidence": result.confidence}))
            .collect();
        report["confidence"] = json!({
            "aggregate": sheet.aggregate_confidence,
            "perRegion": per_region,
        });
    }

    report
}
