//! Job payload shapes consumed by the dispatcher. These are the wire
//! contracts external collaborators submit; field names are camelCase.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::model::training::TrainingConfig;
use crate::model::types::QuestionType;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegionPayload {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub bbox_x: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub bbox_y: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub bbox_width: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub bbox_height: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_type: Option<QuestionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SheetProcessingJob {
    #[validate(length(min = 1))]
    pub sheet_id: String,
    #[validate(length(min = 1))]
    pub template_id: String,
    #[validate(nested)]
    pub regions: Vec<RegionPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TrainingJob {
    #[validate(length(min = 1))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub template_id: String,
    #[validate(length(min = 1))]
    pub teacher_id: String,
    pub config: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradingJobData {
    #[validate(length(min = 1))]
    pub job_id: String,
    #[validate(length(min = 1))]
    pub sheet_ids: Vec<String>,
    #[validate(length(min = 1))]
    pub model_id: String,
    #[validate(length(min = 1))]
    pub template_id: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptionsPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_overlay: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_score_breakdown: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_confidence: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PdfGenerationJob {
    #[validate(length(min = 1))]
    pub sheet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ReportOptionsPayload>,
}
