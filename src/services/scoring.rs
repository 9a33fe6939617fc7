//! The scoring function is an injected capability: the grading engine only
//! sees the `Scorer` trait. `MlScoringClient` is the production
//! implementation, talking to the ML microservice over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::Settings;
use crate::model::template::BoundingBox;
use crate::model::types::{Correctness, QuestionType};
use crate::schemas::jobs::TrainingJob;

#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub model_id: String,
    pub region_id: String,
    pub question_type: QuestionType,
    pub max_points: f64,
    pub image_ref: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone)]
pub struct RegionScore {
    pub correctness: Correctness,
    pub confidence: f64,
    pub awarded_points: f64,
    pub explanation: String,
}

/// Region-level failures are recoverable (folded into the aggregate as an
/// incorrect, zero-confidence region); fatal failures abort the whole sheet.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("scoring failed: {0}")]
    Recoverable(String),
    #[error("fatal ingest failure: {0}")]
    Fatal(String),
}

#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, request: ScoreRequest) -> Result<RegionScore, ScoreError>;
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub validation_accuracy: f64,
    pub duration_seconds: f64,
}

#[async_trait]
pub trait ModelTrainer: Send + Sync {
    async fn train(&self, job: &TrainingJob) -> Result<TrainingReport>;
}

pub fn explanation_for(correctness: Correctness, confidence: f64) -> String {
    match correctness {
        Correctness::Skipped => "No answer detected in this region.".to_string(),
        Correctness::Correct if confidence > 0.9 => {
            format!("Answer is correct with high confidence ({:.0}%).", confidence * 100.0)
        }
        Correctness::Correct => {
            format!("Answer appears correct ({:.0}%).", confidence * 100.0)
        }
        Correctness::Partial => format!(
            "Partial answer detected ({:.0}%); some elements correct but incomplete.",
            confidence * 100.0
        ),
        Correctness::Incorrect => format!(
            "Answer does not match expected criteria ({:.0}%); review recommended.",
            confidence * 100.0
        ),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PredictionResponse {
    predicted_correctness: Correctness,
    confidence: f64,
    assigned_score: Option<f64>,
    explanation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TrainingResponse {
    validation_accuracy: f64,
    training_time_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct MlScoringClient {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl MlScoringClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.ml().request_timeout_seconds);
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.ml().base_url.trim_end_matches('/').to_string(),
            api_key: settings.ml().api_key.clone(),
            max_retries: settings.ml().max_retries,
        })
    }

    async fn post_with_retries(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ScoreError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            let response =
                self.client.post(url).bearer_auth(&self.api_key).json(payload).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
                    if status.is_success() {
                        return Ok(body);
                    }
                    let detail = body
                        .get("detail")
                        .and_then(|value| value.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    // Client-side rejections will not improve on retry; the
                    // image itself is the problem.
                    if status.is_client_error() && status.as_u16() != 429 {
                        return Err(ScoreError::Fatal(format!("ML service rejected request: {detail}")));
                    }
                    last_error = Some(format!("ML service error ({status}): {detail}"));
                }
                Err(err) => {
                    last_error = Some(format!("Failed to call ML service: {err}"));
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
            }
        }

        Err(ScoreError::Recoverable(
            last_error.unwrap_or_else(|| "ML service unreachable".to_string()),
        ))
    }
}

#[async_trait]
impl Scorer for MlScoringClient {
    async fn score(&self, request: ScoreRequest) -> Result<RegionScore, ScoreError> {
        let url = format!("{}/predict", self.base_url);
        let payload = serde_json::json!({
            "model_id": request.model_id,
            "region_id": request.region_id,
            "question_type": request.question_type,
            "max_points": request.max_points,
            "image_ref": request.image_ref,
            "bbox": request.bbox,
        });

        tracing::debug!(region_id = %request.region_id, "Sending region scoring request");
        let body = self.post_with_retries(&url, &payload).await?;

        let prediction: PredictionResponse = serde_json::from_value(body)
            .map_err(|err| ScoreError::Recoverable(format!("Malformed ML response: {err}")))?;

        let confidence = prediction.confidence.clamp(0.0, 1.0);
        let awarded_points = prediction
            .assigned_score
            .unwrap_or_else(|| prediction.predicted_correctness.points(request.max_points));
        let explanation = prediction
            .explanation
            .unwrap_or_else(|| explanation_for(prediction.predicted_correctness, confidence));

        Ok(RegionScore {
            correctness: prediction.predicted_correctness,
            confidence,
            awarded_points,
            explanation,
        })
    }
}

#[async_trait]
impl ModelTrainer for MlScoringClient {
    async fn train(&self, job: &TrainingJob) -> Result<TrainingReport> {
        let url = format!("{}/train", self.base_url);
        let payload = serde_json::json!({
            "model_id": job.session_id,
            "template_id": job.template_id,
            "config": {
                "epochs": job.config.epochs,
                "learning_rate": job.config.learning_rate,
                "batch_size": job.config.batch_size,
                "validation_split": job.config.validation_split,
            },
        });

        tracing::info!(session_id = %job.session_id, "Sending training request");
        let body = self
            .post_with_retries(&url, &payload)
            .await
            .map_err(|err| anyhow::anyhow!(err.to_string()))?;

        let response: TrainingResponse =
            serde_json::from_value(body).context("Malformed training response")?;

        Ok(TrainingReport {
            validation_accuracy: response.validation_accuracy,
            duration_seconds: response.training_time_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explanation_mentions_confidence() {
        let text = explanation_for(Correctness::Partial, 0.6);
        assert!(text.contains("60%"));

        let skipped = explanation_for(Correctness::Skipped, 0.0);
        assert!(skipped.contains("No answer"));
    }

    #[test]
    fn prediction_response_parses_wire_format() {
        let raw = serde_json::json!({
            "region_id": "r1",
            "predicted_correctness": "PARTIAL",
            "confidence": 0.72,
            "assigned_score": 2.5,
            "explanation": "Partial answer detected.",
            "needs_review": true,
            "inference_time_ms": 12.0
        });
        let parsed: PredictionResponse = serde_json::from_value(raw).expect("parse");
        assert_eq!(parsed.predicted_correctness, Correctness::Partial);
        assert_eq!(parsed.assigned_score, Some(2.5));
    }
}
