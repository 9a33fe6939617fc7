//! Invokes the scoring function per region and aggregates a score and a
//! confidence value for the sheet.

use std::sync::Arc;

use crate::model::sheet::{GradingResult, Sheet};
use crate::model::template::Region;
use crate::model::types::Correctness;
use crate::services::scoring::{ScoreError, ScoreRequest, Scorer};

#[derive(Debug, Clone)]
pub struct GradingOutcome {
    pub results: Vec<GradingResult>,
    pub aggregate_score: f64,
    pub aggregate_confidence: f64,
}

#[derive(Clone)]
pub struct GradingEngine {
    scorer: Arc<dyn Scorer>,
}

impl GradingEngine {
    pub fn new(scorer: Arc<dyn Scorer>) -> Self {
        Self { scorer }
    }

    /// Scores every region in reading order. The aggregate score is the sum
    /// of awarded points; the aggregate confidence is the minimum per-region
    /// confidence, so one uncertain answer cannot be masked by many easy
    /// ones. Recoverable per-region failures are folded in as incorrect with
    /// confidence 0; only a fatal ingest failure aborts the sheet.
    pub async fn grade(
        &self,
        sheet: &Sheet,
        regions: &[Region],
        model_id: &str,
    ) -> Result<GradingOutcome, ScoreError> {
        let mut results = Vec::with_capacity(regions.len());
        let mut aggregate_score = 0.0;
        let mut aggregate_confidence = 1.0f64;

        for region in regions {
            let request = ScoreRequest {
                model_id: model_id.to_string(),
                region_id: region.id.clone(),
                question_type: region.question_type,
                max_points: region.points,
                image_ref: sheet.image_ref.clone(),
                bbox: region.bbox,
            };

            let score = match self.scorer.score(request).await {
                Ok(score) => score,
                Err(ScoreError::Fatal(reason)) => {
                    metrics::counter!("region_scores_total", "status" => "fatal").increment(1);
                    return Err(ScoreError::Fatal(reason));
                }
                Err(ScoreError::Recoverable(reason)) => {
                    tracing::warn!(
                        sheet_id = %sheet.id,
                        region_id = %region.id,
                        error = %reason,
                        "Region scoring failed; recording as incorrect"
                    );
                    metrics::counter!("region_scores_total", "status" => "failed").increment(1);
                    crate::services::scoring::RegionScore {
                        correctness: Correctness::Incorrect,
                        confidence: 0.0,
                        awarded_points: 0.0,
                        explanation: format!("Scoring failed: {reason}"),
                    }
                }
            };

            let confidence = score.confidence.clamp(0.0, 1.0);
            aggregate_confidence = aggregate_confidence.min(confidence);
            aggregate_score += score.awarded_points;
            metrics::counter!("region_scores_total", "status" => "scored").increment(1);

            results.push(GradingResult {
                region_id: region.id.clone(),
                correctness: score.correctness,
                confidence,
                awarded_points: score.awarded_points,
                explanation: score.explanation,
            });
        }

        if results.is_empty() {
            aggregate_confidence = 0.0;
        }

        Ok(GradingOutcome { results, aggregate_score, aggregate_confidence })
    }
}
