use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::core::time::primitive_now_utc;
use crate::error::Error;
use crate::model::types::TrainingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    pub epochs: u32,
    pub learning_rate: f64,
    pub batch_size: u32,
    pub validation_split: f64,
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.epochs == 0 {
            return Err(Error::InvalidPayload("epochs must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidPayload("batchSize must be positive".to_string()));
        }
        if self.learning_rate <= 0.0 {
            return Err(Error::InvalidPayload("learningRate must be positive".to_string()));
        }
        if self.validation_split <= 0.0 || self.validation_split >= 1.0 {
            return Err(Error::InvalidPayload(
                "validationSplit must be strictly between 0 and 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One long-running model-training run, keyed by (template version, teacher).
/// Concurrent sessions for the same pair are allowed; each runs as an
/// independent job.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSession {
    pub id: String,
    pub template_id: String,
    pub teacher_id: String,
    pub config: TrainingConfig,
    pub status: TrainingStatus,
    pub validation_accuracy: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub created_at: PrimitiveDateTime,
    pub updated_at: PrimitiveDateTime,
}

impl TrainingSession {
    pub fn new(
        id: impl Into<String>,
        template_id: impl Into<String>,
        teacher_id: impl Into<String>,
        config: TrainingConfig,
    ) -> Self {
        let now = primitive_now_utc();
        Self {
            id: id.into(),
            template_id: template_id.into(),
            teacher_id: teacher_id.into(),
            config,
            status: TrainingStatus::Pending,
            validation_accuracy: None,
            duration_seconds: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TrainingConfig {
        TrainingConfig { epochs: 20, learning_rate: 0.001, batch_size: 32, validation_split: 0.2 }
    }

    #[test]
    fn accepts_sane_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_zero_epochs() {
        let bad = TrainingConfig { epochs: 0, ..config() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_split() {
        for split in [0.0, 1.0, 1.5, -0.2] {
            let bad = TrainingConfig { validation_split: split, ..config() };
            assert!(bad.validate().is_err(), "split {split} must be rejected");
        }
    }

    #[test]
    fn rejects_non_positive_learning_rate() {
        let bad = TrainingConfig { learning_rate: 0.0, ..config() };
        assert!(bad.validate().is_err());
    }
}
