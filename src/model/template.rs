use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use crate::model::types::QuestionType;

/// Sheet-relative fractional coordinates, each component in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn is_normalized(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|component| (0.0..=1.0).contains(component))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: String,
    pub label: String,
    pub question_type: QuestionType,
    pub points: f64,
    pub bbox: BoundingBox,
    pub order_index: u32,
    pub metadata: Option<serde_json::Value>,
}

/// Input shape for registering a region; the registry assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionSpec {
    pub label: String,
    pub question_type: QuestionType,
    pub points: f64,
    pub bbox: BoundingBox,
    pub order_index: u32,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub version: u32,
    pub regions: Vec<Region>,
    pub created_at: PrimitiveDateTime,
}
