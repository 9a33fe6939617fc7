//! Versioned layout of scoring regions per answer sheet design. Read-mostly:
//! registering a new version never touches a prior version, so sheets bound
//! to an old version stay scoreable against it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::error::Error;
use crate::model::template::{Region, RegionSpec, Template};

#[derive(Clone, Default)]
pub struct TemplateRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Template>>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new template at version 1.
    pub async fn register(
        &self,
        name: impl Into<String>,
        regions: Vec<RegionSpec>,
    ) -> Result<Template, Error> {
        validate_regions(&regions)?;
        let template = build_template(Uuid::new_v4().to_string(), name.into(), 1, regions);
        let mut templates = self.inner.write().await;
        templates.insert(template.id.clone(), vec![template.clone()]);
        tracing::info!(template_id = %template.id, "Registered template");
        Ok(template)
    }

    /// Appends a new version for an existing template. Prior versions are
    /// never edited in place.
    pub async fn register_version(
        &self,
        template_id: &str,
        regions: Vec<RegionSpec>,
    ) -> Result<Template, Error> {
        validate_regions(&regions)?;
        let mut templates = self.inner.write().await;
        let versions = templates.get_mut(template_id).ok_or_else(|| Error::TemplateNotFound {
            template_id: template_id.to_string(),
            version: 0,
        })?;
        let version = versions.len() as u32 + 1;
        let name = versions[0].name.clone();
        let template = build_template(template_id.to_string(), name, version, regions);
        versions.push(template.clone());
        tracing::info!(template_id, version, "Registered template version");
        Ok(template)
    }

    pub async fn get(&self, template_id: &str, version: u32) -> Result<Template, Error> {
        let templates = self.inner.read().await;
        templates
            .get(template_id)
            .and_then(|versions| versions.get(version.checked_sub(1)? as usize))
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound {
                template_id: template_id.to_string(),
                version,
            })
    }

    /// Regions of one template version, in reading order.
    pub async fn get_regions(&self, template_id: &str, version: u32) -> Result<Vec<Region>, Error> {
        Ok(self.get(template_id, version).await?.regions)
    }

    pub async fn latest_version(&self, template_id: &str) -> Result<u32, Error> {
        let templates = self.inner.read().await;
        templates.get(template_id).map(|versions| versions.len() as u32).ok_or_else(|| {
            Error::TemplateNotFound { template_id: template_id.to_string(), version: 0 }
        })
    }
}

fn build_template(id: String, name: String, version: u32, regions: Vec<RegionSpec>) -> Template {
    let mut regions: Vec<Region> = regions
        .into_iter()
        .map(|spec| Region {
            id: Uuid::new_v4().to_string(),
            label: spec.label,
            question_type: spec.question_type,
            points: spec.points,
            bbox: spec.bbox,
            order_index: spec.order_index,
            metadata: spec.metadata,
        })
        .collect();
    regions.sort_by_key(|region| region.order_index);
    Template { id, name, version, regions, created_at: primitive_now_utc() }
}

fn validate_regions(regions: &[RegionSpec]) -> Result<(), Error> {
    if regions.is_empty() {
        return Err(Error::InvalidPayload("a template version needs at least one region".into()));
    }

    let mut seen = std::collections::HashSet::new();
    for spec in regions {
        if !seen.insert(spec.order_index) {
            return Err(Error::InvalidPayload(format!(
                "duplicate region order index {}",
                spec.order_index
            )));
        }
        if !spec.bbox.is_normalized() {
            return Err(Error::InvalidPayload(format!(
                "region '{}' bounding box must be within [0, 1]",
                spec.label
            )));
        }
        if spec.points < 0.0 {
            return Err(Error::InvalidPayload(format!(
                "region '{}' point value must be non-negative",
                spec.label
            )));
        }
    }
    Ok(())
}
