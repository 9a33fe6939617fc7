//! In-memory sheet table. The core defines the record shape; durable storage
//! is an external collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Error;
use crate::model::sheet::Sheet;
use crate::model::types::SheetStatus;

#[derive(Clone, Default)]
pub struct SheetStore {
    inner: Arc<RwLock<HashMap<String, Sheet>>>,
}

impl SheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, sheet: Sheet) {
        self.inner.write().await.insert(sheet.id.clone(), sheet);
    }

    pub async fn get(&self, sheet_id: &str) -> Result<Sheet, Error> {
        self.inner
            .read()
            .await
            .get(sheet_id)
            .cloned()
            .ok_or_else(|| Error::SheetNotFound(sheet_id.to_string()))
    }

    pub async fn contains(&self, sheet_id: &str) -> bool {
        self.inner.read().await.contains_key(sheet_id)
    }

    /// Applies a mutation under the write lock and returns the updated sheet.
    /// The closure either fully applies or the record is left as it was.
    pub async fn update<F>(&self, sheet_id: &str, apply: F) -> Result<Sheet, Error>
    where
        F: FnOnce(&mut Sheet) -> Result<(), Error>,
    {
        let mut sheets = self.inner.write().await;
        let sheet =
            sheets.get_mut(sheet_id).ok_or_else(|| Error::SheetNotFound(sheet_id.to_string()))?;
        let mut candidate = sheet.clone();
        apply(&mut candidate)?;
        *sheet = candidate.clone();
        Ok(candidate)
    }

    pub async fn transition(&self, sheet_id: &str, next: SheetStatus) -> Result<Sheet, Error> {
        self.update(sheet_id, |sheet| sheet.transition(next)).await
    }

    pub async fn list_by_status(&self, status: SheetStatus) -> Vec<Sheet> {
        self.inner
            .read()
            .await
            .values()
            .filter(|sheet| sheet.status == status)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(id: &str) -> Sheet {
        Sheet::new(id, "template-1", 1, "student-1", format!("scans/{id}.png"))
    }

    #[tokio::test]
    async fn update_is_all_or_nothing() {
        let store = SheetStore::new();
        store.insert(sheet("s1")).await;

        let err = store
            .update("s1", |sheet| {
                sheet.aggregate_score = Some(10.0);
                sheet.transition(SheetStatus::Graded)
            })
            .await
            .expect_err("illegal transition");
        assert!(matches!(err, Error::InvalidTransition { .. }));

        // The failed mutation must not leak the partial score write.
        let unchanged = store.get("s1").await.expect("sheet");
        assert_eq!(unchanged.aggregate_score, None);
        assert_eq!(unchanged.status, SheetStatus::Uploaded);
    }

    #[tokio::test]
    async fn missing_sheet_is_not_found() {
        let store = SheetStore::new();
        assert!(matches!(store.get("nope").await, Err(Error::SheetNotFound(_))));
        assert!(matches!(
            store.transition("nope", SheetStatus::Processing).await,
            Err(Error::SheetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn lists_sheets_by_status() {
        let store = SheetStore::new();
        store.insert(sheet("s1")).await;
        store.insert(sheet("s2")).await;
        store.transition("s2", SheetStatus::Processing).await.expect("transition");

        let uploaded = store.list_by_status(SheetStatus::Uploaded).await;
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].id, "s1");
    }
}
