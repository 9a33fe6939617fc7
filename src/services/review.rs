//! Maps aggregate confidence to a disposition and schedules human review.
//!
//! Thresholds are process-wide constants; changing them never reclassifies a
//! sheet that already carries a recorded decision.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use serde::Serialize;
use time::PrimitiveDateTime;
use tokio::sync::Mutex;

use crate::core::time::primitive_now_utc;
use crate::error::Error;
use crate::model::sheet::Sheet;
use crate::model::types::{Disposition, ReviewPriority, SheetStatus};
use crate::services::notify::Notifier;
use crate::store::SheetStore;

/// Confidence at or above this auto-approves the sheet.
pub const HIGH_CONFIDENCE: f64 = 0.95;
/// Confidence at or above this (but below HIGH) flags a quick review.
pub const MEDIUM_CONFIDENCE: f64 = 0.80;

/// Boundary values belong to the higher tier.
pub fn route(confidence: f64) -> Disposition {
    if confidence >= HIGH_CONFIDENCE {
        Disposition::AutoApprove
    } else if confidence >= MEDIUM_CONFIDENCE {
        Disposition::QuickReview
    } else {
        Disposition::DetailedReview
    }
}

pub fn priority_for(disposition: Disposition) -> ReviewPriority {
    match disposition {
        Disposition::AutoApprove => ReviewPriority::Low,
        Disposition::QuickReview => ReviewPriority::Medium,
        Disposition::DetailedReview => ReviewPriority::High,
    }
}

/// Derived queue entry: a (sheet, priority) pair, not a persisted identity.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub sheet_id: String,
    pub priority: ReviewPriority,
    pub enqueued_at: PrimitiveDateTime,
}

#[derive(Debug)]
struct HeapEntry {
    item: ReviewItem,
    seq: u64,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.item.priority == other.item.priority && self.seq == other.seq
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; FIFO within a priority tier.
        self.item
            .priority
            .cmp(&other.item.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<HeapEntry>,
    next_seq: u64,
}

#[derive(Clone, Default)]
pub struct ReviewRouter {
    queue: Arc<Mutex<QueueInner>>,
}

impl ReviewRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, sheet_id: impl Into<String>, priority: ReviewPriority) {
        let mut queue = self.queue.lock().await;
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.heap.push(HeapEntry {
            item: ReviewItem {
                sheet_id: sheet_id.into(),
                priority,
                enqueued_at: primitive_now_utc(),
            },
            seq,
        });
        metrics::counter!("review_items_total").increment(1);
    }

    /// Pops the highest-priority item for a human grader.
    pub async fn next_for_review(&self) -> Option<ReviewItem> {
        self.queue.lock().await.heap.pop().map(|entry| entry.item)
    }

    pub async fn pending(&self) -> usize {
        self.queue.lock().await.heap.len()
    }

    pub async fn is_queued(&self, sheet_id: &str) -> bool {
        self.queue.lock().await.heap.iter().any(|entry| entry.item.sheet_id == sheet_id)
    }

    /// A human reviewer confirms (or has edited) the grade: Graded -> Reviewed.
    pub async fn resolve(
        &self,
        store: &SheetStore,
        notifier: &dyn Notifier,
        sheet_id: &str,
        reviewer: &str,
    ) -> Result<Sheet, Error> {
        let sheet = store
            .update(sheet_id, |sheet| {
                sheet.transition(SheetStatus::Reviewed)?;
                sheet.reviewed_by = Some(reviewer.to_string());
                sheet.reviewed_at = Some(primitive_now_utc());
                Ok(())
            })
            .await?;

        self.remove(sheet_id).await;
        notifier.sheet_reviewed(&sheet).await;
        tracing::info!(sheet_id, reviewer, "Sheet reviewed");
        Ok(sheet)
    }

    /// Low-priority items are eligible for batch auto-approval rather than
    /// being blocked on human action.
    pub async fn approve_low_priority_batch(
        &self,
        store: &SheetStore,
        notifier: &dyn Notifier,
    ) -> Result<Vec<Sheet>, Error> {
        let low_items = {
            let mut queue = self.queue.lock().await;
            let entries = std::mem::take(&mut queue.heap).into_vec();
            let (low, rest): (Vec<_>, Vec<_>) = entries
                .into_iter()
                .partition(|entry| entry.item.priority == ReviewPriority::Low);
            queue.heap = rest.into_iter().collect();
            low
        };

        let mut approved = Vec::with_capacity(low_items.len());
        for entry in low_items {
            let sheet = store
                .update(&entry.item.sheet_id, |sheet| {
                    sheet.transition(SheetStatus::Reviewed)?;
                    sheet.reviewed_by = Some("batch-auto-approval".to_string());
                    sheet.reviewed_at = Some(primitive_now_utc());
                    Ok(())
                })
                .await?;
            notifier.sheet_reviewed(&sheet).await;
            approved.push(sheet);
        }

        if !approved.is_empty() {
            tracing::info!(count = approved.len(), "Batch-approved low-priority sheets");
        }
        Ok(approved)
    }

    async fn remove(&self, sheet_id: &str) {
        let mut queue = self.queue.lock().await;
        let entries = std::mem::take(&mut queue.heap).into_vec();
        queue.heap = entries
            .into_iter()
            .filter(|entry| entry.item.sheet_id != sheet_id)
            .collect();
    }
}
