//! Posting queue manager: lifecycle operations against the stored queue.

use crate::plan::{self, PlanSlot};
use crate::stock::Stock;
use chrono::{DateTime, Utc};
use postcrew_core::{
    Category, NewEntry, PostingQueue, QueueEntry, QueueStatus, Result,
};
use postcrew_store::DocumentStore;
use std::collections::BTreeMap;
use tracing::info;

/// Every mutation is a locked read-modify-write. A corrupt queue document is
/// moved aside and replaced with an empty one.
#[derive(Clone, Debug)]
pub struct QueueManager {
    store: DocumentStore,
}

impl QueueManager {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> Result<PostingQueue> {
        self.store.load()
    }

    pub fn append(&self, entry: NewEntry) -> Result<u64> {
        let now = Utc::now();
        let id = self.store.update_or_recover(|q: &mut PostingQueue| Ok(q.append(entry, now)))?;
        info!(id, "queue entry appended");
        Ok(id)
    }

    pub fn append_many(&self, entries: Vec<NewEntry>) -> Result<Vec<u64>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let now = Utc::now();
        let ids = self.store.update_or_recover(|q: &mut PostingQueue| {
            Ok(entries.into_iter().map(|e| q.append(e, now)).collect::<Vec<_>>())
        })?;
        info!(count = ids.len(), "queue entries appended");
        Ok(ids)
    }

    pub fn transition(&self, id: u64, to: QueueStatus) -> Result<()> {
        let now = Utc::now();
        self.store
            .update_or_recover(|q: &mut PostingQueue| q.transition(id, to, now))?;
        info!(id, %to, "queue entry moved");
        Ok(())
    }

    pub fn fail(&self, id: u64, reason: &str) -> Result<()> {
        let now = Utc::now();
        self.store
            .update_or_recover(|q: &mut PostingQueue| q.fail(id, reason, now))?;
        info!(id, reason, "queue entry failed");
        Ok(())
    }

    /// External confirmation that a human uploaded the post: ready → posted.
    pub fn confirm_posted(&self, id: u64) -> Result<()> {
        self.transition(id, QueueStatus::Posted)
    }

    /// failed → pending, by hand.
    pub fn retry(&self, id: u64) -> Result<()> {
        self.transition(id, QueueStatus::Pending)
    }

    pub fn count_by_status(&self) -> Result<BTreeMap<QueueStatus, usize>> {
        Ok(self.snapshot()?.count_by_status())
    }

    /// Verified pending entries, oldest first.
    pub fn eligible_for_publish(&self) -> Result<Vec<QueueEntry>> {
        Ok(self
            .snapshot()?
            .eligible_for_publish()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Failed entries whose `failed_at` is older than `threshold` go back to
    /// pending. Returns the healed ids.
    pub fn heal_failed_older_than(
        &self,
        threshold: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<u64>> {
        self.store.update_or_recover(|q: &mut PostingQueue| {
            let due: Vec<u64> = q
                .entries
                .iter()
                .filter(|e| e.status == QueueStatus::Failed)
                .filter(|e| e.failed_at.map_or(true, |at| now - at > threshold))
                .map(|e| e.id)
                .collect();
            for id in &due {
                q.transition(*id, QueueStatus::Pending, now)?;
            }
            Ok(due)
        })
    }
}

/// Mix deficit and plan in one step.
pub fn plan_batch(
    targets: &[(Category, f64)],
    stock: &Stock,
    n: usize,
    soft_fraction: f64,
) -> Vec<PlanSlot> {
    let deficits = plan::mix_deficit(targets, stock);
    plan::build_generation_plan(&deficits, n, soft_fraction)
}
