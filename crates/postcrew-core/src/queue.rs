//! Posting queue document and its lifecycle operations.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::types::{NewEntry, QueueEntry, QueueStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingQueue {
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// Next id to hand out. Kept separately from `entries` so ids are never
    /// reused even if old entries are removed by hand.
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub entries: Vec<QueueEntry>,
}

impl Document for PostingQueue {
    const NAME: &'static str = "queue";

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = Some(now);
    }
}

impl PostingQueue {
    fn allocate_id(&mut self) -> u64 {
        let after_entries = self.entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let id = self.next_id.max(after_entries).max(1);
        self.next_id = id + 1;
        id
    }

    /// Append a freshly generated entry in `pending`. Returns the assigned id.
    pub fn append(&mut self, new: NewEntry, now: DateTime<Utc>) -> u64 {
        let id = self.allocate_id();
        self.entries.push(QueueEntry {
            id,
            content_id: new.content_id,
            category: new.category,
            cta_type: new.cta_type,
            caption: new.caption,
            hashtags: new.hashtags,
            slide_dir: new.slide_dir,
            status: QueueStatus::Pending,
            verified: false,
            created_at: Some(now),
            posted_at: None,
            failed_at: None,
            failure_reason: None,
            validation_errors: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: u64) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Move an entry along an allowed edge. Illegal edges leave the entry
    /// untouched and return `InvalidTransition`.
    pub fn transition(&mut self, id: u64, to: QueueStatus, now: DateTime<Utc>) -> Result<()> {
        self.apply_transition(id, to, None, now)
    }

    /// Move an entry to `failed`, recording why.
    pub fn fail(&mut self, id: u64, reason: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.apply_transition(id, QueueStatus::Failed, Some(reason.into()), now)
    }

    fn apply_transition(
        &mut self,
        id: u64,
        to: QueueStatus,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = self.get_mut(id).ok_or(Error::EntryNotFound(id))?;
        let from = entry.status;
        if !from.can_transition(to) {
            return Err(Error::InvalidTransition { id, from, to });
        }

        entry.status = to;
        match to {
            QueueStatus::Posted => entry.posted_at = Some(now),
            QueueStatus::Failed => {
                entry.failed_at = Some(now);
                entry.failure_reason = reason;
            }
            QueueStatus::Pending => {
                // failed -> pending: the gate has to look at it again
                entry.failed_at = None;
                entry.failure_reason = None;
                entry.verified = false;
                entry.validation_errors.clear();
            }
            QueueStatus::Ready => {}
        }
        Ok(())
    }

    /// Count of entries per status. Every status is present, zero included.
    pub fn count_by_status(&self) -> BTreeMap<QueueStatus, usize> {
        let mut counts: BTreeMap<QueueStatus, usize> =
            QueueStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for entry in &self.entries {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn count(&self, status: QueueStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// Verified pending entries, oldest id first.
    pub fn eligible_for_publish(&self) -> Vec<&QueueEntry> {
        let mut eligible: Vec<&QueueEntry> = self
            .entries
            .iter()
            .filter(|e| e.status == QueueStatus::Pending && e.verified)
            .collect();
        eligible.sort_by_key(|e| e.id);
        eligible
    }
}
