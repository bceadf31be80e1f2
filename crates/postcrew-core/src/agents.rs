//! Agent state document: run status per agent and the task relay inboxes.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::types::{AgentId, AgentStatus, AgentTask, TaskKind, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Inbox: tasks addressed to this agent, oldest first.
    #[serde(default)]
    pub pending_tasks: Vec<AgentTask>,
}

impl AgentRecord {
    pub fn has_pending(&self, kind: Option<TaskKind>) -> bool {
        self.pending_tasks
            .iter()
            .any(|t| t.is_pending() && kind.map_or(true, |k| t.kind == k))
    }
}

/// How long ago an agent last ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Staleness {
    /// No recorded run at all. Not the same thing as stale.
    NeverRun,
    Since(Duration),
}

impl Staleness {
    pub fn exceeds(&self, threshold: Duration) -> bool {
        match self {
            Self::NeverRun => false,
            Self::Since(age) => *age > threshold,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentStateDoc {
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub agents: BTreeMap<AgentId, AgentRecord>,
}

impl Document for AgentStateDoc {
    const NAME: &'static str = "agents";

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = Some(now);
    }
}

impl AgentStateDoc {
    /// Snapshot of an agent's record; agents never seen before are `pending`.
    pub fn record(&self, agent: AgentId) -> AgentRecord {
        self.agents.get(&agent).cloned().unwrap_or_default()
    }

    pub fn record_mut(&mut self, agent: AgentId) -> &mut AgentRecord {
        self.agents.entry(agent).or_default()
    }

    pub fn status(&self, agent: AgentId) -> AgentStatus {
        self.agents.get(&agent).map(|r| r.status).unwrap_or_default()
    }

    fn set_status(&mut self, agent: AgentId, to: AgentStatus) -> Result<&mut AgentRecord> {
        let record = self.record_mut(agent);
        let from = record.status;
        if !from.can_transition(to) {
            return Err(Error::InvalidAgentTransition { agent, from, to });
        }
        record.status = to;
        Ok(record)
    }

    pub fn mark_running(&mut self, agent: AgentId, now: DateTime<Utc>) -> Result<()> {
        let record = self.set_status(agent, AgentStatus::Running)?;
        record.last_run = Some(now);
        record.failure_reason = None;
        Ok(())
    }

    pub fn mark_completed(&mut self, agent: AgentId, now: DateTime<Utc>) -> Result<()> {
        let record = self.set_status(agent, AgentStatus::Completed)?;
        record.last_run = Some(now);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        agent: AgentId,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let record = self.set_status(agent, AgentStatus::Failed)?;
        record.last_run = Some(now);
        record.failure_reason = Some(reason.into());
        Ok(())
    }

    /// failed → pending. `lastRun` is kept so staleness stays truthful.
    pub fn heal(&mut self, agent: AgentId) -> Result<()> {
        let record = self.set_status(agent, AgentStatus::Pending)?;
        record.failure_reason = None;
        Ok(())
    }

    /// Append a task to the target's inbox. Existing tasks are never touched.
    pub fn create_task(&mut self, task: AgentTask) -> Uuid {
        let id = task.id;
        self.record_mut(task.to).pending_tasks.push(task);
        id
    }

    /// Like `create_task`, but skipped when the target already holds a
    /// pending task of the same kind.
    pub fn create_task_once(&mut self, task: AgentTask) -> Option<Uuid> {
        if self.record(task.to).has_pending(Some(task.kind)) {
            return None;
        }
        Some(self.create_task(task))
    }

    pub fn has_pending_task(&self, agent: AgentId, kind: Option<TaskKind>) -> bool {
        self.agents
            .get(&agent)
            .is_some_and(|r| r.has_pending(kind))
    }

    /// Return every pending task for `agent` and mark them consumed in the
    /// same mutation. Delivered at most once.
    pub fn consume_tasks(&mut self, agent: AgentId, now: DateTime<Utc>) -> Vec<AgentTask> {
        let Some(record) = self.agents.get_mut(&agent) else {
            return Vec::new();
        };
        let mut delivered = Vec::new();
        for task in record.pending_tasks.iter_mut().filter(|t| t.is_pending()) {
            task.status = TaskStatus::Consumed;
            task.consumed_at = Some(now);
            delivered.push(task.clone());
        }
        delivered
    }

    pub fn staleness(&self, agent: AgentId, now: DateTime<Utc>) -> Staleness {
        match self.agents.get(&agent).and_then(|r| r.last_run) {
            Some(last) => Staleness::Since(now - last),
            None => Staleness::NeverRun,
        }
    }

    /// Drop consumed tasks that were consumed (or created, if the consume
    /// time is missing) before `cutoff`. Returns how many were dropped.
    pub fn purge_consumed_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let mut purged = 0;
        for record in self.agents.values_mut() {
            let before = record.pending_tasks.len();
            record.pending_tasks.retain(|t| {
                t.status == TaskStatus::Pending || t.consumed_at.unwrap_or(t.created) >= cutoff
            });
            purged += before - record.pending_tasks.len();
        }
        purged
    }
}
