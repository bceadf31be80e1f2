//! Agent state and task relay against the stored agent document.
//!
//! The agent document is the one document an invocation cannot do without,
//! so every operation here uses the strict locked update: a corrupt file is
//! reported as `DocumentUnavailable` and left on disk for a human.

use chrono::{DateTime, Utc};
use postcrew_core::{
    AgentId, AgentStateDoc, AgentStatus, AgentTask, Result, Staleness, TaskKind,
};
use postcrew_store::DocumentStore;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct AgentRelay {
    store: DocumentStore,
}

impl AgentRelay {
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    pub fn snapshot(&self) -> Result<AgentStateDoc> {
        self.store.load()
    }

    pub fn mark_running(&self, agent: AgentId) -> Result<()> {
        let now = Utc::now();
        self.store.update(|doc: &mut AgentStateDoc| doc.mark_running(agent, now))?;
        info!(%agent, "agent running");
        Ok(())
    }

    /// `mark_running`, healing a failed agent first when `force` is set.
    /// Both happen in the same write.
    pub fn start(&self, agent: AgentId, force: bool) -> Result<()> {
        let now = Utc::now();
        self.store.update(|doc: &mut AgentStateDoc| {
            if force && doc.status(agent) == AgentStatus::Failed {
                doc.heal(agent)?;
                info!(%agent, "failed agent healed by --force");
            }
            doc.mark_running(agent, now)
        })?;
        info!(%agent, "agent running");
        Ok(())
    }

    pub fn mark_completed(&self, agent: AgentId) -> Result<()> {
        let now = Utc::now();
        self.store.update(|doc: &mut AgentStateDoc| doc.mark_completed(agent, now))?;
        info!(%agent, "agent completed");
        Ok(())
    }

    pub fn mark_failed(&self, agent: AgentId, reason: &str) -> Result<()> {
        let now = Utc::now();
        self.store
            .update(|doc: &mut AgentStateDoc| doc.mark_failed(agent, reason, now))?;
        info!(%agent, reason, "agent failed");
        Ok(())
    }

    pub fn create_task(
        &self,
        from: AgentId,
        to: AgentId,
        kind: TaskKind,
        details: &str,
        count: Option<usize>,
    ) -> Result<Uuid> {
        let task = build_task(from, to, kind, details, count, Utc::now());
        let id = self.store.update(|doc: &mut AgentStateDoc| Ok(doc.create_task(task)))?;
        info!(%from, %to, %kind, %id, "task created");
        Ok(id)
    }

    /// Skipped (returns `None`) when `to` already holds a pending task of
    /// the same kind.
    pub fn create_task_once(
        &self,
        from: AgentId,
        to: AgentId,
        kind: TaskKind,
        details: &str,
        count: Option<usize>,
    ) -> Result<Option<Uuid>> {
        let task = build_task(from, to, kind, details, count, Utc::now());
        let id = self
            .store
            .update(|doc: &mut AgentStateDoc| Ok(doc.create_task_once(task)))?;
        match id {
            Some(id) => info!(%from, %to, %kind, %id, "task created"),
            None => debug!(%to, %kind, "task already pending, not duplicated"),
        }
        Ok(id)
    }

    /// Drain the inbox. The returned tasks are already marked consumed on disk.
    pub fn consume_tasks(&self, agent: AgentId) -> Result<Vec<AgentTask>> {
        let now = Utc::now();
        let tasks = self
            .store
            .update(|doc: &mut AgentStateDoc| Ok(doc.consume_tasks(agent, now)))?;
        if !tasks.is_empty() {
            info!(%agent, count = tasks.len(), "tasks consumed");
        }
        Ok(tasks)
    }

    pub fn staleness(&self, agent: AgentId, now: DateTime<Utc>) -> Result<Staleness> {
        Ok(self.snapshot()?.staleness(agent, now))
    }
}

fn build_task(
    from: AgentId,
    to: AgentId,
    kind: TaskKind,
    details: &str,
    count: Option<usize>,
    now: DateTime<Utc>,
) -> AgentTask {
    let task = AgentTask::new(from, to, kind, details, now);
    match count {
        Some(n) => task.with_count(n),
        None => task,
    }
}
