//! Self-healing monitor.
//!
//! One pass runs four independent steps in order: staleness scan, failure
//! healing, queue depletion guard, retention. A failing step is recorded in
//! the report and the next step still runs. The pass ends by writing queue
//! depth and its own timestamp to the shared context.

pub mod detect;
pub mod report;

pub use detect::Finding;
pub use report::{HealthReport, MonitorStep};

use crate::config::MonitorConfig;
use crate::events::EventLog;
use crate::queue::QueueManager;
use chrono::{DateTime, Utc};
use postcrew_core::{
    AgentId, AgentStateDoc, AgentTask, PostingQueue, QueueStatus, SharedContext, TaskKind,
};
use postcrew_store::DocumentStore;
use serde_json::json;
use tracing::{info, warn};

pub struct HealthMonitor {
    store: DocumentStore,
    events: EventLog,
    config: MonitorConfig,
    emergency_batch_size: usize,
}

impl HealthMonitor {
    pub fn new(
        store: DocumentStore,
        events: EventLog,
        config: MonitorConfig,
        emergency_batch_size: usize,
    ) -> Self {
        Self { store, events, config, emergency_batch_size }
    }

    pub fn run_pass(&self) -> HealthReport {
        self.run_pass_at(Utc::now())
    }

    pub fn run_pass_at(&self, now: DateTime<Utc>) -> HealthReport {
        let mut report = HealthReport::new(now);

        if let Err(e) = self.scan_staleness(now, &mut report) {
            report.record_error(MonitorStep::Staleness, e);
        }
        if let Err(e) = self.heal_agents(now, &mut report) {
            report.record_error(MonitorStep::Healing, e);
        }
        if let Err(e) = self.heal_entries(now, &mut report) {
            report.record_error(MonitorStep::Healing, e);
        }
        if let Err(e) = self.guard_depletion(now, &mut report) {
            report.record_error(MonitorStep::Depletion, e);
        }
        if let Err(e) = self.purge_events(now, &mut report) {
            report.record_error(MonitorStep::Retention, e);
        }
        if let Err(e) = self.purge_temp_files(now, &mut report) {
            report.record_error(MonitorStep::Retention, e);
        }
        if let Err(e) = self.purge_tasks(now, &mut report) {
            report.record_error(MonitorStep::Retention, e);
        }
        if let Err(e) = self.write_context(now, &mut report) {
            report.record_error(MonitorStep::Context, e);
        }

        info!(
            healthy = report.is_healthy(),
            errors = report.errors.len(),
            "monitor pass finished"
        );
        report
    }

    fn scan_staleness(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        let doc: AgentStateDoc = self.store.load()?;
        for finding in detect::detect_stale(&doc, now, self.config.stale_after()) {
            match finding {
                Finding::Stale { agent, age } => {
                    warn!(%agent, hours = age.num_hours(), "agent stale");
                    report.stale.push((agent, age.num_hours()));
                }
                Finding::NeverRun { agent } => report.never_run.push(agent),
            }
        }
        Ok(())
    }

    fn heal_agents(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        let heal_after = self.config.heal_after();
        let healed = self.store.update(|doc: &mut AgentStateDoc| {
            let due = detect::detect_healable_agents(doc, now, heal_after);
            let mut healed = Vec::with_capacity(due.len());
            for agent in due {
                let reason = doc.record(agent).failure_reason;
                doc.heal(agent)?;
                healed.push((agent, reason));
            }
            Ok(healed)
        })?;

        for (agent, reason) in healed {
            self.events
                .info("agent_healed", json!({ "agent": agent, "previous_reason": reason }))
                .unwrap_or_else(|e| warn!("event log: {e}"));
            report.healed_agents.push(agent);
        }
        Ok(())
    }

    fn heal_entries(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        let queue = QueueManager::new(self.store.clone());
        let healed = queue.heal_failed_older_than(self.config.heal_after(), now)?;
        for id in &healed {
            self.events
                .info("entry_healed", json!({ "id": id }))
                .unwrap_or_else(|e| warn!("event log: {e}"));
        }
        report.healed_entries.extend(healed);
        Ok(())
    }

    fn guard_depletion(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        let queue: PostingQueue = self.store.load_or_default();
        let min_pending = self.config.min_pending;
        let batch = self.emergency_batch_size;

        // decided and written under the agent lock so two passes cannot
        // both raise the task
        let created = self.store.update(|agents: &mut AgentStateDoc| {
            let Some(pending) = detect::detect_depletion(&queue, agents, min_pending) else {
                return Ok(None);
            };
            let task = AgentTask::new(
                AgentId::HealthMonitor,
                AgentId::GENERATOR,
                TaskKind::EmergencyGenerate,
                format!("only {pending} pending entries (min {min_pending})"),
                now,
            )
            .with_count(batch);
            Ok(agents.create_task_once(task).map(|id| (id, pending)))
        })?;

        if let Some((id, pending)) = created {
            warn!(pending, "queue low, emergency generation requested");
            self.events
                .warn(
                    "emergency_task_created",
                    json!({ "task_id": id, "pending": pending, "count": batch }),
                )
                .unwrap_or_else(|e| warn!("event log: {e}"));
            report.emergency_task = Some(id);
        }
        Ok(())
    }

    fn purge_events(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        report.purged_events = self.events.purge_older_than(self.config.retention(), now)?;
        Ok(())
    }

    fn purge_temp_files(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        report.purged_temp_files = self
            .store
            .purge_temp_files_before(now - self.config.temp_file_max_age())?;
        Ok(())
    }

    fn purge_tasks(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        let cutoff = now - self.config.retention();
        let purged = self
            .store
            .update(|doc: &mut AgentStateDoc| Ok(doc.purge_consumed_before(cutoff)))?;
        report.purged_tasks = purged;
        if purged + report.purged_events + report.purged_temp_files > 0 {
            self.events
                .info(
                    "retention_purge",
                    json!({
                        "events": report.purged_events,
                        "tasks": purged,
                        "temp_files": report.purged_temp_files,
                    }),
                )
                .unwrap_or_else(|e| warn!("event log: {e}"));
        }
        Ok(())
    }

    fn write_context(&self, now: DateTime<Utc>, report: &mut HealthReport) -> postcrew_core::Result<()> {
        let queue: PostingQueue = self.store.load()?;
        report.queue = queue.count_by_status();
        let counts = report.queue.clone();
        self.store.update_or_recover(|ctx: &mut SharedContext| {
            for status in QueueStatus::ALL {
                ctx.set(format!("queue.{status}"), counts.get(&status).copied().unwrap_or(0));
            }
            ctx.set("monitor.last_pass", now.to_rfc3339());
            Ok(())
        })
    }
}
