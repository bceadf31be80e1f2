//! One agent invocation: mark running, drain the inbox, do the role's work,
//! record the outcome and hand off follow-up tasks.

use crate::config::{PlanConfig, PostcrewConfig};
use crate::events::EventLog;
use crate::gate::{GateReport, QualityGate};
use crate::generator::{CommandGenerator, ContentGenerator};
use crate::monitor::{HealthMonitor, HealthReport};
use crate::notify::FallbackNotifier;
use crate::publish::{Packager, PublishReport};
use crate::queue::{self, QueueManager};
use crate::relay::AgentRelay;
use crate::stock::Stock;
use chrono::Utc;
use postcrew_core::{AgentId, AgentStatus, AgentTask, Error, Result, SharedContext, TaskKind};
use postcrew_store::DocumentStore;
use serde_json::json;
use tracing::{error, info, warn};

/// What one successful invocation did.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub tasks: Vec<AgentTask>,
    pub appended: Vec<u64>,
    pub generation_failures: Vec<String>,
    pub gate: Option<GateReport>,
    pub publish: Option<PublishReport>,
    pub health: Option<HealthReport>,
    pub handoffs: Vec<(AgentId, TaskKind)>,
}

pub struct Runner {
    config: PostcrewConfig,
    store: DocumentStore,
    events: EventLog,
    relay: AgentRelay,
    queue: QueueManager,
    generator: Box<dyn ContentGenerator>,
    notifier: FallbackNotifier,
}

impl Runner {
    pub fn new(
        config: PostcrewConfig,
        generator: Box<dyn ContentGenerator>,
        notifier: FallbackNotifier,
    ) -> Result<Self> {
        let store = DocumentStore::open(&config.paths.data_dir)?;
        Ok(Self {
            events: EventLog::new(config.events_path()),
            relay: AgentRelay::new(store.clone()),
            queue: QueueManager::new(store.clone()),
            store,
            config,
            generator,
            notifier,
        })
    }

    /// Runner wired to the configured generator command and Slack webhook.
    pub fn from_config(config: PostcrewConfig) -> Result<Self> {
        let generator = Box::new(CommandGenerator::new(&config.generator));
        let notifier = FallbackNotifier::from_config(&config.notify, config.fallback_file());
        Self::new(config, generator, notifier)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Run `agent` once. The agent ends `completed` on `Ok` and `failed` on
    /// `Err`, except when it could not even be marked running.
    pub async fn invoke(&self, agent: AgentId, force: bool) -> Result<RunSummary> {
        self.relay.start(agent, force)?;
        let started = Utc::now();

        let outcome = match self.relay.consume_tasks(agent) {
            Ok(tasks) => self.act(agent, tasks).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(summary) => {
                self.relay.mark_completed(agent)?;
                for (to, kind) in &summary.handoffs {
                    self.events
                        .info("task_handoff", json!({ "from": agent, "to": to, "type": kind }))
                        .unwrap_or_else(|e| warn!("event log: {e}"));
                }
                self.record_context(agent, AgentStatus::Completed);
                info!(
                    %agent,
                    elapsed_ms = (Utc::now() - started).num_milliseconds(),
                    "invocation completed"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(%agent, "invocation failed: {e}");
                let reason = e.to_string();
                if let Err(mark) = self.relay.mark_failed(agent, &reason) {
                    error!(%agent, "could not record failure: {mark}");
                }
                self.events
                    .error("agent_failed", json!({ "agent": agent, "reason": reason }))
                    .unwrap_or_else(|e| warn!("event log: {e}"));
                self.record_context(agent, AgentStatus::Failed);
                self.notifier
                    .notify(&format!("[postcrew] {agent} failed: {reason}"))
                    .await;
                Err(e)
            }
        }
    }

    async fn act(&self, agent: AgentId, tasks: Vec<AgentTask>) -> Result<RunSummary> {
        let mut summary = match agent {
            AgentId::ContentCreator => self.create_content(&tasks).await?,
            AgentId::Reviewer => self.review()?,
            AgentId::Publisher => self.prepare_publish()?,
            AgentId::HealthMonitor => self.monitor().await,
        };
        summary.tasks = tasks;
        Ok(summary)
    }

    async fn create_content(&self, tasks: &[AgentTask]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let n = batch_size_for(tasks, &self.config.plan);
        let catalog = &self.config.paths.stock_catalog;
        let stock = match Stock::load(catalog) {
            Ok(stock) => stock,
            Err(e) => {
                warn!(path = %catalog.display(), "stock catalog unusable, planning without it: {e}");
                self.events
                    .warn(
                        "stock_unavailable",
                        json!({ "path": catalog.display().to_string(), "error": e.to_string() }),
                    )
                    .unwrap_or_else(|e| warn!("event log: {e}"));
                Stock::default()
            }
        };
        let plan = queue::plan_batch(
            &self.config.plan.targets.ratios(),
            &stock,
            n,
            self.config.plan.soft_fraction,
        );
        info!(slots = plan.len(), "generation plan built");

        let mut entries = Vec::with_capacity(plan.len());
        for slot in plan {
            match self.generator.generate(slot).await {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(category = %slot.category, "{e}");
                    self.events
                        .warn(
                            "generation_failed",
                            json!({ "category": slot.category, "cta_type": slot.cta_type, "error": e.to_string() }),
                        )
                        .unwrap_or_else(|e| warn!("event log: {e}"));
                    summary.generation_failures.push(e.to_string());
                }
            }
        }
        if entries.is_empty() && n > 0 {
            return Err(Error::generation(format!(
                "all {n} generation attempts failed"
            )));
        }

        summary.appended = self.queue.append_many(entries)?;
        if !summary.appended.is_empty() {
            self.relay.create_task(
                AgentId::ContentCreator,
                AgentId::Reviewer,
                TaskKind::ReviewQueue,
                &format!("{} new entries", summary.appended.len()),
                None,
            )?;
            summary.handoffs.push((AgentId::Reviewer, TaskKind::ReviewQueue));
        }
        Ok(summary)
    }

    fn review(&self) -> Result<RunSummary> {
        let gate = QualityGate::new(self.config.gate.clone(), &self.config.paths.assets_root);
        let report = gate.review(&self.store)?;

        for failure in report.failures() {
            if let Error::ValidationFailure { id, reasons } = &failure {
                self.events
                    .warn("gate_rejected", json!({ "id": id, "reasons": reasons }))
                    .unwrap_or_else(|e| warn!("event log: {e}"));
            }
        }

        let mut summary = RunSummary::default();
        if !report.verified.is_empty() {
            let created = self.relay.create_task_once(
                AgentId::Reviewer,
                AgentId::Publisher,
                TaskKind::PreparePublish,
                &format!("{} entries verified", report.verified.len()),
                None,
            )?;
            if created.is_some() {
                summary.handoffs.push((AgentId::Publisher, TaskKind::PreparePublish));
            }
        }
        summary.gate = Some(report);
        Ok(summary)
    }

    fn prepare_publish(&self) -> Result<RunSummary> {
        let packager = Packager::new(
            self.config.outbox_dir(),
            self.config.paths.assets_root.clone(),
            self.config.gate.slide_extensions.clone(),
            self.config.gate.min_slides,
        );
        let report = packager.publish(&self.queue, self.config.publish.per_run)?;
        for (id, reason) in &report.failed {
            self.events
                .warn("entry_failed", json!({ "id": id, "reason": reason }))
                .unwrap_or_else(|e| warn!("event log: {e}"));
        }
        Ok(RunSummary { publish: Some(report), ..RunSummary::default() })
    }

    async fn monitor(&self) -> RunSummary {
        let monitor = HealthMonitor::new(
            self.store.clone(),
            self.events.clone(),
            self.config.monitor.clone(),
            self.config.plan.emergency_batch_size,
        );
        let report = monitor.run_pass();
        self.notifier.notify(&report.render()).await;
        RunSummary { health: Some(report), ..RunSummary::default() }
    }

    fn record_context(&self, agent: AgentId, status: AgentStatus) {
        let now = Utc::now();
        let written = self.store.update_or_recover(|ctx: &mut SharedContext| {
            ctx.set(format!("last_run.{agent}"), now.to_rfc3339());
            ctx.set(format!("last_status.{agent}"), status);
            Ok(())
        });
        if let Err(e) = written {
            warn!("shared context not updated: {e}");
        }
    }
}

/// Creator batch size from the drained inbox.
pub fn batch_size_for(tasks: &[AgentTask], plan: &PlanConfig) -> usize {
    let requested = tasks.iter().filter_map(|t| t.count).max();
    let emergency = tasks.iter().any(|t| t.kind == TaskKind::EmergencyGenerate);
    match (requested, emergency) {
        (Some(n), true) => n.max(plan.emergency_batch_size),
        (Some(n), false) => n,
        (None, true) => plan.emergency_batch_size,
        (None, false) => plan.batch_size,
    }
}
