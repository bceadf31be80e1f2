//! Health report produced by one monitor pass.

use chrono::{DateTime, Utc};
use postcrew_core::{AgentId, QueueStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStep {
    Staleness,
    Healing,
    Depletion,
    Retention,
    Context,
}

impl fmt::Display for MonitorStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Staleness => "staleness",
            Self::Healing => "healing",
            Self::Depletion => "depletion",
            Self::Retention => "retention",
            Self::Context => "context",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub at: DateTime<Utc>,
    /// Agents past the staleness threshold, with hours since last run.
    pub stale: Vec<(AgentId, i64)>,
    pub never_run: Vec<AgentId>,
    pub healed_agents: Vec<AgentId>,
    pub healed_entries: Vec<u64>,
    pub emergency_task: Option<Uuid>,
    pub queue: BTreeMap<QueueStatus, usize>,
    pub purged_events: usize,
    pub purged_tasks: usize,
    pub purged_temp_files: usize,
    pub errors: Vec<(MonitorStep, String)>,
}

impl HealthReport {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            stale: Vec::new(),
            never_run: Vec::new(),
            healed_agents: Vec::new(),
            healed_entries: Vec::new(),
            emergency_task: None,
            queue: BTreeMap::new(),
            purged_events: 0,
            purged_tasks: 0,
            purged_temp_files: 0,
            errors: Vec::new(),
        }
    }

    pub fn record_error(&mut self, step: MonitorStep, error: impl fmt::Display) {
        tracing::error!(%step, "monitor step failed: {error}");
        self.errors.push((step, error.to_string()));
    }

    /// Nothing stale, nothing needed healing, no step errored.
    pub fn is_healthy(&self) -> bool {
        self.stale.is_empty()
            && self.healed_agents.is_empty()
            && self.healed_entries.is_empty()
            && self.emergency_task.is_none()
            && self.errors.is_empty()
    }

    /// Plain text for the notification channel.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let verdict = if self.is_healthy() { "OK" } else { "ATTENTION" };
        out.push_str(&format!(
            "[postcrew health] {verdict} at {}\n",
            self.at.format("%Y-%m-%d %H:%M UTC")
        ));

        let queue: Vec<String> = self.queue.iter().map(|(s, n)| format!("{s}={n}")).collect();
        if !queue.is_empty() {
            out.push_str(&format!("queue: {}\n", queue.join(" ")));
        }
        for (agent, hours) in &self.stale {
            out.push_str(&format!("stale: {agent} last ran {hours}h ago\n"));
        }
        if !self.never_run.is_empty() {
            let names: Vec<&str> = self.never_run.iter().map(|a| a.as_str()).collect();
            out.push_str(&format!("never run: {}\n", names.join(", ")));
        }
        for agent in &self.healed_agents {
            out.push_str(&format!("healed agent: {agent} (failed -> pending)\n"));
        }
        if !self.healed_entries.is_empty() {
            let ids: Vec<String> = self.healed_entries.iter().map(|i| i.to_string()).collect();
            out.push_str(&format!("healed entries: {}\n", ids.join(", ")));
        }
        if let Some(id) = self.emergency_task {
            out.push_str(&format!("emergency generation requested (task {id})\n"));
        }
        if self.purged_events + self.purged_tasks + self.purged_temp_files > 0 {
            out.push_str(&format!(
                "retention: {} events, {} tasks, {} temp files purged\n",
                self.purged_events, self.purged_tasks, self.purged_temp_files
            ));
        }
        for (step, err) in &self.errors {
            out.push_str(&format!("error in {step}: {err}\n"));
        }
        out
    }
}
