//! Read-only status view for the CLI.

use chrono::{DateTime, Utc};
use postcrew_core::{
    AgentId, AgentStateDoc, AgentStatus, PostingQueue, QueueStatus, SharedContext,
};
use postcrew_store::DocumentStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Serialize)]
pub struct AgentRow {
    pub agent: AgentId,
    pub status: AgentStatus,
    pub last_run: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub pending_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusView {
    pub agents: Vec<AgentRow>,
    pub queue: BTreeMap<QueueStatus, usize>,
    pub eligible_for_publish: usize,
    pub context: BTreeMap<String, String>,
}

impl StatusView {
    /// Unreadable documents show up as empty rather than aborting.
    pub fn collect(store: &DocumentStore) -> Self {
        let agents: AgentStateDoc = store.load_or_default();
        let queue: PostingQueue = store.load_or_default();
        let context: SharedContext = store.load_or_default();

        let rows = AgentId::ALL
            .into_iter()
            .map(|agent| {
                let record = agents.record(agent);
                AgentRow {
                    agent,
                    status: record.status,
                    last_run: record.last_run,
                    pending_tasks: record.pending_tasks.iter().filter(|t| t.is_pending()).count(),
                    failure_reason: record.failure_reason,
                }
            })
            .collect();

        Self {
            agents: rows,
            queue: queue.count_by_status(),
            eligible_for_publish: queue.eligible_for_publish().len(),
            context: context.0,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<16} {:<10} {:<26} {}", "AGENT", "STATUS", "LAST RUN", "INBOX");
        for row in &self.agents {
            let last = row
                .last_run
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "never".into());
            let _ = writeln!(
                out,
                "{:<16} {:<10} {:<26} {}",
                row.agent.as_str(),
                row.status.to_string(),
                last,
                row.pending_tasks
            );
            if let Some(reason) = &row.failure_reason {
                let _ = writeln!(out, "  reason: {reason}");
            }
        }
        let counts: Vec<String> = self.queue.iter().map(|(s, n)| format!("{s}={n}")).collect();
        let _ = writeln!(out, "\nqueue: {}", counts.join(" "));
        let _ = writeln!(out, "ready to package: {}", self.eligible_for_publish);
        if let Some(pass) = self.context.get("monitor.last_pass") {
            let _ = writeln!(out, "last monitor pass: {pass}");
        }
        out
    }
}
