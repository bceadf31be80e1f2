//! Pure detection over document snapshots. Nothing here writes.

use chrono::{DateTime, Duration, Utc};
use postcrew_core::{AgentId, AgentStateDoc, AgentStatus, PostingQueue, QueueStatus, Staleness};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finding {
    Stale { agent: AgentId, age: Duration },
    NeverRun { agent: AgentId },
}

pub fn detect_stale(doc: &AgentStateDoc, now: DateTime<Utc>, threshold: Duration) -> Vec<Finding> {
    AgentId::ALL
        .into_iter()
        .filter_map(|agent| match doc.staleness(agent, now) {
            Staleness::NeverRun => Some(Finding::NeverRun { agent }),
            Staleness::Since(age) if age > threshold => Some(Finding::Stale { agent, age }),
            Staleness::Since(_) => None,
        })
        .collect()
}

/// Failed agents whose last run is older than `heal_after`. A failed agent
/// with no recorded run is always due.
pub fn detect_healable_agents(
    doc: &AgentStateDoc,
    now: DateTime<Utc>,
    heal_after: Duration,
) -> Vec<AgentId> {
    AgentId::ALL
        .into_iter()
        .filter(|&agent| doc.status(agent) == AgentStatus::Failed)
        .filter(|&agent| doc.staleness(agent, now).exceeds(heal_after) || doc.record(agent).last_run.is_none())
        .collect()
}

/// `Some(pending)` when the queue is below `min_pending` and the generator
/// has nothing waiting in its inbox.
pub fn detect_depletion(
    queue: &PostingQueue,
    agents: &AgentStateDoc,
    min_pending: usize,
) -> Option<usize> {
    let pending = queue.count(QueueStatus::Pending);
    if pending < min_pending && !agents.has_pending_task(AgentId::GENERATOR, None) {
        Some(pending)
    } else {
        None
    }
}
