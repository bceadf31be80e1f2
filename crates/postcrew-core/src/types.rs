//! Core types for Postcrew

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Content category of a planned post.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Aruaru,
    Career,
    Salary,
    Service,
    Trend,
}

impl Category {
    /// Declaration order. Used as the stable order wherever categories are listed.
    pub const ALL: [Category; 5] = [
        Category::Aruaru,
        Category::Career,
        Category::Salary,
        Category::Service,
        Category::Trend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aruaru => "aruaru",
            Self::Career => "career",
            Self::Salary => "salary",
            Self::Service => "service",
            Self::Trend => "trend",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// Call-to-action style. Anything other than soft/hard in a persisted
/// document deserializes to `Unrecognized` and is coerced by the quality gate.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaType {
    Soft,
    Hard,
    #[serde(other)]
    Unrecognized,
}

impl CtaType {
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Soft | Self::Hard => true,
            Self::Unrecognized => false,
        }
    }
}

impl fmt::Display for CtaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Soft => write!(f, "soft"),
            Self::Hard => write!(f, "hard"),
            Self::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Lifecycle of a queue entry.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Ready,
    Posted,
    Failed,
}

impl QueueStatus {
    pub const ALL: [QueueStatus; 4] = [
        QueueStatus::Pending,
        QueueStatus::Ready,
        QueueStatus::Posted,
        QueueStatus::Failed,
    ];

    /// Allowed edges: pending→ready, ready→posted, pending|ready→failed,
    /// failed→pending. Every pair is spelled out so a new status fails to
    /// compile until its edges are decided.
    pub fn can_transition(self, to: QueueStatus) -> bool {
        use QueueStatus::*;
        match self {
            Pending => match to {
                Ready | Failed => true,
                Pending | Posted => false,
            },
            Ready => match to {
                Posted | Failed => true,
                Pending | Ready => false,
            },
            Posted => match to {
                Pending | Ready | Posted | Failed => false,
            },
            Failed => match to {
                Pending => true,
                Ready | Posted | Failed => false,
            },
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Posted)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Ready => write!(f, "ready"),
            Self::Posted => write!(f, "posted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|st| st.to_string() == wanted)
            .ok_or_else(|| format!("unknown queue status: {s}"))
    }
}

/// One planned social post.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: u64,
    pub content_id: String,
    pub category: Category,
    pub cta_type: CtaType,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_dir: Option<String>,
    pub status: QueueStatus,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
}

/// Content fields supplied by the generation collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub content_id: String,
    pub category: Category,
    pub cta_type: CtaType,
    pub caption: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub slide_dir: Option<String>,
}

/// Fixed registry of agent roles.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentId {
    ContentCreator,
    Publisher,
    Reviewer,
    HealthMonitor,
}

impl AgentId {
    pub const ALL: [AgentId; 4] = [
        AgentId::ContentCreator,
        AgentId::Publisher,
        AgentId::Reviewer,
        AgentId::HealthMonitor,
    ];

    /// The agent that fills the queue.
    pub const GENERATOR: AgentId = AgentId::ContentCreator;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentCreator => "content_creator",
            Self::Publisher => "publisher",
            Self::Reviewer => "reviewer",
            Self::HealthMonitor => "health_monitor",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or_else(|| format!("unknown agent: {s}"))
    }
}

/// Run status of an agent.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl AgentStatus {
    /// pending→running, completed→running, running→completed|failed,
    /// failed→pending (heal). running→running covers an invocation that was
    /// killed before it could record an outcome.
    pub fn can_transition(self, to: AgentStatus) -> bool {
        use AgentStatus::*;
        match self {
            Pending => match to {
                Running => true,
                Pending | Completed | Failed => false,
            },
            Running => match to {
                Running | Completed | Failed => true,
                Pending => false,
            },
            Completed => match to {
                Running => true,
                Pending | Completed | Failed => false,
            },
            Failed => match to {
                Pending => true,
                Running | Completed | Failed => false,
            },
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Typed label of a relayed task.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Raised by the monitor when the pending queue runs low.
    EmergencyGenerate,
    GenerateBatch,
    ReviewQueue,
    PreparePublish,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::EmergencyGenerate,
        TaskKind::GenerateBatch,
        TaskKind::ReviewQueue,
        TaskKind::PreparePublish,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyGenerate => "emergency_generate",
            Self::GenerateBatch => "generate_batch",
            Self::ReviewQueue => "review_queue",
            Self::PreparePublish => "prepare_publish",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| format!("unknown task type: {s}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Consumed,
}

/// A directed message from one agent to another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: Uuid,
    pub from: AgentId,
    pub to: AgentId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub details: String,
    /// Requested batch size for generation tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub created: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl AgentTask {
    pub fn new(
        from: AgentId,
        to: AgentId,
        kind: TaskKind,
        details: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            kind,
            details: details.into(),
            count: None,
            created: now,
            status: TaskStatus::Pending,
            consumed_at: None,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}
