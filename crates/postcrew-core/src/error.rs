//! Error types for Postcrew

use crate::types::{AgentId, AgentStatus, QueueStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("document unavailable: {document} - {reason}")]
    DocumentUnavailable { document: String, reason: String },

    #[error("invalid transition for entry {id}: {from} -> {to}")]
    InvalidTransition {
        id: u64,
        from: QueueStatus,
        to: QueueStatus,
    },

    #[error("invalid agent transition for {agent}: {from} -> {to}")]
    InvalidAgentTransition {
        agent: AgentId,
        from: AgentStatus,
        to: AgentStatus,
    },

    #[error("queue entry not found: {0}")]
    EntryNotFound(u64),

    #[error("validation failed for entry {id}: {}", reasons.join("; "))]
    ValidationFailure { id: u64, reasons: Vec<String> },

    #[error("delivery failed: {channel} - {message}")]
    DeliveryFailure { channel: String, message: String },

    #[error("generation failed: {0}")]
    UpstreamGenerationFailure(String),

    #[error("packaging failed for entry {id}: {message}")]
    Packaging { id: u64, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn document_unavailable(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DocumentUnavailable {
            document: document.into(),
            reason: reason.into(),
        }
    }

    pub fn delivery(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeliveryFailure {
            channel: channel.into(),
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::UpstreamGenerationFailure(message.into())
    }

    pub fn packaging(id: u64, message: impl Into<String>) -> Self {
        Self::Packaging {
            id,
            message: message.into(),
        }
    }

    /// True when the error means a persisted document could not be read.
    pub fn is_document_unavailable(&self) -> bool {
        matches!(self, Self::DocumentUnavailable { .. })
    }
}
