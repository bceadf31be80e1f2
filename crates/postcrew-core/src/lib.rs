//! Postcrew Core - queue and agent types, transition tables, error handling

pub mod agents;
pub mod context;
pub mod document;
pub mod error;
pub mod queue;
pub mod types;

pub use agents::{AgentRecord, AgentStateDoc, Staleness};
pub use context::SharedContext;
pub use document::Document;
pub use error::{Error, Result};
pub use queue::PostingQueue;
pub use types::*;
