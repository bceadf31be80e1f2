//! postcrew - agent coordination and posting queue for a content pipeline.
//!
//! Four agent roles (content creator, reviewer, publisher, health monitor)
//! share three JSON documents through `postcrew-store`. This crate holds the
//! queue manager, mix planner, quality gate, task relay, self-healing
//! monitor and the adapters for the external generator and Slack.

pub mod config;
pub mod events;
pub mod gate;
pub mod generator;
pub mod monitor;
pub mod notify;
pub mod plan;
pub mod publish;
pub mod queue;
pub mod relay;
pub mod runner;
pub mod status;
pub mod stock;

pub use config::PostcrewConfig;
pub use runner::{RunSummary, Runner};
