//! Postcrew Store - shared document storage
//!
//! Three whole-document JSON files (queue, agents, context) live side by side
//! in one data directory. Saves are promoted atomically from a synced temp
//! file, so a killed writer leaves either the old or the new document, never
//! a truncated one. `update` holds an exclusive advisory lock across the whole
//! read-modify-write, so overlapping invocations do not lose each other's
//! changes. Plain `load`/`save` remain last-write-wins.

pub mod lock;
pub mod store;

pub use lock::DocumentLock;
pub use store::DocumentStore;
