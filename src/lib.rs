// src/lib.rs

//! Toolshed
//!
//! Installation-state ledger and safe-removal planner for a multi-tool
//! developer environment.
//!
//! # Architecture
//!
//! - Ledger: one JSON document of installation and dependency records,
//!   saved atomically and guarded by an advisory lock
//! - Tracker: the only writer; keeps dependent edges idempotent
//! - Catalog: read-only tool and bundle definitions, with cycle-safe
//!   bundle expansion
//! - Removal planner: pure analysis that never breaks a tool something
//!   else still needs, and never touches pre-existing tools

pub mod catalog;
mod error;
pub mod ledger;
pub mod removal;
pub mod tracker;

pub use error::{Error, Result};
pub use ledger::{FileStore, LedgerStore, MemoryStore};
pub use tracker::Tracker;
