//! SQLite storage layer for MUSE.
//!
//! - WAL mode for concurrent reads
//! - One IMMEDIATE transaction per mutation
//! - Audit events written in the same transaction
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use sqlite::{
    Decision, MutationContext, PhaseWrite, ProjectSummary, SqliteStorage, UsageCount,
};
