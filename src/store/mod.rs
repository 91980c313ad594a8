//! Durable warning storage.
//!
//! # Data Flow
//! ```text
//! relay controller
//!     → warnings.rs (WarningStore: upsert / mark_inactive / queries)
//!     → queries.rs (SQL statement constants)
//!     → SQLite (WAL, synchronous commits)
//! ```
//!
//! # Design Decisions
//! - The store is the single source of truth; scheduler timers are a
//!   rebuildable cache derived from it.
//! - Writes commit before timers are armed or events broadcast.
//! - Timestamps are fixed-width RFC 3339 UTC text, so lexicographic
//!   comparison in SQL equals chronological comparison.
//! - Rows are never deleted; expiry only flips `active`.

pub mod queries;
pub mod warnings;

pub use warnings::WarningStore;
