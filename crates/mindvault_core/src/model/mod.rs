//! Domain model for journal entries and aggregate personality cores.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Enforce record-level invariants before anything touches storage.
//!
//! # Invariants
//! - Every journal entry is identified by a stable `EntryId`.
//! - Aggregate core identity is a closed six-member enumeration.
//! - Deletion of journal entries is a hard delete, not a tombstone.

pub mod core;
pub mod journal;
