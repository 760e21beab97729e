//! Encrypted, schema-evolving local store for journal entries and derived
//! personality-core aggregates.
//!
//! This crate is the single source of truth for persistence invariants: a
//! journal write and its aggregate core effects are never partially applied,
//! schema upgrades never lose data, and destructive operations are verifiable.
//! Screens, prompts and network analysis live in the host application; the
//! store accepts already-validated domain objects and hands back owned copies.

pub mod db;
pub mod evolution;
pub mod keys;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use evolution::{classify_trend, depth_band, evolve, DEPTH_BOUNDARIES, TREND_EPSILON};
pub use keys::{KeyError, KeyManager};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::core::{AggregateCoreRecord, CoreId, CoreTransitionEvent, Trend, ALL_CORES};
pub use model::journal::{
    EntryId, EntryStatus, JournalRecord, JournalValidationError, MoodTag, MAX_CONTENT_CHARS,
};
pub use repo::core_repo::{CoreRepository, SqliteCoreRepository};
pub use repo::journal_repo::{
    CoreDeltas, JournalListQuery, JournalRepository, SqliteJournalRepository,
};
pub use repo::{EntityRef, StoreError, StoreResult, ValidationError};
pub use service::export_service::{ExportDocument, ExportService};
pub use service::journal_service::JournalService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
