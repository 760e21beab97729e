//! Journal use-case service.
//!
//! # Responsibility
//! - Provide create/update/delete/query entry points for journal entries.
//! - Orchestrate the atomic journal-plus-core-deltas flows.
//! - Offer draft-buffer and lifecycle-status helpers for the host app.
//!
//! # Invariants
//! - Every mutation goes through the repository's transactional contract.
//! - Created/updated records are read back so callers always receive the
//!   persisted state, never an echo of their input.

use crate::model::journal::{EntryId, EntryStatus, JournalRecord};
use crate::repo::journal_repo::{CoreDeltas, JournalListQuery, JournalRepository};
use crate::repo::{EntityRef, StoreError, StoreResult};
use log::info;

/// Journal service facade over repository implementations.
pub struct JournalService<R: JournalRepository> {
    repo: R,
}

impl<R: JournalRepository> JournalService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Persists one journal record and returns the stored state.
    pub fn create_entry(&mut self, record: JournalRecord) -> StoreResult<JournalRecord> {
        let id = self.repo.insert(&record)?;
        info!("event=journal_create module=service status=ok entry_id={id}");
        self.read_back(id)
    }

    /// Persists one record and applies its core deltas in one atomic unit.
    ///
    /// Either the journal row and every core mutation commit together, or
    /// nothing does.
    pub fn create_entry_with_core_updates(
        &mut self,
        record: JournalRecord,
        deltas: &CoreDeltas,
    ) -> StoreResult<JournalRecord> {
        let id = self.repo.insert_with_core_updates(&record, deltas)?;
        info!(
            "event=journal_create module=service status=ok entry_id={id} core_deltas={}",
            deltas.len()
        );
        self.read_back(id)
    }

    /// Replaces a stored record and returns the stored state.
    pub fn update_entry(&mut self, record: JournalRecord) -> StoreResult<JournalRecord> {
        self.repo.update(&record)?;
        self.read_back(record.id)
    }

    /// Replaces a record and applies its core deltas in one atomic unit.
    pub fn update_entry_with_core_updates(
        &mut self,
        record: JournalRecord,
        deltas: &CoreDeltas,
    ) -> StoreResult<JournalRecord> {
        self.repo.update_with_core_updates(&record, deltas)?;
        info!(
            "event=journal_update module=service status=ok entry_id={} core_deltas={}",
            record.id,
            deltas.len()
        );
        self.read_back(record.id)
    }

    /// Hard-deletes one entry. Transition history keeps its events but loses
    /// the reference to this entry.
    pub fn delete_entry(&mut self, id: EntryId) -> StoreResult<()> {
        self.repo.delete(id)?;
        info!("event=journal_delete module=service status=ok entry_id={id}");
        Ok(())
    }

    /// Stores the crash-recovery draft buffer without touching the content.
    pub fn save_draft(&mut self, id: EntryId, draft: Option<String>) -> StoreResult<JournalRecord> {
        let mut record = self.require(id)?;
        record.draft_content = draft;
        self.repo.update(&record)?;
        self.read_back(id)
    }

    /// Moves an entry to a new lifecycle status.
    pub fn set_status(&mut self, id: EntryId, status: EntryStatus) -> StoreResult<JournalRecord> {
        let mut record = self.require(id)?;
        record.status = status;
        self.repo.update(&record)?;
        self.read_back(id)
    }

    pub fn get_entry(&self, id: EntryId) -> StoreResult<Option<JournalRecord>> {
        self.repo.get_by_id(id)
    }

    pub fn list_entries(&self, query: &JournalListQuery) -> StoreResult<Vec<JournalRecord>> {
        self.repo.list(query)
    }

    pub fn entries_for_month(&self, year: i32, month: u32) -> StoreResult<Vec<JournalRecord>> {
        self.repo.get_by_month(year, month)
    }

    pub fn search(&self, needle: &str) -> StoreResult<Vec<JournalRecord>> {
        self.repo.search_by_text(needle)
    }

    fn require(&self, id: EntryId) -> StoreResult<JournalRecord> {
        self.repo
            .get_by_id(id)?
            .ok_or(StoreError::NotFound(EntityRef::Journal(id)))
    }

    fn read_back(&self, id: EntryId) -> StoreResult<JournalRecord> {
        self.repo.get_by_id(id)?.ok_or_else(|| {
            StoreError::InvalidData("written entry not found in read-back".to_string())
        })
    }
}
