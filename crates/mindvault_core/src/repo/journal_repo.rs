//! Journal repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide typed CRUD and query APIs over `journal_entries`.
//! - Own the critical atomic unit: a journal write plus its aggregate core
//!   deltas commit or roll back together.
//!
//! # Invariants
//! - Write paths call `JournalRecord::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Deleting an entry clears `contributing_entry_id` references in the
//!   transition history; the history events themselves survive.

use crate::db::open::now_unix_ms;
use crate::db::txn::run_in_transaction;
use crate::model::core::CoreId;
use crate::model::journal::{EntryId, EntryStatus, JournalRecord, MoodTag};
use crate::repo::core_repo::apply_core_delta_in_tx;
use crate::repo::{escape_like, EntityRef, StoreError, StoreResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

const JOURNAL_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    entry_date,
    content,
    moods,
    day_of_week,
    created_at,
    updated_at,
    is_synced,
    metadata,
    draft_content,
    status
FROM journal_entries";

const LIST_DEFAULT_LIMIT: u32 = 20;
const LIST_LIMIT_MAX: u32 = 100;

/// Proposed new levels per core, produced by the external analysis step.
pub type CoreDeltas = BTreeMap<CoreId, f64>;

/// Query options for filtered/paged journal listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JournalListQuery {
    /// Entries containing this mood tag.
    pub mood: Option<MoodTag>,
    /// Entries in this lifecycle state.
    pub status: Option<EntryStatus>,
    /// Inclusive lower date bound, `YYYY-MM-DD`.
    pub from_date: Option<String>,
    /// Inclusive upper date bound, `YYYY-MM-DD`.
    pub to_date: Option<String>,
    /// Maximum rows to return. Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

/// Repository interface for journal CRUD, queries and atomic core updates.
pub trait JournalRepository {
    fn insert(&mut self, record: &JournalRecord) -> StoreResult<EntryId>;
    fn update(&mut self, record: &JournalRecord) -> StoreResult<()>;
    fn delete(&mut self, id: EntryId) -> StoreResult<()>;

    fn get_by_id(&self, id: EntryId) -> StoreResult<Option<JournalRecord>>;
    fn get_all(&self) -> StoreResult<Vec<JournalRecord>>;
    fn get_by_date_range(&self, from_date: &str, to_date: &str)
        -> StoreResult<Vec<JournalRecord>>;
    fn get_by_month(&self, year: i32, month: u32) -> StoreResult<Vec<JournalRecord>>;
    fn get_by_mood(&self, mood: MoodTag) -> StoreResult<Vec<JournalRecord>>;
    fn search_by_text(&self, needle: &str) -> StoreResult<Vec<JournalRecord>>;
    fn list(&self, query: &JournalListQuery) -> StoreResult<Vec<JournalRecord>>;

    /// Inserts the entry and applies every core delta in one transaction.
    fn insert_with_core_updates(
        &mut self,
        record: &JournalRecord,
        deltas: &CoreDeltas,
    ) -> StoreResult<EntryId>;
    /// Updates the entry and applies every core delta in one transaction.
    fn update_with_core_updates(
        &mut self,
        record: &JournalRecord,
        deltas: &CoreDeltas,
    ) -> StoreResult<()>;

    fn insert_many(&mut self, records: &[JournalRecord]) -> StoreResult<Vec<EntryId>>;
    fn update_many(&mut self, records: &[JournalRecord]) -> StoreResult<()>;
    fn delete_many(&mut self, ids: &[EntryId]) -> StoreResult<()>;
}

/// SQLite-backed journal repository.
pub struct SqliteJournalRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteJournalRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl JournalRepository for SqliteJournalRepository<'_> {
    fn insert(&mut self, record: &JournalRecord) -> StoreResult<EntryId> {
        record.validate()?;
        let now_ms = now_unix_ms();
        run_in_transaction(self.conn, |tx| insert_in_tx(tx, record, now_ms))
    }

    fn update(&mut self, record: &JournalRecord) -> StoreResult<()> {
        record.validate()?;
        let now_ms = now_unix_ms();
        run_in_transaction(self.conn, |tx| update_in_tx(tx, record, now_ms))
    }

    fn delete(&mut self, id: EntryId) -> StoreResult<()> {
        run_in_transaction(self.conn, |tx| delete_in_tx(tx, id))
    }

    fn get_by_id(&self, id: EntryId) -> StoreResult<Option<JournalRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{JOURNAL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_journal_row(row)?));
        }
        Ok(None)
    }

    fn get_all(&self) -> StoreResult<Vec<JournalRecord>> {
        self.query_entries(
            &format!("{JOURNAL_SELECT_SQL} ORDER BY entry_date DESC, id ASC;"),
            Vec::new(),
        )
    }

    fn get_by_date_range(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> StoreResult<Vec<JournalRecord>> {
        self.query_entries(
            &format!(
                "{JOURNAL_SELECT_SQL}
                 WHERE entry_date >= ? AND entry_date <= ?
                 ORDER BY entry_date DESC, id ASC;"
            ),
            vec![
                Value::Text(from_date.to_string()),
                Value::Text(to_date.to_string()),
            ],
        )
    }

    fn get_by_month(&self, year: i32, month: u32) -> StoreResult<Vec<JournalRecord>> {
        self.query_entries(
            &format!(
                "{JOURNAL_SELECT_SQL}
                 WHERE entry_date LIKE ?
                 ORDER BY entry_date DESC, id ASC;"
            ),
            vec![Value::Text(format!("{year:04}-{month:02}-%"))],
        )
    }

    fn get_by_mood(&self, mood: MoodTag) -> StoreResult<Vec<JournalRecord>> {
        // Moods are a JSON array of quoted tag strings; the quoted form avoids
        // substring collisions between tag names.
        self.query_entries(
            &format!(
                "{JOURNAL_SELECT_SQL}
                 WHERE moods LIKE ?
                 ORDER BY entry_date DESC, id ASC;"
            ),
            vec![Value::Text(format!("%\"{}\"%", mood.as_str()))],
        )
    }

    fn search_by_text(&self, needle: &str) -> StoreResult<Vec<JournalRecord>> {
        let pattern = format!("%{}%", escape_like(needle));
        self.query_entries(
            &format!(
                "{JOURNAL_SELECT_SQL}
                 WHERE content LIKE ?1 ESCAPE '\\'
                    OR COALESCE(draft_content, '') LIKE ?1 ESCAPE '\\'
                    OR metadata LIKE ?1 ESCAPE '\\'
                 ORDER BY entry_date DESC, id ASC;"
            ),
            vec![Value::Text(pattern)],
        )
    }

    fn list(&self, query: &JournalListQuery) -> StoreResult<Vec<JournalRecord>> {
        let mut sql = format!("{JOURNAL_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(mood) = query.mood {
            sql.push_str(" AND moods LIKE ?");
            bind_values.push(Value::Text(format!("%\"{}\"%", mood.as_str())));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from_date) = query.from_date.as_ref() {
            sql.push_str(" AND entry_date >= ?");
            bind_values.push(Value::Text(from_date.clone()));
        }
        if let Some(to_date) = query.to_date.as_ref() {
            sql.push_str(" AND entry_date <= ?");
            bind_values.push(Value::Text(to_date.clone()));
        }

        sql.push_str(" ORDER BY entry_date DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }
        sql.push(';');

        self.query_entries(&sql, bind_values)
    }

    fn insert_with_core_updates(
        &mut self,
        record: &JournalRecord,
        deltas: &CoreDeltas,
    ) -> StoreResult<EntryId> {
        record.validate()?;
        let now_ms = now_unix_ms();
        run_in_transaction(self.conn, |tx| {
            let id = insert_in_tx(tx, record, now_ms)?;
            for (core_id, proposed_level) in deltas {
                apply_core_delta_in_tx(tx, *core_id, *proposed_level, Some(id), now_ms)?;
            }
            Ok(id)
        })
    }

    fn update_with_core_updates(
        &mut self,
        record: &JournalRecord,
        deltas: &CoreDeltas,
    ) -> StoreResult<()> {
        record.validate()?;
        let now_ms = now_unix_ms();
        run_in_transaction(self.conn, |tx| {
            update_in_tx(tx, record, now_ms)?;
            for (core_id, proposed_level) in deltas {
                apply_core_delta_in_tx(tx, *core_id, *proposed_level, Some(record.id), now_ms)?;
            }
            Ok(())
        })
    }

    fn insert_many(&mut self, records: &[JournalRecord]) -> StoreResult<Vec<EntryId>> {
        for record in records {
            record.validate()?;
        }
        let now_ms = now_unix_ms();
        run_in_transaction(self.conn, |tx| {
            let mut ids = Vec::with_capacity(records.len());
            for record in records {
                ids.push(insert_in_tx(tx, record, now_ms)?);
            }
            Ok(ids)
        })
    }

    fn update_many(&mut self, records: &[JournalRecord]) -> StoreResult<()> {
        for record in records {
            record.validate()?;
        }
        let now_ms = now_unix_ms();
        run_in_transaction(self.conn, |tx| {
            for record in records {
                update_in_tx(tx, record, now_ms)?;
            }
            Ok(())
        })
    }

    fn delete_many(&mut self, ids: &[EntryId]) -> StoreResult<()> {
        run_in_transaction(self.conn, |tx| {
            for id in ids {
                delete_in_tx(tx, *id)?;
            }
            Ok(())
        })
    }
}

impl SqliteJournalRepository<'_> {
    fn query_entries(&self, sql: &str, bind_values: Vec<Value>) -> StoreResult<Vec<JournalRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_journal_row(row)?);
        }
        Ok(entries)
    }
}

fn insert_in_tx(tx: &Transaction<'_>, record: &JournalRecord, now_ms: i64) -> StoreResult<EntryId> {
    tx.execute(
        "INSERT INTO journal_entries (
            id, user_id, entry_date, content, moods, day_of_week,
            created_at, updated_at, is_synced, metadata, draft_content, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, ?11);",
        params![
            record.id.to_string(),
            record.user_id,
            record.entry_date,
            record.content,
            moods_to_json(&record.moods),
            record.day_of_week,
            now_ms,
            record.is_synced as i64,
            metadata_to_json(&record.metadata),
            record.draft_content.as_deref(),
            record.status.as_str(),
        ],
    )?;
    Ok(record.id)
}

fn update_in_tx(tx: &Transaction<'_>, record: &JournalRecord, now_ms: i64) -> StoreResult<()> {
    let changed = tx.execute(
        "UPDATE journal_entries
         SET
            user_id = ?2,
            entry_date = ?3,
            content = ?4,
            moods = ?5,
            day_of_week = ?6,
            updated_at = ?7,
            is_synced = ?8,
            metadata = ?9,
            draft_content = ?10,
            status = ?11
         WHERE id = ?1;",
        params![
            record.id.to_string(),
            record.user_id,
            record.entry_date,
            record.content,
            moods_to_json(&record.moods),
            record.day_of_week,
            now_ms,
            record.is_synced as i64,
            metadata_to_json(&record.metadata),
            record.draft_content.as_deref(),
            record.status.as_str(),
        ],
    )?;

    if changed == 0 {
        return Err(StoreError::NotFound(EntityRef::Journal(record.id)));
    }
    Ok(())
}

fn delete_in_tx(tx: &Transaction<'_>, id: EntryId) -> StoreResult<()> {
    let id_text = id.to_string();
    let changed = tx.execute(
        "DELETE FROM journal_entries WHERE id = ?1;",
        [id_text.as_str()],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(EntityRef::Journal(id)));
    }

    // History survives deletion of its source entry; only the reference goes.
    tx.execute(
        "UPDATE core_transition_history
         SET contributing_entry_id = NULL
         WHERE contributing_entry_id = ?1;",
        [id_text.as_str()],
    )?;

    Ok(())
}

/// Normalizes list limit according to the journal listing contract.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) => LIST_DEFAULT_LIMIT,
        Some(value) if value > LIST_LIMIT_MAX => LIST_LIMIT_MAX,
        Some(value) => value,
        None => LIST_DEFAULT_LIMIT,
    }
}

fn moods_to_json(moods: &[MoodTag]) -> String {
    serde_json::to_string(&moods.iter().map(|m| m.as_str()).collect::<Vec<_>>())
        .unwrap_or_else(|_| "[]".to_string())
}

fn metadata_to_json(metadata: &BTreeMap<String, String>) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}

fn parse_journal_row(row: &Row<'_>) -> StoreResult<JournalRecord> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid uuid `{id_text}` in journal_entries.id"))
    })?;

    let moods_text: String = row.get("moods")?;
    let mood_names: Vec<String> = serde_json::from_str(&moods_text).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid moods json `{moods_text}` in journal_entries.moods"
        ))
    })?;
    let mut moods = Vec::with_capacity(mood_names.len());
    for name in &mood_names {
        moods.push(MoodTag::parse(name).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "unknown mood `{name}` in journal_entries.moods"
            ))
        })?);
    }

    let metadata_text: String = row.get("metadata")?;
    let metadata: BTreeMap<String, String> =
        serde_json::from_str(&metadata_text).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid metadata json in journal_entries.metadata for `{id_text}`"
            ))
        })?;

    let status_text: String = row.get("status")?;
    let status = EntryStatus::parse(&status_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid status `{status_text}` in journal_entries.status"
        ))
    })?;

    let is_synced = match row.get::<_, i64>("is_synced")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid is_synced value `{other}` in journal_entries.is_synced"
            )));
        }
    };

    Ok(JournalRecord {
        id,
        user_id: row.get("user_id")?,
        entry_date: row.get("entry_date")?,
        content: row.get("content")?,
        moods,
        day_of_week: row.get("day_of_week")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        is_synced,
        metadata,
        draft_content: row.get("draft_content")?,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::normalize_list_limit;

    #[test]
    fn list_limit_defaults_and_caps() {
        assert_eq!(normalize_list_limit(None), 20);
        assert_eq!(normalize_list_limit(Some(0)), 20);
        assert_eq!(normalize_list_limit(Some(35)), 35);
        assert_eq!(normalize_list_limit(Some(500)), 100);
    }
}
