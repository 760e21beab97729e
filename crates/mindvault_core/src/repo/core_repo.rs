//! Aggregate core repository and transaction-scoped evolution writes.
//!
//! # Responsibility
//! - Read access to the six aggregate core rows and their transition history.
//! - Apply evolution results inside a caller-owned transaction so core
//!   mutations share the atomic unit of the journal write that caused them.
//!
//! # Invariants
//! - Core rows are never inserted or deleted here; seeding owns creation.
//! - Levels are validated against [0.0, 1.0] before any row is touched.
//! - A depth transition always appends exactly one history event.

use crate::db::open::now_unix_ms;
use crate::evolution::{evolve, Evolution};
use crate::model::core::{AggregateCoreRecord, CoreId, CoreTransitionEvent, Trend};
use crate::model::journal::EntryId;
use crate::repo::{escape_like, EntityRef, StoreError, StoreResult, ValidationError};
use rusqlite::{params, Connection, Row, Transaction};
use uuid::Uuid;

const CORE_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    current_level,
    previous_level,
    last_updated,
    last_transition_date,
    entries_at_current_depth,
    trend,
    color,
    icon_path,
    insight,
    related_cores,
    transition_signals,
    supporting_evidence,
    created_at,
    updated_at
FROM aggregate_cores";

const HISTORY_SELECT_SQL: &str = "SELECT
    id,
    core_id,
    from_depth,
    to_depth,
    transition_date,
    contributing_entry_id,
    transition_reason
FROM core_transition_history";

/// Repository interface for aggregate core reads and insight updates.
pub trait CoreRepository {
    fn get(&self, core_id: CoreId) -> StoreResult<AggregateCoreRecord>;
    fn list_all(&self) -> StoreResult<Vec<AggregateCoreRecord>>;
    fn transition_history(&self, core_id: CoreId) -> StoreResult<Vec<CoreTransitionEvent>>;
    fn transition_history_all(&self) -> StoreResult<Vec<CoreTransitionEvent>>;
    /// Cores whose insight text contains `needle` as a literal substring.
    fn search_insights(&self, needle: &str) -> StoreResult<Vec<AggregateCoreRecord>>;
    fn update_insight(
        &self,
        core_id: CoreId,
        insight: &str,
        transition_signals: Option<&str>,
        supporting_evidence: Option<&str>,
    ) -> StoreResult<()>;
}

/// SQLite-backed aggregate core repository.
pub struct SqliteCoreRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCoreRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CoreRepository for SqliteCoreRepository<'_> {
    fn get(&self, core_id: CoreId) -> StoreResult<AggregateCoreRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CORE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([core_id.as_str()])?;
        match rows.next()? {
            Some(row) => parse_core_row(row),
            None => Err(StoreError::NotFound(EntityRef::Core(core_id))),
        }
    }

    fn list_all(&self) -> StoreResult<Vec<AggregateCoreRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CORE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut cores = Vec::new();
        while let Some(row) = rows.next()? {
            cores.push(parse_core_row(row)?);
        }
        Ok(cores)
    }

    fn transition_history(&self, core_id: CoreId) -> StoreResult<Vec<CoreTransitionEvent>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HISTORY_SELECT_SQL}
             WHERE core_id = ?1
             ORDER BY transition_date DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([core_id.as_str()])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_history_row(row)?);
        }
        Ok(events)
    }

    fn transition_history_all(&self) -> StoreResult<Vec<CoreTransitionEvent>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{HISTORY_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_history_row(row)?);
        }
        Ok(events)
    }

    fn search_insights(&self, needle: &str) -> StoreResult<Vec<AggregateCoreRecord>> {
        let pattern = format!("%{}%", escape_like(needle));
        let mut stmt = self.conn.prepare(&format!(
            "{CORE_SELECT_SQL}
             WHERE insight LIKE ?1 ESCAPE '\\'
             ORDER BY id ASC;"
        ))?;
        let mut rows = stmt.query([pattern])?;
        let mut cores = Vec::new();
        while let Some(row) = rows.next()? {
            cores.push(parse_core_row(row)?);
        }
        Ok(cores)
    }

    fn update_insight(
        &self,
        core_id: CoreId,
        insight: &str,
        transition_signals: Option<&str>,
        supporting_evidence: Option<&str>,
    ) -> StoreResult<()> {
        // Readers share this connection, so the transaction is taken without
        // the exclusive borrow the write wrapper requires.
        let tx = self.conn.unchecked_transaction().map_err(StoreError::from)?;
        let changed = tx.execute(
            "UPDATE aggregate_cores
             SET
                insight = ?2,
                transition_signals = ?3,
                supporting_evidence = ?4,
                updated_at = ?5
             WHERE id = ?1;",
            params![
                core_id.as_str(),
                insight,
                transition_signals,
                supporting_evidence,
                now_unix_ms(),
            ],
        )?;

        if changed == 0 {
            return Err(StoreError::NotFound(EntityRef::Core(core_id)));
        }

        tx.commit().map_err(StoreError::from)?;
        Ok(())
    }
}

/// Applies one core delta inside the caller's transaction.
///
/// Loads the stored level, runs the pure evolution step, persists the new
/// level/trend/timestamps, and appends a transition event when a depth
/// boundary was crossed. The journal write and every delta share one atomic
/// unit; any failure here rolls the whole unit back.
pub(crate) fn apply_core_delta_in_tx(
    tx: &Transaction<'_>,
    core_id: CoreId,
    proposed_level: f64,
    contributing_entry_id: Option<EntryId>,
    now_ms: i64,
) -> StoreResult<Evolution> {
    if !(0.0..=1.0).contains(&proposed_level) {
        return Err(ValidationError::LevelOutOfRange {
            core: core_id,
            level: proposed_level,
        }
        .into());
    }

    let mut stmt = tx.prepare(
        "SELECT current_level, entries_at_current_depth
         FROM aggregate_cores
         WHERE id = ?1;",
    )?;
    let mut rows = stmt.query([core_id.as_str()])?;
    let (stored_level, entries_at_depth): (f64, u32) = match rows.next()? {
        Some(row) => (row.get(0)?, row.get(1)?),
        None => return Err(StoreError::NotFound(EntityRef::Core(core_id))),
    };
    drop(rows);
    drop(stmt);

    let evolution = evolve(stored_level, proposed_level, now_ms);

    let (entries_at_depth, last_transition_date) = match evolution.transition {
        Some(_) => (0_u32, Some(now_ms)),
        None => (entries_at_depth.saturating_add(1), None),
    };

    tx.execute(
        "UPDATE aggregate_cores
         SET
            previous_level = ?2,
            current_level = ?3,
            trend = ?4,
            last_updated = ?5,
            updated_at = ?5,
            entries_at_current_depth = ?6,
            last_transition_date = COALESCE(?7, last_transition_date)
         WHERE id = ?1;",
        params![
            core_id.as_str(),
            evolution.previous_level,
            evolution.current_level,
            evolution.trend.as_str(),
            now_ms,
            entries_at_depth,
            last_transition_date,
        ],
    )?;

    if let Some(transition) = evolution.transition {
        tx.execute(
            "INSERT INTO core_transition_history (
                core_id, from_depth, to_depth, transition_date,
                contributing_entry_id, transition_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                core_id.as_str(),
                transition.from_depth,
                transition.to_depth,
                now_ms,
                contributing_entry_id.map(|id| id.to_string()),
                format!(
                    "level {:.3} -> {:.3}",
                    evolution.previous_level, evolution.current_level
                ),
            ],
        )?;
    }

    Ok(evolution)
}

fn parse_core_row(row: &Row<'_>) -> StoreResult<AggregateCoreRecord> {
    let id_text: String = row.get("id")?;
    let id = CoreId::parse(&id_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid core id `{id_text}` in aggregate_cores.id"))
    })?;

    let trend_text: String = row.get("trend")?;
    let trend = Trend::parse(&trend_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid trend `{trend_text}` in aggregate_cores.trend"
        ))
    })?;

    let related_text: String = row.get("related_cores")?;
    let related_names: Vec<String> = serde_json::from_str(&related_text).map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid related_cores json `{related_text}` for core `{id_text}`"
        ))
    })?;
    let mut related_cores = Vec::with_capacity(related_names.len());
    for name in &related_names {
        let related = CoreId::parse(name).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "unknown related core `{name}` for core `{id_text}`"
            ))
        })?;
        if related != id {
            related_cores.push(related);
        }
    }

    Ok(AggregateCoreRecord {
        id,
        name: row.get("name")?,
        description: row.get("description")?,
        current_level: row.get("current_level")?,
        previous_level: row.get("previous_level")?,
        last_updated: row.get("last_updated")?,
        last_transition_date: row.get("last_transition_date")?,
        entries_at_current_depth: row.get("entries_at_current_depth")?,
        trend,
        color: row.get("color")?,
        icon_path: row.get("icon_path")?,
        insight: row.get("insight")?,
        related_cores,
        transition_signals: row.get("transition_signals")?,
        supporting_evidence: row.get("supporting_evidence")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_history_row(row: &Row<'_>) -> StoreResult<CoreTransitionEvent> {
    let core_text: String = row.get("core_id")?;
    let core_id = CoreId::parse(&core_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid core id `{core_text}` in core_transition_history.core_id"
        ))
    })?;

    let contributing_entry_id = match row.get::<_, Option<String>>("contributing_entry_id")? {
        Some(text) => Some(Uuid::parse_str(&text).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid uuid `{text}` in core_transition_history.contributing_entry_id"
            ))
        })?),
        None => None,
    };

    Ok(CoreTransitionEvent {
        id: row.get("id")?,
        core_id,
        from_depth: row.get("from_depth")?,
        to_depth: row.get("to_depth")?,
        transition_date: row.get("transition_date")?,
        contributing_entry_id,
        transition_reason: row.get("transition_reason")?,
    })
}
