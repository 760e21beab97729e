//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Key file stores with the managed at-rest encryption key.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations and seed the six aggregate cores before
//!   returning a usable connection.
//!
//! # Invariants
//! - File stores are encrypted at rest when the key vault yields a key; an
//!   unavailable vault degrades to a plaintext store with a logged warning.
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.
//! - All six `aggregate_cores` rows exist exactly once after open.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::keys::{hex_key, KeyManager};
use crate::model::core::{CoreId, ALL_CORES};
use log::{error, info, warn};
use rusqlite::{params, Connection};
use std::path::Path;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Opens the store file using the platform-default key location.
///
/// # Side effects
/// - Performs keying, connection bootstrap, migration and core seeding.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_keys(path, &KeyManager::default_local())
}

/// Opens the store file, keying it with the vault's encryption key.
///
/// The database file is encrypted at rest. When the vault cannot produce a
/// key the store opens in plaintext with a logged degradation, and stores
/// written before encryption was introduced keep opening as plaintext.
pub fn open_db_with_keys(path: impl AsRef<Path>, keys: &KeyManager) -> DbResult<Connection> {
    finish_open(|| open_file_connection(path.as_ref(), keys), "file")
}

/// Opens an in-memory SQLite database and applies all pending migrations.
///
/// Used by tests and by callers that want a throwaway store. Memory stores
/// have no at-rest surface and are not keyed.
pub fn open_db_in_memory() -> DbResult<Connection> {
    finish_open(|| Connection::open_in_memory().map_err(Into::into), "memory")
}

fn open_file_connection(path: &Path, keys: &KeyManager) -> DbResult<Connection> {
    let conn = Connection::open(path)?;

    let Some(key) = keys.try_key_for_init() else {
        warn!("event=db_cipher module=db status=degraded cipher=plaintext reason=key_unavailable");
        return Ok(conn);
    };
    conn.execute_batch(&format!("PRAGMA key = \"x'{}'\";", hex_key(&key)))?;
    if schema_is_readable(&conn)? {
        return Ok(conn);
    }

    // Stores created before at-rest encryption (or while the vault was down)
    // are plaintext; reopen without the key so they keep working.
    warn!("event=db_cipher module=db status=degraded cipher=plaintext reason=legacy_store");
    Ok(Connection::open(path)?)
}

fn schema_is_readable(conn: &Connection) -> DbResult<bool> {
    match conn.query_row("SELECT COUNT(*) FROM sqlite_master;", [], |row| {
        row.get::<_, i64>(0)
    }) {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(code, _))
            if code.code == rusqlite::ErrorCode::NotADatabase =>
        {
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn finish_open(open: impl FnOnce() -> DbResult<Connection>, mode: &str) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err);
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(conn)?;
    seed_aggregate_cores(conn)?;
    Ok(())
}

/// Seed metadata per core: description, display color, icon, related cores.
const CORE_SEEDS: [(CoreId, &str, &str, &str, [CoreId; 2]); 6] = [
    (
        CoreId::Resilience,
        "Capacity to recover and grow through difficulty.",
        "#2e7d32",
        "icons/core_resilience.svg",
        [CoreId::Discipline, CoreId::Authenticity],
    ),
    (
        CoreId::Curiosity,
        "Drive to explore, question and learn.",
        "#1565c0",
        "icons/core_curiosity.svg",
        [CoreId::Creativity, CoreId::Empathy],
    ),
    (
        CoreId::Empathy,
        "Attunement to the feelings and needs of others.",
        "#ad1457",
        "icons/core_empathy.svg",
        [CoreId::Curiosity, CoreId::Authenticity],
    ),
    (
        CoreId::Discipline,
        "Consistency in showing up for commitments.",
        "#4527a0",
        "icons/core_discipline.svg",
        [CoreId::Resilience, CoreId::Creativity],
    ),
    (
        CoreId::Creativity,
        "Generation of novel ideas and expression.",
        "#ef6c00",
        "icons/core_creativity.svg",
        [CoreId::Curiosity, CoreId::Discipline],
    ),
    (
        CoreId::Authenticity,
        "Alignment between inner values and outward action.",
        "#00695c",
        "icons/core_authenticity.svg",
        [CoreId::Empathy, CoreId::Resilience],
    ),
];

/// Inserts the six aggregate core rows when missing.
///
/// `INSERT OR IGNORE` keeps this idempotent across reopens, so the records
/// are seeded exactly once per database lifetime.
fn seed_aggregate_cores(conn: &Connection) -> DbResult<()> {
    let now_ms = now_unix_ms();
    for (core, description, color, icon_path, related) in CORE_SEEDS {
        let related_json = serde_json::to_string(
            &related.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());
        conn.execute(
            "INSERT OR IGNORE INTO aggregate_cores (
                id, name, description, current_level, previous_level,
                last_updated, entries_at_current_depth, trend, color,
                icon_path, insight, related_cores, created_at, updated_at
            ) VALUES (?1, ?2, ?3, 0.0, 0.0, ?4, 0, 'stable', ?5, ?6, '', ?7, ?4, ?4);",
            params![
                core.as_str(),
                core.display_name(),
                description,
                now_ms,
                color,
                icon_path,
                related_json,
            ],
        )?;
    }
    debug_assert_eq!(CORE_SEEDS.len(), ALL_CORES.len());
    Ok(())
}

/// Current wall clock in Unix epoch milliseconds.
pub fn now_unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
