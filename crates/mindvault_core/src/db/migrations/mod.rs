//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply each pending version in its own transaction.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version` inside the
//!   same transaction as the schema change.
//! - Every step is idempotent: reapplying it against an up-to-date schema is a
//!   no-op, checked via existence probes rather than assumed.
//! - A failure at version N leaves versions below N committed and aborts open.

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, Transaction};

#[derive(Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    apply: fn(&Transaction<'_>) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "init",
        apply: migrate_v1_init,
    },
    Migration {
        version: 2,
        name: "journal_draft_status",
        apply: migrate_v2_journal_draft_status,
    },
    Migration {
        version: 3,
        name: "core_levels_unit_interval",
        apply: migrate_v3_core_levels_unit_interval,
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
///
/// Each version commits independently, so an upgrade interrupted at version N
/// resumes from N on the next open instead of replaying earlier versions.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        let tx = conn.transaction()?;
        let applied = (migration.apply)(&tx).and_then(|()| {
            tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
        });
        match applied {
            Ok(()) => tx.commit()?,
            Err(source) => {
                // Drop of `tx` rolls the partial version back.
                return Err(DbError::MigrationFailed {
                    version: migration.version,
                    source,
                });
            }
        }
        log::info!(
            "event=migration_applied module=db status=ok version={} name={}",
            migration.version,
            migration.name
        );
    }

    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn migrate_v1_init(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    tx.execute_batch(include_str!("0001_init.sql"))
}

fn migrate_v2_journal_draft_status(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    add_column_if_absent(tx, "journal_entries", "draft_content", "TEXT")?;
    add_column_if_absent(
        tx,
        "journal_entries",
        "status",
        "TEXT NOT NULL DEFAULT 'finalized'",
    )?;
    Ok(())
}

/// Converts the deprecated 0-100 `percentage` representation to the canonical
/// `current_level`/`previous_level` pair in [0.0, 1.0].
fn migrate_v3_core_levels_unit_interval(tx: &Transaction<'_>) -> rusqlite::Result<()> {
    add_column_if_absent(
        tx,
        "aggregate_cores",
        "current_level",
        "REAL NOT NULL DEFAULT 0.0",
    )?;
    add_column_if_absent(
        tx,
        "aggregate_cores",
        "previous_level",
        "REAL NOT NULL DEFAULT 0.0",
    )?;

    if table_has_column(tx, "aggregate_cores", "percentage")? {
        tx.execute_batch(
            "UPDATE aggregate_cores
             SET current_level = MIN(MAX(percentage / 100.0, 0.0), 1.0),
                 previous_level = MIN(MAX(percentage / 100.0, 0.0), 1.0);
             ALTER TABLE aggregate_cores DROP COLUMN percentage;",
        )?;
    }

    Ok(())
}

fn add_column_if_absent(
    tx: &Transaction<'_>,
    table: &str,
    column: &str,
    definition: &str,
) -> rusqlite::Result<()> {
    if table_has_column(tx, table, column)? {
        return Ok(());
    }
    tx.execute_batch(&format!(
        "ALTER TABLE {table} ADD COLUMN {column} {definition};"
    ))
}

fn table_has_column(tx: &Transaction<'_>, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = tx.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
