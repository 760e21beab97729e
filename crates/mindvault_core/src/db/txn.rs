//! Transactional execution wrapper.
//!
//! # Responsibility
//! - Run a unit of work with all-or-nothing semantics.
//! - Translate backend failures into the typed store error taxonomy.
//!
//! # Invariants
//! - A unit that returns `Err` leaves no trace visible to subsequent reads.
//! - Mutating units serialize through the connection's exclusive borrow plus
//!   SQLite's own transaction isolation; reads never need this wrapper.

use crate::repo::{StoreError, StoreResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Runs `unit` inside one SQLite transaction.
///
/// The transaction takes the write lock up front (`Immediate`), so two
/// overlapping mutating units block on the backend rather than interleave.
/// Commit happens only on `Ok`; any `Err` (or panic unwinding through the
/// frame) rolls the whole unit back when the transaction drops.
pub fn run_in_transaction<T>(
    conn: &mut Connection,
    unit: impl FnOnce(&Transaction<'_>) -> StoreResult<T>,
) -> StoreResult<T> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::from)?;

    let value = unit(&tx)?;
    tx.commit().map_err(StoreError::from)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::run_in_transaction;
    use crate::db::open_db_in_memory;
    use crate::model::core::CoreId;
    use crate::repo::{EntityRef, StoreError};

    fn count_history(conn: &rusqlite::Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM core_transition_history;", [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn failing_unit_rolls_back_all_writes() {
        let mut conn = open_db_in_memory().unwrap();

        let result: Result<(), _> = run_in_transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO core_transition_history
                 (core_id, from_depth, to_depth, transition_date)
                 VALUES ('resilience', 0, 1, 1);",
                [],
            )?;
            Err(StoreError::NotFound(EntityRef::Core(CoreId::Resilience)))
        });

        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(count_history(&conn), 0);
    }

    #[test]
    fn successful_unit_commits() {
        let mut conn = open_db_in_memory().unwrap();

        run_in_transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO core_transition_history
                 (core_id, from_depth, to_depth, transition_date)
                 VALUES ('resilience', 0, 1, 1);",
                [],
            )
            .map_err(StoreError::from)
        })
        .unwrap();

        assert_eq!(count_history(&conn), 1);
    }

    #[test]
    fn backend_constraint_rejection_maps_to_constraint_error() {
        let mut conn = open_db_in_memory().unwrap();

        let result = run_in_transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO core_transition_history
                 (core_id, from_depth, to_depth, transition_date)
                 VALUES ('no_such_core', 0, 1, 1);",
                [],
            )
            .map_err(StoreError::from)
        });

        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }
}
