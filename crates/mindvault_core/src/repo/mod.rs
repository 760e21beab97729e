//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for journal entries and
//!   aggregate cores.
//! - Own the typed store error taxonomy surfaced at the transaction boundary.
//!
//! # Invariants
//! - Repository writes enforce `JournalRecord::validate()` before persistence.
//! - Journal writes with core deltas are all-or-nothing.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

use crate::db::DbError;
use crate::keys::KeyError;
use crate::model::core::CoreId;
use crate::model::journal::{EntryId, JournalValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod core_repo;
pub mod journal_repo;

pub type StoreResult<T> = Result<T, StoreError>;

/// Entity reference carried by `StoreError::NotFound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Journal(EntryId),
    Core(CoreId),
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Journal(id) => write!(f, "journal entry {id}"),
            Self::Core(id) => write!(f, "aggregate core {id}"),
        }
    }
}

/// Caller-input rejection, detected before any write happens.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The journal record itself violates an invariant.
    Journal(JournalValidationError),
    /// A core delta targets a level outside [0.0, 1.0].
    LevelOutOfRange { core: CoreId, level: f64 },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Journal(err) => write!(f, "{err}"),
            Self::LevelOutOfRange { core, level } => {
                write!(f, "core {core} delta level {level} outside [0.0, 1.0]")
            }
        }
    }
}

impl Error for ValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Journal(err) => Some(err),
            Self::LevelOutOfRange { .. } => None,
        }
    }
}

/// Typed store error taxonomy.
///
/// Every failure crossing the public boundary is one of these variants;
/// callers match on kind instead of catching a generic error.
#[derive(Debug)]
pub enum StoreError {
    /// Caller-supplied data violates an invariant; detected before any write.
    Validation(ValidationError),
    /// Referenced entity is absent.
    NotFound(EntityRef),
    /// Backend-level rejection, e.g. a uniqueness or FK violation.
    Constraint(String),
    /// Unexpected backend failure, surfaced with the original cause.
    Transaction(DbError),
    /// Key-manager failure; encrypted operations fail closed on this.
    Security(KeyError),
    /// Fatal schema problem; aborts store startup entirely.
    Migration(DbError),
    /// Persisted state failed decoding; never masked as a valid record.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(entity) => write!(f, "{entity} not found"),
            Self::Constraint(message) => write!(f, "constraint violated: {message}"),
            Self::Transaction(err) => write!(f, "transaction failed: {err}"),
            Self::Security(err) => write!(f, "{err}"),
            Self::Migration(err) => write!(f, "store initialization failed: {err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transaction(err) | Self::Migration(err) => Some(err),
            Self::Security(err) => Some(err),
            Self::NotFound(_) | Self::Constraint(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<JournalValidationError> for StoreError {
    fn from(value: JournalValidationError) -> Self {
        Self::Validation(ValidationError::Journal(value))
    }
}

impl From<ValidationError> for StoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::UnsupportedSchemaVersion { .. } | DbError::MigrationFailed { .. } => {
                Self::Migration(value)
            }
            DbError::Sqlite(err) => Self::from(err),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, ref message) = value {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return Self::Constraint(
                    message
                        .clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                );
            }
        }
        Self::Transaction(DbError::Sqlite(value))
    }
}

impl From<KeyError> for StoreError {
    fn from(value: KeyError) -> Self {
        Self::Security(value)
    }
}

/// Escapes LIKE wildcards so user text matches literally under `ESCAPE '\'`.
pub(crate) fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
