//! Room document store bootstrap and schema migrations.
//!
//! # Responsibility
//! - Open the SQLite file (or memory database) that holds rooms and items.
//! - Bring its schema to the latest room/item layout before first use.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Room data is never read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Room store bootstrap failure.
#[derive(Debug)]
pub enum DbError {
    /// The connection itself could not be opened.
    Open {
        mode: &'static str,
        source: rusqlite::Error,
    },
    /// A migration script failed; nothing from the pending run was kept.
    Migration { version: u32, source: rusqlite::Error },
    /// Pragma or version query failure outside a migration script.
    Sqlite(rusqlite::Error),
    /// The file was written by a newer binary.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// Stable code used in `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open { .. } => "room_store_open_failed",
            Self::Migration { .. } => "room_store_migration_failed",
            Self::Sqlite(_) => "room_store_sqlite",
            Self::UnsupportedSchemaVersion { .. } => "room_store_schema_too_new",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { mode, source } => write!(f, "cannot open {mode} room store: {source}"),
            Self::Migration { version, source } => {
                write!(f, "room store migration {version} failed: {source}")
            }
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "room store schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

#[cfg(test)]
mod tests {
    use super::DbError;
    use std::error::Error;

    #[test]
    fn migration_failure_names_the_version_and_keeps_the_cause() {
        let err = DbError::Migration {
            version: 1,
            source: rusqlite::Error::InvalidQuery,
        };
        assert_eq!(err.code(), "room_store_migration_failed");
        assert!(err.to_string().starts_with("room store migration 1 failed"));
        assert!(err.source().is_some());
    }

    #[test]
    fn newer_schema_has_no_source() {
        let err = DbError::UnsupportedSchemaVersion {
            db_version: 9,
            latest_supported: 1,
        };
        assert_eq!(err.code(), "room_store_schema_too_new");
        assert!(err.source().is_none());
    }
}
