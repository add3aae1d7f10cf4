//! Persistence collaborator contracts and the SQLite implementation.
//!
//! # Responsibility
//! - Define the document-store contract the room store depends on: durable
//!   per-room collections, atomic batch writes and ordered change feeds.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Every batch commits all-or-nothing and touches the room `updated_at`.
//! - Change feeds emit whole-collection snapshots in commit order.

use crate::db::DbError;
use crate::model::item::{ItemId, ListKind, ValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod batch;
pub mod feed;
pub mod room_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Error raised by room persistence and the layers above it.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before anything was written.
    Validation(ValidationError),
    /// Storage transport failure.
    Db(DbError),
    /// Patch target does not exist in the given collection.
    NotFound { kind: ListKind, id: ItemId },
    /// The id already lives in the other collection of the room.
    ListConflict { kind: ListKind, id: ItemId },
    /// Persisted state violates the item schema.
    InvalidData(String),
    /// Another thread panicked while holding a store lock.
    LockPoisoned(&'static str),
}

/// Caller-facing classification of [`RepoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Recovered locally; nothing was written.
    Validation,
    /// Target vanished, usually due to a concurrent delete or move.
    NotFound,
    /// Read/write against persistence failed; no retry is attempted.
    Transport,
}

impl RepoError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::ListConflict { .. }
            | Self::Db(_)
            | Self::InvalidData(_)
            | Self::LockPoisoned(_) => ErrorClass::Transport,
        }
    }

    /// Short stable code for structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Db(_) => "db",
            Self::NotFound { .. } => "not_found",
            Self::ListConflict { .. } => "list_conflict",
            Self::InvalidData(_) => "invalid_data",
            Self::LockPoisoned(_) => "lock_poisoned",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} item not found: {id}"),
            Self::ListConflict { kind, id } => write!(
                f,
                "item {id} already exists outside the {kind}; refusing to duplicate it"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
            Self::LockPoisoned(what) => write!(f, "{what} lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
