//! Client-side synchronization between local intents and room change feeds.
//!
//! # Responsibility
//! - Route local edits to the room store.
//! - Apply change-feed snapshots to the local view without echoing them
//!   back as writes.

use crate::model::item::ValidationError;
use crate::repo::{ErrorClass, RepoError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod engine;
pub mod intent;

pub use engine::{ClientId, SyncEngine, SyncPhase};
pub use intent::{IntentOutcome, LocalIntent};

pub type SyncResult<T> = Result<T, SyncError>;

/// Error returned by the sync engine.
#[derive(Debug)]
pub enum SyncError {
    /// An intent was dispatched before `attach`.
    NotAttached,
    Repo(RepoError),
}

impl SyncError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotAttached => ErrorClass::Transport,
            Self::Repo(err) => err.class(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotAttached => "not_attached",
            Self::Repo(err) => err.code(),
        }
    }
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAttached => write!(f, "sync engine is not attached to a room"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotAttached => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for SyncError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ValidationError> for SyncError {
    fn from(value: ValidationError) -> Self {
        Self::Repo(RepoError::Validation(value))
    }
}
