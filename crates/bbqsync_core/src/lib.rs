//! Core domain logic for bbqsync shared BBQ rooms.
//! This crate is the single source of truth for item, sync and settlement
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod settlement;
pub mod sync;
pub mod view;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::item::{normalize, Item, ItemId, ListKind, RawItem, ValidationError};
pub use model::patch::ItemPatch;
pub use model::room::{parse_participants, RoomId, RoomMeta, DEFAULT_ROOM_ID};
pub use repo::room_repo::{RoomRepository, SqliteRoomRepository};
pub use repo::{ErrorClass, RepoError, RepoResult};
pub use service::exchange::{parse_import, ExportDocument, ImportPayload};
pub use service::quick_add::{parse_quick_add, QuickAdd};
pub use service::room_store::{RoomSnapshot, RoomStore};
pub use settlement::{settle, BalanceRow, Settlement, SettlementOutcome, Standing, Transfer};
pub use sync::{ClientId, IntentOutcome, LocalIntent, SyncEngine, SyncError, SyncPhase};
pub use view::{format_currency, DerivedView, ItemFilter, RoomStats, RoomView, StatusFilter};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
