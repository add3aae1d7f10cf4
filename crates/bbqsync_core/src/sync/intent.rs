//! Local edit intents and their outcomes.

use crate::model::item::{Item, ItemId, ListKind, RawItem};
use crate::model::patch::ItemPatch;

/// One user edit routed through `SyncEngine::dispatch`.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalIntent {
    Add {
        kind: ListKind,
        raw: RawItem,
    },
    /// Free text parsed by the quick-add grammar.
    QuickAdd {
        kind: ListKind,
        text: String,
    },
    Update {
        kind: ListKind,
        id: ItemId,
        patch: ItemPatch,
    },
    Delete {
        kind: ListKind,
        id: ItemId,
        confirmed: bool,
    },
    Move {
        id: ItemId,
        from: ListKind,
    },
    SetParticipants(Vec<String>),
    /// Comma-separated participant names.
    SetParticipantsText(String),
    Import {
        json: String,
        confirmed: bool,
    },
    Reset {
        confirmed: bool,
    },
}

impl LocalIntent {
    /// Stable label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::QuickAdd { .. } => "quick_add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Move { .. } => "move",
            Self::SetParticipants(_) => "set_participants",
            Self::SetParticipantsText(_) => "set_participants_text",
            Self::Import { .. } => "import",
            Self::Reset { .. } => "reset",
        }
    }
}

/// What a dispatched intent did.
#[derive(Debug, Clone, PartialEq)]
pub enum IntentOutcome {
    Added(Item),
    Updated(Item),
    /// Whether a row was removed.
    Deleted(bool),
    /// `None` when the item was no longer in the source list.
    Moved(Option<Item>),
    ParticipantsSet(Vec<String>),
    Imported { checklist: usize, wishlist: usize },
    Reset,
    /// Fired while a remote snapshot was being applied; nothing written.
    Suppressed,
    /// Destructive intent without confirmation; nothing written.
    Cancelled,
}

impl IntentOutcome {
    /// Whether the intent reached the store.
    pub fn wrote(&self) -> bool {
        !matches!(self, Self::Suppressed | Self::Cancelled)
    }
}
