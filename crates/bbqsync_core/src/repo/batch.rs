//! Atomic multi-document write batches.

use crate::model::item::{Item, ItemId, ListKind};
use crate::model::patch::NormalizedPatch;

/// One document mutation inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert or replace an item in `kind`.
    Put { kind: ListKind, item: Item },
    /// Read-modify-write of listed fields; fails if the item is absent.
    Patch {
        kind: ListKind,
        id: ItemId,
        patch: NormalizedPatch,
    },
    /// Point delete; absent ids are a no-op.
    Delete { kind: ListKind, id: ItemId },
    /// Delete every item of `kind`.
    Clear { kind: ListKind },
    /// Relocate an item from `from` into the other list, reading it inside
    /// the transaction. An absent source is a no-op.
    Move { from: ListKind, id: ItemId },
    /// Replace the explicit participant roster (already normalized).
    SetParticipants(Vec<String>),
}

impl WriteOp {
    /// Collections touched by this op.
    pub fn collections(&self) -> Vec<ListKind> {
        match self {
            Self::Put { kind, .. }
            | Self::Patch { kind, .. }
            | Self::Delete { kind, .. }
            | Self::Clear { kind } => vec![*kind],
            Self::Move { from, .. } => vec![*from, from.other()],
            Self::SetParticipants(_) => Vec::new(),
        }
    }
}

/// Ordered list of ops committed all-or-nothing.
///
/// Committing also touches the room `updated_at`, so an empty batch is a
/// pure touch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, kind: ListKind, item: Item) -> Self {
        self.ops.push(WriteOp::Put { kind, item });
        self
    }

    pub fn patch(mut self, kind: ListKind, id: ItemId, patch: NormalizedPatch) -> Self {
        self.ops.push(WriteOp::Patch { kind, id, patch });
        self
    }

    pub fn delete(mut self, kind: ListKind, id: ItemId) -> Self {
        self.ops.push(WriteOp::Delete { kind, id });
        self
    }

    pub fn move_item(mut self, from: ListKind, id: ItemId) -> Self {
        self.ops.push(WriteOp::Move { from, id });
        self
    }

    pub fn clear(mut self, kind: ListKind) -> Self {
        self.ops.push(WriteOp::Clear { kind });
        self
    }

    pub fn set_participants(mut self, participants: Vec<String>) -> Self {
        self.ops.push(WriteOp::SetParticipants(participants));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Result of one committed op, in batch order.
#[derive(Debug, Clone, PartialEq)]
pub enum OpOutcome {
    /// Item as stored after a `Put` or `Patch`.
    Written(Item),
    /// Whether a `Delete` removed a row.
    Deleted(bool),
    /// Rows removed by a `Clear`.
    Cleared(usize),
    /// Item as stored in its new list, or `None` if the source was gone.
    Moved(Option<Item>),
    ParticipantsSet,
}

/// Per-op outcomes of a committed batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReceipt {
    pub outcomes: Vec<OpOutcome>,
}

impl BatchReceipt {
    /// Items written by the batch, in op order.
    pub fn written(&self) -> impl Iterator<Item = &Item> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            OpOutcome::Written(item) => Some(item),
            _ => None,
        })
    }

    /// First `Move` outcome of the batch.
    pub fn moved(&self) -> Option<&Item> {
        self.outcomes.iter().find_map(|outcome| match outcome {
            OpOutcome::Moved(item) => item.as_ref(),
            _ => None,
        })
    }

    /// Whether any `Delete` op removed a row.
    pub fn deleted_any(&self) -> bool {
        self.outcomes
            .iter()
            .any(|outcome| matches!(outcome, OpOutcome::Deleted(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchReceipt, OpOutcome, WriteBatch};
    use crate::model::item::{normalize, ItemId, ListKind, RawItem};

    #[test]
    fn move_touches_both_collections() {
        let batch = WriteBatch::new().move_item(ListKind::Checklist, ItemId::mint());
        assert_eq!(
            batch.ops()[0].collections(),
            vec![ListKind::Checklist, ListKind::Wishlist]
        );
    }

    #[test]
    fn receipt_reports_moved_item_only_when_present() {
        let item = normalize(&RawItem::named("Fan"), ListKind::Wishlist);
        let missing = BatchReceipt {
            outcomes: vec![OpOutcome::Moved(None)],
        };
        assert!(missing.moved().is_none());

        let present = BatchReceipt {
            outcomes: vec![OpOutcome::Moved(Some(item.clone()))],
        };
        assert_eq!(present.moved(), Some(&item));
        assert!(!present.deleted_any());
    }
}
