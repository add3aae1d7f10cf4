//! Room state store use-case service.
//!
//! # Responsibility
//! - Expose the point and bulk mutations of one room's two collections.
//! - Normalize every item before it reaches the repository.
//! - Seed new rooms and reset existing ones.
//!
//! # Invariants
//! - Each operation is exactly one repository batch, so other readers never
//!   observe partial results (notably an item in neither or both lists).
//! - Every mutation touches the room `updated_at` (done by the batch).
//! - Validation failures return before anything is written.

use crate::model::item::{normalize, normalize_for_write, Item, ItemId, ListKind, RawItem};
use crate::model::patch::ItemPatch;
use crate::model::room::{normalize_participants, RoomId, RoomMeta};
use crate::repo::batch::WriteBatch;
use crate::repo::room_repo::RoomRepository;
use crate::repo::{RepoError, RepoResult};
use crate::service::exchange::ImportPayload;
use log::{debug, info};
use std::sync::Arc;

/// Point-in-time read of a whole room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub meta: RoomMeta,
    pub checklist: Vec<Item>,
    pub wishlist: Vec<Item>,
}

/// Use-case facade over one room in a shared repository.
pub struct RoomStore<R: RoomRepository> {
    repo: Arc<R>,
    room_id: RoomId,
}

impl<R: RoomRepository> Clone for RoomStore<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            room_id: self.room_id.clone(),
        }
    }
}

impl<R: RoomRepository> RoomStore<R> {
    /// Binds a store to `room_id` without touching storage.
    pub fn new(repo: Arc<R>, room_id: RoomId) -> Self {
        Self { repo, room_id }
    }

    /// Binds a store, lazily creates the room and seeds it when empty.
    pub fn open(repo: Arc<R>, room_id: RoomId) -> RepoResult<Self> {
        let store = Self::new(repo, room_id);
        store.repo.ensure_room(&store.room_id)?;
        let seeded = store.seed_if_empty()?;
        info!("event=room_open module=store status=ok seeded={seeded}");
        Ok(store)
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// Inserts the seed set when both collections are empty.
    ///
    /// Emptiness is checked outside the write batch; two clients opening a
    /// fresh room at the same moment may both seed.
    pub fn seed_if_empty(&self) -> RepoResult<bool> {
        if self.repo.count_items(&self.room_id)? > 0 {
            return Ok(false);
        }
        let batch = seed_items()
            .into_iter()
            .fold(WriteBatch::new(), |batch, (kind, raw)| {
                batch.put(kind, normalize(&raw, kind))
            });
        self.repo.commit(&self.room_id, batch)?;
        info!("event=room_seed module=store status=ok");
        Ok(true)
    }

    /// Adds one item to `kind`.
    ///
    /// # Errors
    /// - `Validation(EmptyName)` when the name trims to empty.
    /// - `ListConflict` when the supplied id already lives in the other list.
    pub fn add(&self, kind: ListKind, raw: &RawItem) -> RepoResult<Item> {
        let item = normalize_for_write(raw, kind)?;
        self.repo
            .commit(&self.room_id, WriteBatch::new().put(kind, item.clone()))?;
        debug!("event=item_add module=store status=ok list={kind}");
        Ok(item)
    }

    /// Applies a field-level patch and returns the stored item.
    ///
    /// # Errors
    /// - `Validation` when a listed field is invalid.
    /// - `NotFound` when `id` is not in `kind`.
    pub fn update(&self, kind: ListKind, id: &ItemId, patch: &ItemPatch) -> RepoResult<Item> {
        let normalized = patch.normalize()?;
        let receipt = self.repo.commit(
            &self.room_id,
            WriteBatch::new().patch(kind, id.clone(), normalized),
        )?;
        debug!("event=item_update module=store status=ok list={kind}");
        let stored = receipt.written().next().cloned();
        stored.ok_or_else(|| {
            RepoError::InvalidData(format!("patch of {id} returned no stored item"))
        })
    }

    /// Deletes one item. Absent ids are a no-op returning `false`.
    pub fn delete(&self, kind: ListKind, id: &ItemId) -> RepoResult<bool> {
        let receipt = self
            .repo
            .commit(&self.room_id, WriteBatch::new().delete(kind, id.clone()))?;
        let removed = receipt.deleted_any();
        debug!("event=item_delete module=store status=ok list={kind} removed={removed}");
        Ok(removed)
    }

    /// Moves an item out of `from` into the other list under the same id.
    ///
    /// Returns `None` when `id` is not in `from`. Entering the wishlist
    /// resets `done`.
    pub fn move_item(&self, id: &ItemId, from: ListKind) -> RepoResult<Option<Item>> {
        let receipt = self
            .repo
            .commit(&self.room_id, WriteBatch::new().move_item(from, id.clone()))?;
        let moved = receipt.moved().cloned();
        match &moved {
            Some(_) => debug!(
                "event=item_move module=store status=ok from={from} to={}",
                from.other()
            ),
            None => {
                debug!("event=item_move module=store status=skipped reason=not_found list={from}")
            }
        }
        Ok(moved)
    }

    /// Replaces the whole `kind` collection with `raws`.
    pub fn replace_all(&self, kind: ListKind, raws: &[RawItem]) -> RepoResult<Vec<Item>> {
        let items = normalize_all(raws, kind)?;
        let batch = items
            .iter()
            .cloned()
            .fold(WriteBatch::new().clear(kind), |batch, item| {
                batch.put(kind, item)
            });
        self.repo.commit(&self.room_id, batch)?;
        info!(
            "event=list_replace module=store status=ok list={kind} count={}",
            items.len()
        );
        Ok(items)
    }

    /// Replaces both collections in one batch.
    pub fn replace_both(
        &self,
        checklist: &[RawItem],
        wishlist: &[RawItem],
    ) -> RepoResult<RoomSnapshot> {
        let checklist = normalize_all(checklist, ListKind::Checklist)?;
        let wishlist = normalize_all(wishlist, ListKind::Wishlist)?;
        let batch = WriteBatch::new()
            .clear(ListKind::Checklist)
            .clear(ListKind::Wishlist);
        let batch = checklist
            .iter()
            .cloned()
            .fold(batch, |batch, item| batch.put(ListKind::Checklist, item));
        let batch = wishlist
            .iter()
            .cloned()
            .fold(batch, |batch, item| batch.put(ListKind::Wishlist, item));
        self.repo.commit(&self.room_id, batch)?;
        info!(
            "event=room_replace module=store status=ok checklist={} wishlist={}",
            checklist.len(),
            wishlist.len()
        );
        self.snapshot()
    }

    /// Applies a validated import payload.
    pub fn import(&self, payload: &ImportPayload) -> RepoResult<RoomSnapshot> {
        self.replace_both(&payload.checklist, &payload.wishlist)
    }

    /// Clears both collections and re-inserts the seed set in one batch.
    pub fn reset(&self) -> RepoResult<()> {
        let batch = WriteBatch::new()
            .clear(ListKind::Checklist)
            .clear(ListKind::Wishlist);
        let batch = seed_items()
            .into_iter()
            .fold(batch, |batch, (kind, raw)| batch.put(kind, normalize(&raw, kind)));
        self.repo.commit(&self.room_id, batch)?;
        info!("event=room_reset module=store status=ok");
        Ok(())
    }

    /// Persists the explicit roster and returns it normalized.
    pub fn set_participants<I, S>(&self, names: I) -> RepoResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let participants = normalize_participants(names);
        self.repo.commit(
            &self.room_id,
            WriteBatch::new().set_participants(participants.clone()),
        )?;
        debug!(
            "event=participants_set module=store status=ok count={}",
            participants.len()
        );
        Ok(participants)
    }

    pub fn list(&self, kind: ListKind) -> RepoResult<Vec<Item>> {
        self.repo.list_items(&self.room_id, kind)
    }

    pub fn meta(&self) -> RepoResult<RoomMeta> {
        self.repo.ensure_room(&self.room_id)
    }

    pub fn snapshot(&self) -> RepoResult<RoomSnapshot> {
        Ok(RoomSnapshot {
            meta: self.meta()?,
            checklist: self.list(ListKind::Checklist)?,
            wishlist: self.list(ListKind::Wishlist)?,
        })
    }
}

/// Fixed seed set inserted into new or reset rooms.
pub fn seed_items() -> Vec<(ListKind, RawItem)> {
    vec![
        (
            ListKind::Checklist,
            RawItem::named("Charcoal").with_category("food"),
        ),
        (
            ListKind::Checklist,
            RawItem::named("Tongs").with_category("equipment"),
        ),
        (
            ListKind::Checklist,
            RawItem::named("Paper plates").with_category("misc"),
        ),
        (
            ListKind::Wishlist,
            RawItem::named("Portable fan")
                .with_category("equipment")
                .with_note("If outdoor super hot"),
        ),
    ]
}

fn normalize_all(raws: &[RawItem], kind: ListKind) -> RepoResult<Vec<Item>> {
    raws.iter()
        .map(|raw| normalize_for_write(raw, kind).map_err(RepoError::from))
        .collect()
}
