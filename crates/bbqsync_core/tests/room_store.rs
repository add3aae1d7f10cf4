use bbqsync_core::repo::batch::{BatchReceipt, WriteBatch, WriteOp};
use bbqsync_core::repo::feed::{ChangeEvent, FeedTopic, Subscription};
use bbqsync_core::repo::ErrorClass;
use bbqsync_core::{
    open_db_in_memory, Item, ItemId, ItemPatch, ListKind, RawItem, RepoError, RepoResult, RoomId,
    RoomMeta, RoomRepository, RoomStore, SqliteRoomRepository, ValidationError,
};
use std::sync::mpsc::Sender;
use std::sync::Arc;

/// Repository that lets another client delete the source item right before
/// every move batch commits.
struct RacingDeleteRepo {
    inner: SqliteRoomRepository,
}

impl RoomRepository for RacingDeleteRepo {
    fn ensure_room(&self, room_id: &RoomId) -> RepoResult<RoomMeta> {
        self.inner.ensure_room(room_id)
    }

    fn room_meta(&self, room_id: &RoomId) -> RepoResult<Option<RoomMeta>> {
        self.inner.room_meta(room_id)
    }

    fn list_items(&self, room_id: &RoomId, kind: ListKind) -> RepoResult<Vec<Item>> {
        self.inner.list_items(room_id, kind)
    }

    fn get_item(&self, room_id: &RoomId, kind: ListKind, id: &ItemId) -> RepoResult<Option<Item>> {
        self.inner.get_item(room_id, kind, id)
    }

    fn count_items(&self, room_id: &RoomId) -> RepoResult<usize> {
        self.inner.count_items(room_id)
    }

    fn commit(&self, room_id: &RoomId, batch: WriteBatch) -> RepoResult<BatchReceipt> {
        for op in batch.ops() {
            if let WriteOp::Move { from, id } = op {
                self.inner
                    .commit(room_id, WriteBatch::new().delete(*from, id.clone()))?;
            }
        }
        self.inner.commit(room_id, batch)
    }

    fn subscribe(
        &self,
        room_id: &RoomId,
        topic: FeedTopic,
        sink: Sender<ChangeEvent>,
    ) -> RepoResult<Subscription> {
        self.inner.subscribe(room_id, topic, sink)
    }
}

fn fresh_store() -> RoomStore<SqliteRoomRepository> {
    let repo = Arc::new(SqliteRoomRepository::try_new(open_db_in_memory().unwrap()).unwrap());
    let store = RoomStore::open(repo, RoomId::parse(Some("store-tests"))).unwrap();
    store.replace_both(&[], &[]).unwrap();
    store
}

#[test]
fn add_normalizes_and_enforces_cost_implies_bought() {
    let store = fresh_store();
    let item = store
        .add(
            ListKind::Checklist,
            &RawItem::named("  Wings ")
                .with("qty", "3.7")
                .with("cost", "18.5")
                .with("category", "   "),
        )
        .unwrap();

    assert_eq!(item.name, "Wings");
    assert_eq!(item.qty, 3);
    assert_eq!(item.cost, 18.5);
    assert!(item.bought);
    assert_eq!(item.category, "misc");
    assert_eq!(store.list(ListKind::Checklist).unwrap(), vec![item]);
}

#[test]
fn blank_name_is_rejected_before_any_write() {
    let store = fresh_store();
    let err = store
        .add(ListKind::Wishlist, &RawItem::named("   "))
        .unwrap_err();

    assert!(matches!(err, RepoError::Validation(ValidationError::EmptyName)));
    assert_eq!(err.class(), ErrorClass::Validation);
    assert!(store.list(ListKind::Wishlist).unwrap().is_empty());
}

#[test]
fn update_reasserts_invariants_and_keeps_identity() {
    let store = fresh_store();
    let added = store
        .add(ListKind::Wishlist, &RawItem::named("Fan"))
        .unwrap();

    let patched = store
        .update(
            ListKind::Wishlist,
            &added.id,
            &ItemPatch {
                cost: Some(25.into()),
                done: Some(true),
                ..ItemPatch::default()
            },
        )
        .unwrap();

    assert_eq!(patched.id, added.id);
    assert_eq!(patched.created_at, added.created_at);
    assert!(patched.bought);
    assert!(!patched.done);
    assert!(patched.updated_at >= added.updated_at);
}

#[test]
fn update_of_missing_item_is_not_found() {
    let store = fresh_store();
    let missing = ItemId::mint();
    let err = store
        .update(ListKind::Checklist, &missing, &ItemPatch::done(true))
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound { .. }));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn update_with_blank_name_is_rejected() {
    let store = fresh_store();
    let added = store
        .add(ListKind::Checklist, &RawItem::named("Tongs"))
        .unwrap();
    let err = store
        .update(ListKind::Checklist, &added.id, &ItemPatch::name("  "))
        .unwrap_err();

    assert!(matches!(err, RepoError::Validation(ValidationError::EmptyName)));
    assert_eq!(store.list(ListKind::Checklist).unwrap()[0].name, "Tongs");
}

#[test]
fn delete_is_a_noop_for_absent_ids() {
    let store = fresh_store();
    let added = store
        .add(ListKind::Checklist, &RawItem::named("Ice"))
        .unwrap();

    assert!(store.delete(ListKind::Checklist, &added.id).unwrap());
    assert!(!store.delete(ListKind::Checklist, &added.id).unwrap());
    assert!(!store.delete(ListKind::Wishlist, &ItemId::mint()).unwrap());
}

#[test]
fn move_relocates_under_same_id_and_resets_done() {
    let store = fresh_store();
    let added = store
        .add(
            ListKind::Checklist,
            &RawItem::named("Charcoal").with_done(true).with_cost(9.0),
        )
        .unwrap();

    let moved = store
        .move_item(&added.id, ListKind::Checklist)
        .unwrap()
        .unwrap();

    assert_eq!(moved.id, added.id);
    assert_eq!(moved.created_at, added.created_at);
    assert!(!moved.done);
    assert!(moved.bought);
    assert!(store.list(ListKind::Checklist).unwrap().is_empty());
    assert_eq!(store.list(ListKind::Wishlist).unwrap(), vec![moved.clone()]);

    let back = store
        .move_item(&moved.id, ListKind::Wishlist)
        .unwrap()
        .unwrap();
    assert_eq!(back.id, added.id);
    assert_eq!(store.list(ListKind::Checklist).unwrap().len(), 1);
    assert!(store.list(ListKind::Wishlist).unwrap().is_empty());
}

#[test]
fn move_of_absent_item_returns_none() {
    let store = fresh_store();
    assert!(store
        .move_item(&ItemId::mint(), ListKind::Wishlist)
        .unwrap()
        .is_none());
}

#[test]
fn move_after_a_competing_delete_does_not_resurrect_the_item() {
    let repo = Arc::new(RacingDeleteRepo {
        inner: SqliteRoomRepository::try_new(open_db_in_memory().unwrap()).unwrap(),
    });
    let store = RoomStore::new(repo, RoomId::parse(Some("move-race")));
    let added = store
        .add(ListKind::Checklist, &RawItem::named("Wings"))
        .unwrap();

    let moved = store.move_item(&added.id, ListKind::Checklist).unwrap();

    assert!(moved.is_none());
    assert!(store.list(ListKind::Checklist).unwrap().is_empty());
    assert!(store.list(ListKind::Wishlist).unwrap().is_empty());
}

#[test]
fn adding_an_id_owned_by_the_other_list_is_a_conflict() {
    let store = fresh_store();
    let added = store
        .add(ListKind::Checklist, &RawItem::named("Plates"))
        .unwrap();

    let err = store
        .add(
            ListKind::Wishlist,
            &RawItem::named("Plates again").with_id(&added.id),
        )
        .unwrap_err();
    assert!(matches!(err, RepoError::ListConflict { .. }));
    assert_eq!(err.class(), ErrorClass::Transport);
    assert!(store.list(ListKind::Wishlist).unwrap().is_empty());
}

#[test]
fn replace_all_swaps_one_collection_only() {
    let store = fresh_store();
    store
        .add(ListKind::Wishlist, &RawItem::named("Fan"))
        .unwrap();
    store
        .add(ListKind::Checklist, &RawItem::named("Old"))
        .unwrap();

    let replaced = store
        .replace_all(
            ListKind::Checklist,
            &[RawItem::named("Beer").with_qty(24), RawItem::named("Buns")],
        )
        .unwrap();

    assert_eq!(replaced.len(), 2);
    let names: Vec<_> = store
        .list(ListKind::Checklist)
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert!(names.contains(&"Beer".to_string()));
    assert!(!names.contains(&"Old".to_string()));
    assert_eq!(store.list(ListKind::Wishlist).unwrap().len(), 1);
}

#[test]
fn replace_all_with_a_blank_name_writes_nothing() {
    let store = fresh_store();
    store
        .add(ListKind::Checklist, &RawItem::named("Keep"))
        .unwrap();

    let err = store
        .replace_all(ListKind::Checklist, &[RawItem::named("ok"), RawItem::named("")])
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Validation);
    assert_eq!(store.list(ListKind::Checklist).unwrap()[0].name, "Keep");
}

#[test]
fn reset_restores_the_seed_set() {
    let store = fresh_store();
    store
        .add(ListKind::Checklist, &RawItem::named("Extra"))
        .unwrap();

    store.reset().unwrap();

    let snapshot = store.snapshot().unwrap();
    let mut checklist: Vec<_> = snapshot.checklist.iter().map(|item| item.name.as_str()).collect();
    checklist.sort_unstable();
    assert_eq!(checklist, vec!["Charcoal", "Paper plates", "Tongs"]);
    assert_eq!(snapshot.wishlist.len(), 1);
    assert_eq!(snapshot.wishlist[0].category, "equipment");
}

#[test]
fn participants_are_trimmed_deduped_and_persisted() {
    let store = fresh_store();
    let stored = store
        .set_participants([" Alice", "Bob", "", "Alice ", "陳大文"])
        .unwrap();

    assert_eq!(stored, vec!["Alice", "Bob", "陳大文"]);
    assert_eq!(store.meta().unwrap().participants, stored);
}

#[test]
fn every_mutation_touches_room_metadata() {
    let store = fresh_store();
    let repo = Arc::clone(store.repository());
    let before = repo.room_meta(store.room_id()).unwrap().unwrap().updated_at;

    std::thread::sleep(std::time::Duration::from_millis(5));
    store
        .add(ListKind::Checklist, &RawItem::named("Ice"))
        .unwrap();

    let after = repo.room_meta(store.room_id()).unwrap().unwrap().updated_at;
    assert!(after > before);
}
