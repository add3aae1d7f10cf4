//! Room document store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist per-room item collections and room metadata.
//! - Commit multi-document batches atomically.
//! - Emit whole-collection snapshots to change-feed listeners after commit.
//!
//! # Invariants
//! - Write paths store only normalized items; read paths reject rows that
//!   violate the item schema instead of masking them.
//! - An item id lives in at most one collection of a room.
//! - Snapshots are published under the connection lock, so per-topic
//!   emission order equals commit order.

use crate::model::item::{normalize_at, Item, ItemId, ListKind};
use crate::model::room::{RoomId, RoomMeta};
use crate::repo::batch::{BatchReceipt, OpOutcome, WriteBatch, WriteOp};
use crate::repo::feed::{ChangeEvent, ChangePayload, FeedRegistry, FeedTopic, Subscription};
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    name,
    category,
    qty,
    note,
    who,
    want,
    cost,
    bought,
    done,
    created_at,
    updated_at
FROM items";

/// Document store contract consumed by the room store and sync engine.
///
/// Implementations must be shareable between clients of the same process;
/// cross-client ordering is last-write-wins per document.
pub trait RoomRepository: Send + Sync {
    /// Creates the room document if missing and returns its metadata.
    fn ensure_room(&self, room_id: &RoomId) -> RepoResult<RoomMeta>;

    /// Returns metadata for an existing room.
    fn room_meta(&self, room_id: &RoomId) -> RepoResult<Option<RoomMeta>>;

    /// Lists one collection ordered by `created_at` descending.
    fn list_items(&self, room_id: &RoomId, kind: ListKind) -> RepoResult<Vec<Item>>;

    /// Gets one item from one collection.
    fn get_item(&self, room_id: &RoomId, kind: ListKind, id: &ItemId) -> RepoResult<Option<Item>>;

    /// Counts items across both collections.
    fn count_items(&self, room_id: &RoomId) -> RepoResult<usize>;

    /// Commits a batch atomically and touches the room `updated_at`.
    fn commit(&self, room_id: &RoomId, batch: WriteBatch) -> RepoResult<BatchReceipt>;

    /// Registers a change-feed listener.
    ///
    /// The current snapshot is delivered to `sink` before this returns.
    fn subscribe(
        &self,
        room_id: &RoomId,
        topic: FeedTopic,
        sink: Sender<ChangeEvent>,
    ) -> RepoResult<Subscription>;
}

/// SQLite-backed room document store shared by every client in a process.
pub struct SqliteRoomRepository {
    conn: Mutex<Connection>,
    feeds: Arc<Mutex<FeedRegistry>>,
}

impl SqliteRoomRepository {
    /// Wraps a migrated connection.
    ///
    /// # Errors
    /// - `RepoError::InvalidData` when the room schema is missing.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            feeds: Arc::new(Mutex::new(FeedRegistry::new())),
        })
    }

    /// Number of live change-feed listeners.
    pub fn listener_count(&self) -> RepoResult<usize> {
        Ok(self.lock_feeds()?.listener_count())
    }

    fn lock_conn(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RepoError::LockPoisoned("room connection"))
    }

    fn lock_feeds(&self) -> RepoResult<MutexGuard<'_, FeedRegistry>> {
        self.feeds
            .lock()
            .map_err(|_| RepoError::LockPoisoned("change feed"))
    }

    fn publish_topics(&self, conn: &Connection, room_id: &RoomId, topics: &BTreeSet<FeedTopic>) {
        let mut feeds = match self.lock_feeds() {
            Ok(feeds) => feeds,
            Err(err) => {
                error!(
                    "event=feed_publish module=repo status=error error_code={} error={err}",
                    err.code()
                );
                return;
            }
        };
        for topic in topics {
            if !feeds.has_listeners(room_id, *topic) {
                continue;
            }
            match load_snapshot(conn, room_id, *topic) {
                Ok(payload) => {
                    feeds.publish(room_id, payload);
                }
                // The batch is durable; listeners catch up on the next commit.
                Err(err) => warn!(
                    "event=feed_publish module=repo status=error topic={} error_code={} error={err}",
                    topic.label(),
                    err.code()
                ),
            }
        }
    }
}

impl RoomRepository for SqliteRoomRepository {
    fn ensure_room(&self, room_id: &RoomId) -> RepoResult<RoomMeta> {
        let conn = self.lock_conn()?;
        let created = insert_room_if_missing(&conn, room_id, Utc::now())?;
        if created {
            info!("event=room_create module=repo status=ok");
        }
        load_meta(&conn, room_id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("room `{room_id}` missing after upsert"))
        })
    }

    fn room_meta(&self, room_id: &RoomId) -> RepoResult<Option<RoomMeta>> {
        let conn = self.lock_conn()?;
        load_meta(&conn, room_id)
    }

    fn list_items(&self, room_id: &RoomId, kind: ListKind) -> RepoResult<Vec<Item>> {
        let conn = self.lock_conn()?;
        load_items(&conn, room_id, kind)
    }

    fn get_item(&self, room_id: &RoomId, kind: ListKind, id: &ItemId) -> RepoResult<Option<Item>> {
        let conn = self.lock_conn()?;
        load_item(&conn, room_id, kind, id)
    }

    fn count_items(&self, room_id: &RoomId) -> RepoResult<usize> {
        let conn = self.lock_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE room_id = ?1;",
            [room_id.as_str()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative item count {count}")))
    }

    fn commit(&self, room_id: &RoomId, batch: WriteBatch) -> RepoResult<BatchReceipt> {
        let started_at = Instant::now();
        let op_count = batch.len();
        let mut conn = self.lock_conn()?;

        let result = commit_in_tx(&mut conn, room_id, batch, Utc::now());
        match result {
            Ok((receipt, topics)) => {
                info!(
                    "event=batch_commit module=repo status=ok ops={op_count} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                self.publish_topics(&conn, room_id, &topics);
                Ok(receipt)
            }
            Err(err) => {
                error!(
                    "event=batch_commit module=repo status=error ops={op_count} duration_ms={} error_code={} error={err}",
                    started_at.elapsed().as_millis(),
                    err.code()
                );
                Err(err)
            }
        }
    }

    fn subscribe(
        &self,
        room_id: &RoomId,
        topic: FeedTopic,
        sink: Sender<ChangeEvent>,
    ) -> RepoResult<Subscription> {
        let conn = self.lock_conn()?;
        let snapshot = load_snapshot(&conn, room_id, topic)?;
        let mut feeds = self.lock_feeds()?;
        let subscription =
            FeedRegistry::register(&self.feeds, &mut feeds, room_id.clone(), topic, sink);
        feeds.send_to(subscription.id(), room_id, snapshot);
        Ok(subscription)
    }
}

fn commit_in_tx(
    conn: &mut Connection,
    room_id: &RoomId,
    batch: WriteBatch,
    now: DateTime<Utc>,
) -> RepoResult<(BatchReceipt, BTreeSet<FeedTopic>)> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    insert_room_if_missing(&tx, room_id, now)?;

    let mut topics = BTreeSet::from([FeedTopic::Meta]);
    let mut receipt = BatchReceipt::default();
    for op in batch.into_ops() {
        topics.extend(op.collections().into_iter().map(FeedTopic::Collection));
        receipt.outcomes.push(apply_op(&tx, room_id, op, now)?);
    }

    tx.execute(
        "UPDATE rooms SET updated_at = ?2 WHERE room_id = ?1;",
        params![room_id.as_str(), now.timestamp_millis()],
    )?;
    tx.commit()?;
    Ok((receipt, topics))
}

fn apply_op(
    tx: &Transaction<'_>,
    room_id: &RoomId,
    op: WriteOp,
    now: DateTime<Utc>,
) -> RepoResult<OpOutcome> {
    match op {
        WriteOp::Put { kind, item } => {
            upsert_item(tx, room_id, kind, &item)?;
            Ok(OpOutcome::Written(item))
        }
        WriteOp::Patch { kind, id, patch } => {
            let mut item = load_item(tx, room_id, kind, &id)?
                .ok_or_else(|| RepoError::NotFound { kind, id: id.clone() })?;
            patch.apply_to(&mut item, kind, now);
            upsert_item(tx, room_id, kind, &item)?;
            Ok(OpOutcome::Written(item))
        }
        WriteOp::Delete { kind, id } => {
            let changed = tx.execute(
                "DELETE FROM items WHERE room_id = ?1 AND list_kind = ?2 AND id = ?3;",
                params![room_id.as_str(), kind.as_str(), id.as_str()],
            )?;
            Ok(OpOutcome::Deleted(changed > 0))
        }
        WriteOp::Move { from, id } => {
            let Some(source) = load_item(tx, room_id, from, &id)? else {
                return Ok(OpOutcome::Moved(None));
            };
            tx.execute(
                "DELETE FROM items WHERE room_id = ?1 AND list_kind = ?2 AND id = ?3;",
                params![room_id.as_str(), from.as_str(), id.as_str()],
            )?;
            let to = from.other();
            let moved = normalize_at(&source.to_raw(), to, now);
            upsert_item(tx, room_id, to, &moved)?;
            Ok(OpOutcome::Moved(Some(moved)))
        }
        WriteOp::Clear { kind } => {
            let changed = tx.execute(
                "DELETE FROM items WHERE room_id = ?1 AND list_kind = ?2;",
                params![room_id.as_str(), kind.as_str()],
            )?;
            Ok(OpOutcome::Cleared(changed))
        }
        WriteOp::SetParticipants(participants) => {
            let encoded = serde_json::to_string(&participants)
                .map_err(|err| RepoError::InvalidData(format!("participants encode: {err}")))?;
            tx.execute(
                "UPDATE rooms SET participants = ?2 WHERE room_id = ?1;",
                params![room_id.as_str(), encoded],
            )?;
            Ok(OpOutcome::ParticipantsSet)
        }
    }
}

fn upsert_item(conn: &Connection, room_id: &RoomId, kind: ListKind, item: &Item) -> RepoResult<()> {
    let changed = conn.execute(
        "INSERT INTO items (
            room_id,
            id,
            list_kind,
            name,
            category,
            qty,
            note,
            who,
            want,
            cost,
            bought,
            done,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT (room_id, id) DO UPDATE SET
            name = excluded.name,
            category = excluded.category,
            qty = excluded.qty,
            note = excluded.note,
            who = excluded.who,
            want = excluded.want,
            cost = excluded.cost,
            bought = excluded.bought,
            done = excluded.done,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        WHERE items.list_kind = excluded.list_kind;",
        params![
            room_id.as_str(),
            item.id.as_str(),
            kind.as_str(),
            item.name.as_str(),
            item.category.as_str(),
            i64::from(item.qty),
            item.note.as_str(),
            item.who.as_str(),
            item.want.as_str(),
            item.cost,
            bool_to_int(item.bought),
            bool_to_int(item.done),
            item.created_at.timestamp_millis(),
            item.updated_at.timestamp_millis(),
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::ListConflict {
            kind,
            id: item.id.clone(),
        });
    }
    Ok(())
}

fn insert_room_if_missing(conn: &Connection, room_id: &RoomId, now: DateTime<Utc>) -> RepoResult<bool> {
    let millis = now.timestamp_millis();
    let changed = conn.execute(
        "INSERT OR IGNORE INTO rooms (room_id, participants, created_at, updated_at)
         VALUES (?1, '[]', ?2, ?2);",
        params![room_id.as_str(), millis],
    )?;
    Ok(changed > 0)
}

fn load_snapshot(conn: &Connection, room_id: &RoomId, topic: FeedTopic) -> RepoResult<ChangePayload> {
    match topic {
        FeedTopic::Collection(kind) => Ok(ChangePayload::Collection {
            kind,
            items: load_items(conn, room_id, kind)?,
        }),
        FeedTopic::Meta => {
            let meta = load_meta(conn, room_id)?.ok_or_else(|| {
                RepoError::InvalidData(format!("room `{room_id}` has no metadata document"))
            })?;
            Ok(ChangePayload::Meta(meta))
        }
    }
}

fn load_meta(conn: &Connection, room_id: &RoomId) -> RepoResult<Option<RoomMeta>> {
    let row = conn
        .query_row(
            "SELECT participants, created_at, updated_at FROM rooms WHERE room_id = ?1;",
            [room_id.as_str()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            },
        )
        .optional()?;

    let Some((participants_json, created_at, updated_at)) = row else {
        return Ok(None);
    };
    let participants: Vec<String> = serde_json::from_str(&participants_json).map_err(|err| {
        RepoError::InvalidData(format!("invalid participants json in rooms.participants: {err}"))
    })?;

    Ok(Some(RoomMeta {
        room_id: room_id.clone(),
        participants,
        created_at: parse_millis(created_at, "rooms.created_at")?,
        updated_at: parse_millis(updated_at, "rooms.updated_at")?,
    }))
}

fn load_items(conn: &Connection, room_id: &RoomId, kind: ListKind) -> RepoResult<Vec<Item>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL}
         WHERE room_id = ?1 AND list_kind = ?2
         ORDER BY created_at DESC, rowid ASC;"
    ))?;
    let mut rows = stmt.query(params![room_id.as_str(), kind.as_str()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_item_row(row, kind)?);
    }
    Ok(items)
}

fn load_item(
    conn: &Connection,
    room_id: &RoomId,
    kind: ListKind,
    id: &ItemId,
) -> RepoResult<Option<Item>> {
    let mut stmt = conn.prepare(&format!(
        "{ITEM_SELECT_SQL}
         WHERE room_id = ?1 AND list_kind = ?2 AND id = ?3;"
    ))?;
    let mut rows = stmt.query(params![room_id.as_str(), kind.as_str(), id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_item_row(row, kind)?)),
        None => Ok(None),
    }
}

fn parse_item_row(row: &Row<'_>, kind: ListKind) -> RepoResult<Item> {
    let id_text: String = row.get("id")?;
    let id = ItemId::parse(&id_text)
        .ok_or_else(|| RepoError::InvalidData("blank id in items.id".to_string()))?;

    let qty_raw: i64 = row.get("qty")?;
    let qty = u32::try_from(qty_raw)
        .ok()
        .filter(|qty| *qty >= 1)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid qty `{qty_raw}` in items.qty")))?;

    let cost: f64 = row.get("cost")?;
    if !cost.is_finite() || cost < 0.0 {
        return Err(RepoError::InvalidData(format!("invalid cost `{cost}` in items.cost")));
    }

    let item = Item {
        id,
        name: row.get("name")?,
        category: row.get("category")?,
        qty,
        note: row.get("note")?,
        who: row.get("who")?,
        want: row.get("want")?,
        cost,
        bought: int_to_bool(row.get("bought")?, "items.bought")?,
        done: int_to_bool(row.get("done")?, "items.done")?,
        created_at: parse_millis(row.get("created_at")?, "items.created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "items.updated_at")?,
    };

    if item.cost > 0.0 && !item.bought {
        return Err(RepoError::InvalidData(format!(
            "item {} has cost but is not bought",
            item.id
        )));
    }
    if kind == ListKind::Wishlist && item.done {
        return Err(RepoError::InvalidData(format!(
            "wishlist item {} is marked done",
            item.id
        )));
    }
    Ok(item)
}

fn parse_millis(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

fn int_to_bool(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    for table in ["rooms", "items"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::InvalidData(format!(
                "required table `{table}` is missing; open the connection through db::open_db"
            )));
        }
    }
    Ok(())
}
