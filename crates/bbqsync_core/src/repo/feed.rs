//! Change-feed registry for room collections and metadata.
//!
//! # Responsibility
//! - Track long-lived listeners per `(room, topic)`.
//! - Fan out whole snapshots to listeners in publish order.
//!
//! # Invariants
//! - Dropping a `Subscription` unregisters it; no later event reaches it.
//! - Listeners whose receiving side is gone are pruned on the next publish.

use crate::model::item::{Item, ListKind};
use crate::model::room::{RoomId, RoomMeta};
use log::debug;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, Weak};

/// Feed a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeedTopic {
    Collection(ListKind),
    Meta,
}

impl FeedTopic {
    pub const ALL: [FeedTopic; 3] = [
        FeedTopic::Collection(ListKind::Checklist),
        FeedTopic::Collection(ListKind::Wishlist),
        FeedTopic::Meta,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Collection(kind) => kind.as_str(),
            Self::Meta => "meta",
        }
    }
}

/// Snapshot payload of one emission.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangePayload {
    /// Full collection ordered by `created_at` descending.
    Collection { kind: ListKind, items: Vec<Item> },
    Meta(RoomMeta),
}

impl ChangePayload {
    pub fn topic(&self) -> FeedTopic {
        match self {
            Self::Collection { kind, .. } => FeedTopic::Collection(*kind),
            Self::Meta(_) => FeedTopic::Meta,
        }
    }
}

/// One change-feed emission.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub room_id: RoomId,
    /// Monotonic per repository; orders emissions across topics.
    pub sequence: u64,
    pub payload: ChangePayload,
}

struct Listener {
    id: u64,
    room_id: RoomId,
    topic: FeedTopic,
    sink: Sender<ChangeEvent>,
}

/// Listener table shared by a repository and its subscriptions.
#[derive(Default)]
pub struct FeedRegistry {
    next_listener_id: u64,
    next_sequence: u64,
    listeners: Vec<Listener>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns whether anybody listens on `(room_id, topic)`.
    pub fn has_listeners(&self, room_id: &RoomId, topic: FeedTopic) -> bool {
        self.listeners
            .iter()
            .any(|listener| listener.topic == topic && &listener.room_id == room_id)
    }

    /// Registers a listener and returns its handle.
    ///
    /// `registry` must be the `Arc` that owns `self`; the handle keeps only a
    /// weak reference to it.
    pub fn register(
        registry: &Arc<Mutex<FeedRegistry>>,
        guard: &mut FeedRegistry,
        room_id: RoomId,
        topic: FeedTopic,
        sink: Sender<ChangeEvent>,
    ) -> Subscription {
        guard.next_listener_id += 1;
        let id = guard.next_listener_id;
        guard.listeners.push(Listener {
            id,
            room_id: room_id.clone(),
            topic,
            sink,
        });
        debug!(
            "event=feed_subscribe module=feed status=ok topic={} listener={id}",
            topic.label()
        );
        Subscription {
            id,
            room_id,
            topic,
            registry: Arc::downgrade(registry),
        }
    }

    /// Sends one snapshot to a single listener.
    pub fn send_to(&mut self, listener_id: u64, room_id: &RoomId, payload: ChangePayload) {
        let sequence = self.bump_sequence();
        let event = ChangeEvent {
            room_id: room_id.clone(),
            sequence,
            payload,
        };
        self.listeners
            .retain(|listener| listener.id != listener_id || listener.sink.send(event.clone()).is_ok());
    }

    /// Sends one snapshot to every listener of its topic in `room_id`.
    ///
    /// Returns the number of listeners reached.
    pub fn publish(&mut self, room_id: &RoomId, payload: ChangePayload) -> usize {
        let topic = payload.topic();
        let sequence = self.bump_sequence();
        let event = ChangeEvent {
            room_id: room_id.clone(),
            sequence,
            payload,
        };

        let mut delivered = 0;
        self.listeners.retain(|listener| {
            if listener.topic != topic || &listener.room_id != room_id {
                return true;
            }
            let alive = listener.sink.send(event.clone()).is_ok();
            if alive {
                delivered += 1;
            }
            alive
        });
        delivered
    }

    fn unregister(&mut self, id: u64) {
        self.listeners.retain(|listener| listener.id != id);
    }

    fn bump_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

/// Handle for one registered listener. Dropping it tears the feed down.
pub struct Subscription {
    id: u64,
    room_id: RoomId,
    topic: FeedTopic,
    registry: Weak<Mutex<FeedRegistry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn topic(&self) -> FeedTopic {
        self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // A poisoned registry still holds valid listener rows.
        let mut guard = match registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.unregister(self.id);
        debug!(
            "event=feed_unsubscribe module=feed status=ok topic={} listener={}",
            self.topic.label(),
            self.id
        );
    }
}
