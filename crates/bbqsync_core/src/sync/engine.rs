//! Per-client sync engine.
//!
//! # Responsibility
//! - Attach one client to one room and own its subscriptions.
//! - Apply change-feed snapshots to the local view in arrival order.
//! - Dispatch local intents to the room store.
//!
//! # Invariants
//! - The local view changes only through `pump`; writes never patch it
//!   directly, so a failed write leaves the last-known-good view.
//! - While a remote snapshot is applied (`SyncPhase::ApplyingRemote`),
//!   `dispatch` writes nothing and returns `IntentOutcome::Suppressed`.
//! - Re-attaching tears down every old subscription and drops queued events
//!   before the new room is opened.

use crate::model::item::ListKind;
use crate::model::room::{parse_participants, RoomId};
use crate::repo::feed::{ChangeEvent, ChangePayload, FeedTopic, Subscription};
use crate::repo::room_repo::RoomRepository;
use crate::service::exchange::{parse_import, ExportDocument};
use crate::service::quick_add::parse_quick_add;
use crate::service::room_store::RoomStore;
use crate::sync::intent::{IntentOutcome, LocalIntent};
use crate::sync::{SyncError, SyncResult};
use crate::view::{DerivedView, ItemFilter, RoomView};
use chrono::Utc;
use log::{debug, info, warn};
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;
use uuid::Uuid;

/// Per-client identity used for log correlation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Re-entrancy phase of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    ApplyingRemote,
}

/// Re-render hook. Returned intents model change events fired by the UI
/// while it re-renders; they go through `dispatch` and are suppressed.
pub type ViewListener = Box<dyn FnMut(&DerivedView) -> Vec<LocalIntent> + Send>;

struct Attachment<R: RoomRepository> {
    store: RoomStore<R>,
    events: Receiver<ChangeEvent>,
    _subscriptions: Vec<Subscription>,
}

/// Bridges local intents and room change feeds for one client.
pub struct SyncEngine<R: RoomRepository> {
    client_id: ClientId,
    repo: Arc<R>,
    phase: SyncPhase,
    view: RoomView,
    checklist_filter: ItemFilter,
    wishlist_filter: ItemFilter,
    attachment: Option<Attachment<R>>,
    listener: Option<ViewListener>,
}

impl<R: RoomRepository> SyncEngine<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            client_id: ClientId::new(),
            repo,
            phase: SyncPhase::Idle,
            view: RoomView::default(),
            checklist_filter: ItemFilter::default(),
            wishlist_filter: ItemFilter::default(),
            attachment: None,
            listener: None,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Last-known room state.
    pub fn view(&self) -> &RoomView {
        &self.view
    }

    /// Room store of the current attachment.
    pub fn store(&self) -> Option<&RoomStore<R>> {
        self.attachment.as_ref().map(|attachment| &attachment.store)
    }

    pub fn set_view_listener<F>(&mut self, listener: F)
    where
        F: FnMut(&DerivedView) -> Vec<LocalIntent> + Send + 'static,
    {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_view_listener(&mut self) {
        self.listener = None;
    }

    pub fn set_filter(&mut self, kind: ListKind, filter: ItemFilter) {
        match kind {
            ListKind::Checklist => self.checklist_filter = filter,
            ListKind::Wishlist => self.wishlist_filter = filter,
        }
    }

    /// Full re-derivation of the current view with the active filters.
    pub fn derived(&self) -> DerivedView {
        self.view
            .derive(&self.checklist_filter, &self.wishlist_filter)
    }

    /// Switches this client to `room_id`.
    ///
    /// The first snapshot of each feed is queued before this returns; call
    /// [`SyncEngine::pump`] to apply it.
    pub fn attach(&mut self, room_id: RoomId) -> SyncResult<()> {
        self.detach();

        let store = RoomStore::open(Arc::clone(&self.repo), room_id.clone())?;
        let (sink, events) = channel();
        let subscriptions = FeedTopic::ALL
            .iter()
            .map(|topic| self.repo.subscribe(&room_id, *topic, sink.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        self.view = RoomView::new(room_id);
        self.attachment = Some(Attachment {
            store,
            events,
            _subscriptions: subscriptions,
        });
        info!(
            "event=sync_attach module=sync status=ok client={} feeds={}",
            self.client_id,
            FeedTopic::ALL.len()
        );
        Ok(())
    }

    /// Tears down subscriptions and drops queued events.
    pub fn detach(&mut self) {
        if self.attachment.take().is_some() {
            info!(
                "event=sync_detach module=sync status=ok client={}",
                self.client_id
            );
        }
    }

    /// Applies every queued change event in arrival order.
    ///
    /// Returns the number of events applied to the view.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let Some(event) = self.next_event() else {
                break;
            };
            if event.room_id != self.view.room_id {
                debug!(
                    "event=feed_discard module=sync status=skipped client={} reason=foreign_room",
                    self.client_id
                );
                continue;
            }
            self.apply_remote(event);
            applied += 1;
        }
        applied
    }

    fn next_event(&self) -> Option<ChangeEvent> {
        self.attachment
            .as_ref()
            .and_then(|attachment| attachment.events.try_recv().ok())
    }

    fn apply_remote(&mut self, event: ChangeEvent) {
        self.phase = SyncPhase::ApplyingRemote;
        let topic = event.payload.topic();
        match event.payload {
            ChangePayload::Collection { kind, items } => self.view.set_items(kind, items),
            ChangePayload::Meta(meta) => self.view.meta = Some(meta),
        }
        debug!(
            "event=feed_apply module=sync status=ok client={} topic={} seq={}",
            self.client_id,
            topic.label(),
            event.sequence
        );
        self.render();
        self.phase = SyncPhase::Idle;
    }

    fn render(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };
        let derived = self.derived();
        let echoed = listener(&derived);
        self.listener = Some(listener);

        for intent in echoed {
            // Suppressed while applying remote; a failure here is only logged.
            if let Err(err) = self.dispatch(intent) {
                warn!(
                    "event=intent_dispatch module=sync status=error client={} error_code={}",
                    self.client_id,
                    err.code()
                );
            }
        }
    }

    /// Routes one local intent to the room store.
    ///
    /// # Errors
    /// - `SyncError::NotAttached` before [`SyncEngine::attach`].
    /// - `SyncError::Repo` for validation, not-found and transport failures.
    pub fn dispatch(&mut self, intent: LocalIntent) -> SyncResult<IntentOutcome> {
        let label = intent.label();
        if self.phase == SyncPhase::ApplyingRemote {
            info!(
                "event=intent_suppressed module=sync status=skipped client={} intent={label}",
                self.client_id
            );
            return Ok(IntentOutcome::Suppressed);
        }

        let result = self.execute(intent);
        match &result {
            Ok(IntentOutcome::Cancelled) => info!(
                "event=intent_dispatch module=sync status=cancelled client={} intent={label}",
                self.client_id
            ),
            Ok(_) => debug!(
                "event=intent_dispatch module=sync status=ok client={} intent={label}",
                self.client_id
            ),
            Err(err) => warn!(
                "event=intent_dispatch module=sync status=error client={} intent={label} error_code={}",
                self.client_id,
                err.code()
            ),
        }
        result
    }

    fn execute(&self, intent: LocalIntent) -> SyncResult<IntentOutcome> {
        let store = self.store().ok_or(SyncError::NotAttached)?;
        let outcome = match intent {
            LocalIntent::Add { kind, raw } => IntentOutcome::Added(store.add(kind, &raw)?),
            LocalIntent::QuickAdd { kind, text } => {
                let parsed = parse_quick_add(&text)?;
                IntentOutcome::Added(store.add(kind, &parsed.into_raw())?)
            }
            LocalIntent::Update { kind, id, patch } => {
                IntentOutcome::Updated(store.update(kind, &id, &patch)?)
            }
            LocalIntent::Delete { confirmed: false, .. } => IntentOutcome::Cancelled,
            LocalIntent::Delete { kind, id, .. } => IntentOutcome::Deleted(store.delete(kind, &id)?),
            LocalIntent::Move { id, from } => IntentOutcome::Moved(store.move_item(&id, from)?),
            LocalIntent::SetParticipants(names) => {
                IntentOutcome::ParticipantsSet(store.set_participants(names)?)
            }
            LocalIntent::SetParticipantsText(text) => {
                IntentOutcome::ParticipantsSet(store.set_participants(parse_participants(&text))?)
            }
            LocalIntent::Import {
                confirmed: false, ..
            } => IntentOutcome::Cancelled,
            LocalIntent::Import { json, .. } => {
                let payload = parse_import(&json)?;
                let snapshot = store.import(&payload)?;
                IntentOutcome::Imported {
                    checklist: snapshot.checklist.len(),
                    wishlist: snapshot.wishlist.len(),
                }
            }
            LocalIntent::Reset { confirmed: false } => IntentOutcome::Cancelled,
            LocalIntent::Reset { confirmed: true } => {
                store.reset()?;
                IntentOutcome::Reset
            }
        };
        Ok(outcome)
    }

    /// Export document built from the current view.
    pub fn export(&self) -> ExportDocument {
        ExportDocument::new(
            self.view.room_id.clone(),
            self.view.checklist.clone(),
            self.view.wishlist.clone(),
            Utc::now(),
        )
    }
}

impl<R: RoomRepository> Drop for SyncEngine<R> {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::{SyncEngine, SyncPhase};
    use crate::db::open_db_in_memory;
    use crate::model::item::ListKind;
    use crate::model::room::RoomId;
    use crate::repo::room_repo::SqliteRoomRepository;
    use crate::sync::{IntentOutcome, LocalIntent, SyncError};
    use std::sync::Arc;

    fn engine() -> SyncEngine<SqliteRoomRepository> {
        let repo = SqliteRoomRepository::try_new(open_db_in_memory().unwrap()).unwrap();
        SyncEngine::new(Arc::new(repo))
    }

    #[test]
    fn dispatch_before_attach_is_rejected() {
        let mut engine = engine();
        let err = engine
            .dispatch(LocalIntent::QuickAdd {
                kind: ListKind::Checklist,
                text: "Ice".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::NotAttached));
    }

    #[test]
    fn attach_queues_one_snapshot_per_feed() {
        let mut engine = engine();
        engine.attach(RoomId::default()).unwrap();
        assert_eq!(engine.pump(), 3);
        assert_eq!(engine.view().checklist.len(), 3);
        assert!(engine.view().meta.is_some());
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[test]
    fn unconfirmed_reset_is_cancelled() {
        let mut engine = engine();
        engine.attach(RoomId::default()).unwrap();
        engine.pump();
        let outcome = engine
            .dispatch(LocalIntent::Reset { confirmed: false })
            .unwrap();
        assert_eq!(outcome, IntentOutcome::Cancelled);
        assert_eq!(engine.pump(), 0);
    }
}
