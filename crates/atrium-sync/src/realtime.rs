// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Realtime reconciliation: merge pushed changes into the store.
//!
//! Events apply in delivery order and the last one wins. Insert and update
//! merge with patch semantics, so echoes of local writes are harmless and
//! never duplicate a record. A failing event is logged and dropped; the
//! channel keeps going.

use crate::session::Session;
use atrium_proto::{EventPayload, EventType, Topic};
use atrium_store::{value_id, StoreError, Upserted};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One pushed change.
#[derive(Debug, Clone, PartialEq)]
pub struct RealtimeEvent {
    /// Entity-type name.
    pub entity_type: String,
    /// Insert, update or delete.
    pub kind: EventType,
    /// Full or partial record, snake_case keys.
    pub record: Value,
}

impl From<EventPayload> for RealtimeEvent {
    fn from(p: EventPayload) -> Self {
        Self {
            entity_type: p.entity,
            kind: p.event_type,
            record: p.record,
        }
    }
}

/// Why an event was dropped.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Event belongs to another tenant.
    #[error("event for workspace {got} while bound to {active}")]
    ForeignWorkspace {
        /// Workspace named by the event.
        got: String,
        /// Active workspace.
        active: String,
    },
    /// Record carries no `id`.
    #[error("event record has no id")]
    MissingId,
    /// Store rejected the record (unknown entity type, undecodable record).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What an applied event did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Record was new.
    Inserted(usize),
    /// Record was present and got merged.
    Merged(usize),
    /// Record was removed.
    Removed,
    /// Delete for a record that is not cached.
    Absent,
}

/// Applies realtime events to a session's store.
#[derive(Debug, Clone)]
pub struct Reconciler {
    session: Session,
}

impl Reconciler {
    /// Reconcile into `session`.
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Apply one event and dirty its entity's regions.
    pub fn apply(&self, event: &RealtimeEvent) -> Result<Applied, ReconcileError> {
        let id = value_id(&event.record).ok_or(ReconcileError::MissingId)?;
        if let Some(ws) = event.record.get("workspace_id").and_then(Value::as_str) {
            let active = self.session.workspace();
            if ws != active.as_str() {
                return Err(ReconcileError::ForeignWorkspace {
                    got: ws.to_owned(),
                    active: active.to_string(),
                });
            }
        }
        let kind = event.entity_type.as_str();
        let applied = self.session.update_store(|store| match event.kind {
            EventType::Insert | EventType::Update => {
                store
                    .upsert_value(kind, &event.record)
                    .map(|u| match u {
                        Upserted::Inserted(i) => Applied::Inserted(i),
                        Upserted::Merged(i) => Applied::Merged(i),
                    })
            }
            EventType::Delete => store.remove_by_kind(kind, &id).map(|removed| {
                if removed {
                    Applied::Removed
                } else {
                    Applied::Absent
                }
            }),
        })?;
        if applied != Applied::Absent {
            self.session.mark_kind_dirty(kind);
        }
        debug!(kind, %id, event = ?event.kind, ?applied, "realtime event applied");
        Ok(applied)
    }

    /// Channel callback: apply, logging and dropping failures.
    pub fn on_event(&self, event: &RealtimeEvent) -> Option<Applied> {
        match self.apply(event) {
            Ok(applied) => Some(applied),
            Err(err) => {
                warn!(kind = %event.entity_type, event = ?event.kind, error = %err, "realtime event dropped");
                None
            }
        }
    }
}

/// Transport-level failure; the channel resubscribes after a backoff.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("realtime transport: {0}")]
pub struct TransportError(pub String);

/// What the transport delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A change notification.
    Event(RealtimeEvent),
    /// A frame that could not be decoded.
    Malformed(String),
    /// The host ended the stream.
    Closed,
}

/// Push subscription to one topic.
#[allow(async_fn_in_trait)]
pub trait RealtimeTransport {
    /// (Re)establish the subscription.
    async fn connect(&mut self, topic: &Topic) -> Result<(), TransportError>;

    /// Wait for the next frame.
    async fn next(&mut self) -> Result<Inbound, TransportError>;

    /// Unsubscribe and release the connection.
    async fn close(&mut self, topic: &Topic);
}

/// Counters reported when a channel stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Events merged into the store.
    pub applied: u64,
    /// Events or frames dropped.
    pub dropped: u64,
    /// Reconnects after a transport failure or close.
    pub resubscribes: u64,
}

/// Drives one topic's subscription until shutdown.
///
/// The topic follows the session: after [`Session::reset`] the channel
/// unsubscribes from the old workspace and subscribes to the new one, and
/// frames still arriving for the old topic are dropped.
pub struct RealtimeChannel<T> {
    transport: T,
    topic: Topic,
    generation: u64,
    backoff: Duration,
    session: Session,
    reconciler: Reconciler,
}

impl<T: RealtimeTransport> RealtimeChannel<T> {
    /// Channel for entity `entity` in the session's active workspace.
    pub fn new(session: &Session, entity: &str, transport: T) -> Self {
        Self {
            transport,
            topic: Topic::new(session.workspace().as_str(), entity),
            generation: session.generation(),
            backoff: session.prefs().resubscribe_backoff(),
            session: session.clone(),
            reconciler: Reconciler::new(session.clone()),
        }
    }

    /// Retarget the topic after a reset; true when it changed.
    async fn follow_workspace(&mut self, connected: bool) -> bool {
        let generation = self.session.generation();
        if generation == self.generation {
            return false;
        }
        if connected {
            self.transport.close(&self.topic).await;
        }
        let topic = Topic::new(self.session.workspace().as_str(), self.topic.entity.clone());
        let previous = std::mem::replace(&mut self.topic, topic);
        self.generation = generation;
        info!(from = %previous, to = %self.topic, "workspace changed, resubscribing");
        true
    }

    /// Subscribed topic.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Receive events until `shutdown` flips to true or its sender drops.
    /// Transport failures resubscribe after the fixed backoff.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ChannelStats {
        let mut stats = ChannelStats::default();
        let mut generations = self.session.watch_generation();
        let mut connected = false;
        let mut first_attempt = true;
        info!(topic = %self.topic, "realtime channel started");
        while !*shutdown.borrow() {
            if self.follow_workspace(connected).await {
                connected = false;
                first_attempt = true;
            }
            if !connected {
                if !first_attempt {
                    tokio::select! {
                        () = tokio::time::sleep(self.backoff) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() { break; }
                            continue;
                        }
                    }
                    self.follow_workspace(false).await;
                }
                first_attempt = false;
                match self.transport.connect(&self.topic).await {
                    Ok(()) => {
                        connected = true;
                        debug!(topic = %self.topic, "subscribed");
                    }
                    Err(err) => {
                        warn!(topic = %self.topic, error = %err, "subscribe failed");
                        stats.resubscribes += 1;
                        continue;
                    }
                }
            }
            tokio::select! {
                inbound = self.transport.next() => match inbound {
                    Ok(Inbound::Event(event)) => {
                        if self.generation != self.session.generation() {
                            debug!(topic = %self.topic, "event for a previous workspace dropped");
                            stats.dropped += 1;
                        } else if self.reconciler.on_event(&event).is_some() {
                            stats.applied += 1;
                        } else {
                            stats.dropped += 1;
                        }
                    }
                    Ok(Inbound::Malformed(reason)) => {
                        warn!(topic = %self.topic, %reason, "malformed realtime frame dropped");
                        stats.dropped += 1;
                    }
                    Ok(Inbound::Closed) => {
                        warn!(topic = %self.topic, "realtime stream closed, resubscribing");
                        connected = false;
                        stats.resubscribes += 1;
                    }
                    Err(err) => {
                        warn!(topic = %self.topic, error = %err, "realtime transport failed, resubscribing");
                        connected = false;
                        stats.resubscribes += 1;
                    }
                },
                _ = generations.changed() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() { break; }
                }
            }
        }
        self.transport.close(&self.topic).await;
        info!(topic = %self.topic, ?stats, "realtime channel stopped");
        stats
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use atrium_app_core::prefs::SyncPrefs;
    use atrium_app_core::render_port::Region;
    use atrium_store::{Entity, RecordId, WorkspaceId};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ticket {
        id: RecordId,
        workspace_id: WorkspaceId,
        subject: String,
        #[serde(default)]
        status: Option<String>,
    }

    impl Entity for Ticket {
        const KIND: &'static str = "tickets";
        fn id(&self) -> &RecordId {
            &self.id
        }
        fn workspace_id(&self) -> &WorkspaceId {
            &self.workspace_id
        }
    }

    fn event(kind: EventType, record: Value) -> RealtimeEvent {
        RealtimeEvent {
            entity_type: "tickets".into(),
            kind,
            record,
        }
    }

    fn reconciler() -> (Session, Reconciler) {
        let session = Session::new("ws".into(), SyncPrefs::default());
        session.register::<Ticket>([Region::Sidebar]);
        (session.clone(), Reconciler::new(session))
    }

    #[test]
    fn repeated_insert_is_idempotent() {
        let (session, r) = reconciler();
        let e = event(
            EventType::Insert,
            json!({"id": "t1", "workspace_id": "ws", "subject": "Printer on fire"}),
        );
        assert_eq!(r.apply(&e).unwrap(), Applied::Inserted(0));
        assert_eq!(r.apply(&e).unwrap(), Applied::Merged(0));
        assert_eq!(session.query::<Ticket, _>(|_| true).len(), 1);
        assert!(session.dirty().peek().contains(&Region::Sidebar));
    }

    #[test]
    fn partial_update_merges_fields() {
        let (session, r) = reconciler();
        r.apply(&event(
            EventType::Insert,
            json!({"id": "t1", "workspace_id": "ws", "subject": "VPN"}),
        ))
        .unwrap();
        r.apply(&event(EventType::Update, json!({"id": "t1", "status": "closed"})))
            .unwrap();
        let t = &session.query::<Ticket, _>(|_| true)[0];
        assert_eq!(t.subject, "VPN");
        assert_eq!(t.status.as_deref(), Some("closed"));
    }

    #[test]
    fn delete_of_uncached_record_is_noop() {
        let (session, r) = reconciler();
        session.dirty().take();
        assert_eq!(
            r.apply(&event(EventType::Delete, json!({"id": "ghost"}))).unwrap(),
            Applied::Absent
        );
        assert!(session.dirty().is_empty());
    }

    #[test]
    fn foreign_and_malformed_events_are_dropped() {
        let (session, r) = reconciler();
        let foreign = event(
            EventType::Insert,
            json!({"id": "t9", "workspace_id": "evil", "subject": "x"}),
        );
        assert!(matches!(
            r.apply(&foreign),
            Err(ReconcileError::ForeignWorkspace { .. })
        ));
        assert!(r.on_event(&event(EventType::Update, json!({"subject": "no id"}))).is_none());
        let unknown = RealtimeEvent {
            entity_type: "invoices".into(),
            kind: EventType::Insert,
            record: json!({"id": "i1"}),
        };
        assert!(r.on_event(&unknown).is_none());
        assert!(session.query::<Ticket, _>(|_| true).is_empty());
    }
}
