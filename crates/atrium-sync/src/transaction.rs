// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optimistic transactions: snapshot, apply, then commit or roll back.
//!
//! ```text
//! begin ─▶ apply ─▶ (persist) ─┬─▶ commit / commit_created ─▶ Committed
//!                              └─▶ rollback                ─▶ RolledBack
//! ```
//!
//! Only the first resolution counts. A transaction begun before
//! [`Session::reset`] resolves as [`Resolution::Stale`] and leaves the new
//! workspace's store alone.

use crate::error::SyncError;
use crate::session::Session;
use atrium_app_core::render_port::Region;
use atrium_store::{value_id, Collection, Entity, RecordId, StoreError, UpsertMode};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Toast title shown when a transaction rolls back.
pub const ROLLBACK_TOAST_TITLE: &str = "Couldn't save changes";

/// Session-unique transaction number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxId(u64);

impl TxId {
    /// Raw sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    /// Applied locally, awaiting the server.
    Pending,
    /// Server confirmed; canonical state merged.
    Committed,
    /// Server rejected or timed out; snapshot restored.
    RolledBack,
}

/// What a resolution call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Transaction moved to `Committed`.
    Committed,
    /// Transaction moved to `RolledBack`.
    RolledBack,
    /// Transaction was already resolved; nothing changed.
    AlreadyResolved(TxStatus),
    /// Transaction predates a store reset; nothing changed.
    Stale,
}

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    next_tx: u64,
    generation: u64,
    pending: BTreeSet<TxId>,
}

impl Ledger {
    fn open(&mut self) -> (TxId, u64) {
        self.next_tx += 1;
        let id = TxId(self.next_tx);
        self.pending.insert(id);
        (id, self.generation)
    }

    fn close(&mut self, id: TxId) {
        self.pending.remove(&id);
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Bump the generation and forget pending transactions; returns how many
    /// were orphaned.
    pub(crate) fn advance_generation(&mut self) -> usize {
        self.generation += 1;
        let orphaned = self.pending.len();
        self.pending.clear();
        orphaned
    }
}

/// Where a captured record sat: its index and its neighbours' ids.
#[derive(Debug, Clone)]
struct Prior<E> {
    index: usize,
    prev: Option<RecordId>,
    next: Option<RecordId>,
    record: E,
}

impl<E: Entity> Prior<E> {
    /// Slot to reinsert at, relative to the neighbours as they sit now so
    /// that changes landing in between do not shift the record. Falls back
    /// to the captured index only when both neighbours are gone.
    fn slot(&self, collection: &Collection<E>) -> usize {
        let Some(prev) = &self.prev else {
            return 0;
        };
        if let Some(i) = collection.position(prev.as_str()) {
            return i + 1;
        }
        match &self.next {
            Some(next) => collection
                .position(next.as_str())
                .unwrap_or_else(|| self.index.min(collection.len())),
            None => collection.len(),
        }
    }
}

/// Prior state of the records a transaction touches: for each id, where it
/// sat and its value, or nothing when it did not exist.
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    entries: Vec<(RecordId, Option<Prior<E>>)>,
}

impl<E: Entity> Snapshot<E> {
    /// Deep-copy `ids` out of `collection`; duplicates are captured once.
    pub fn capture<'a, I>(collection: Option<&Collection<E>>, ids: I) -> Self
    where
        I: IntoIterator<Item = &'a RecordId>,
    {
        let mut seen = BTreeSet::new();
        let entries = ids
            .into_iter()
            .filter(|id| seen.insert((*id).clone()))
            .map(|id| {
                let prior = collection.and_then(|c| {
                    let records = c.as_slice();
                    let index = c.position(id.as_str())?;
                    Some(Prior {
                        index,
                        prev: index
                            .checked_sub(1)
                            .and_then(|i| records.get(i))
                            .map(|r| r.id().clone()),
                        next: records.get(index + 1).map(|r| r.id().clone()),
                        record: records.get(index)?.clone(),
                    })
                });
                (id.clone(), prior)
            })
            .collect();
        Self { entries }
    }

    /// Put every captured record back verbatim next to the neighbours it had
    /// at capture and drop records that did not exist before.
    ///
    /// Records go back in ascending captured order, so a run of affected
    /// records rebuilds itself behind its first surviving neighbour.
    pub fn restore(&self, collection: &mut Collection<E>) {
        for (id, _) in &self.entries {
            collection.remove(id.as_str());
        }
        let mut present: Vec<&Prior<E>> =
            self.entries.iter().filter_map(|(_, p)| p.as_ref()).collect();
        present.sort_by_key(|p| p.index);
        for prior in present {
            let slot = prior.slot(collection);
            collection.upsert_at(prior.record.clone(), slot);
        }
    }

    /// Affected ids in capture order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Captured value of `id`, if the record existed.
    pub fn prior(&self, id: &str) -> Option<&E> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == id)
            .and_then(|(_, p)| p.as_ref().map(|p| &p.record))
    }
}

/// One optimistic mutation over a set of records of type `E`.
#[derive(Debug)]
pub struct Transaction<E> {
    id: TxId,
    generation: u64,
    snapshot: Snapshot<E>,
    regions: Vec<Region>,
    status: TxStatus,
    created: Option<RecordId>,
}

impl<E: Entity> Transaction<E> {
    /// Transaction id.
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Current lifecycle state.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Ids captured at begin.
    pub fn affected_ids(&self) -> impl Iterator<Item = &RecordId> {
        self.snapshot.ids()
    }

    /// Prior state captured at begin.
    pub fn snapshot(&self) -> &Snapshot<E> {
        &self.snapshot
    }

    /// Regions dirtied by every step of this transaction.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Also dirty `regions` on apply and resolution.
    pub fn touch_regions(&mut self, regions: impl IntoIterator<Item = Region>) {
        for region in regions {
            if !self.regions.contains(&region) {
                self.regions.push(region);
            }
        }
    }

    /// Record that this transaction creates the record `temp_id`.
    pub fn track_created(&mut self, temp_id: RecordId) {
        self.created = Some(temp_id);
    }

    /// Temp id of the record this transaction creates, if any.
    pub fn created_temp_id(&self) -> Option<&RecordId> {
        self.created.as_ref()
    }
}

impl Session {
    /// Snapshot `ids` of entity `E` and open a pending transaction.
    pub fn begin<E: Entity>(&self, ids: &[RecordId]) -> Transaction<E> {
        let snapshot = {
            let store = self.store();
            Snapshot::capture(store.collection::<E>(), ids)
        };
        let (id, generation) = self.ledger().borrow_mut().open();
        debug!(tx = %id, kind = E::KIND, affected = ids.len(), "begin");
        Transaction {
            id,
            generation,
            snapshot,
            regions: self.regions_for(E::KIND),
            status: TxStatus::Pending,
            created: None,
        }
    }

    /// Apply the optimistic change synchronously and dirty the regions.
    ///
    /// When `f` fails the snapshot is restored and the transaction closes as
    /// rolled back without a toast; the error is returned to the caller.
    pub fn apply<E, F, R>(&self, tx: &mut Transaction<E>, f: F) -> Result<R, SyncError>
    where
        E: Entity,
        F: FnOnce(&mut Collection<E>) -> Result<R, StoreError>,
    {
        if tx.status != TxStatus::Pending {
            return Err(SyncError::validation(format!("{} is already resolved", tx.id)));
        }
        if tx.generation != self.generation() {
            return Err(SyncError::validation(format!("{} predates a reset", tx.id)));
        }
        let applied = self.update_store(|store| {
            let collection = store.collection_mut::<E>();
            let result = f(collection);
            if result.is_err() {
                tx.snapshot.restore(collection);
            }
            result
        });
        match applied {
            Ok(out) => {
                self.mark_dirty(tx.regions.iter().cloned());
                Ok(out)
            }
            Err(err) => {
                if let Some(temp) = &tx.created {
                    self.temp_ids().borrow_mut().discard(temp.as_str());
                }
                self.close(tx, TxStatus::RolledBack);
                warn!(tx = %tx.id, kind = E::KIND, error = %err, "apply failed");
                Err(err.into())
            }
        }
    }

    /// Merge the server's canonical records and mark the transaction committed.
    ///
    /// Values without an `id`, or that fail to merge, are skipped with a
    /// warning; the optimistic state stays for those records.
    pub fn commit<E: Entity>(&self, tx: &mut Transaction<E>, canonical: &[Value]) -> Resolution {
        if let Some(early) = self.check_resolvable(tx) {
            return early;
        }
        self.update_store(|store| {
            let collection = store.collection_mut::<E>();
            for value in canonical.iter().filter(|v| v.is_object()) {
                if value_id(value).is_none() {
                    warn!(tx = %tx.id, kind = E::KIND, "canonical record without id ignored");
                    continue;
                }
                if let Err(err) = collection.upsert_patch(value) {
                    warn!(tx = %tx.id, kind = E::KIND, error = %err, "canonical record not merged");
                }
            }
        });
        self.close(tx, TxStatus::Committed);
        self.mark_dirty(tx.regions.iter().cloned());
        debug!(tx = %tx.id, kind = E::KIND, merged = canonical.len(), "committed");
        Resolution::Committed
    }

    /// Commit a creation: swap the temp record for the server's canonical
    /// record at the same index and retire the temp id.
    ///
    /// Errors leave the transaction pending so the caller can roll it back.
    pub fn commit_created<E: Entity>(
        &self,
        tx: &mut Transaction<E>,
        temp_id: &RecordId,
        canonical: &Value,
    ) -> Result<Resolution, SyncError> {
        if let Some(early) = self.check_resolvable(tx) {
            return Ok(early);
        }
        let permanent = value_id(canonical)
            .ok_or_else(|| SyncError::server("creation response carries no record id"))?;
        self.temp_ids().borrow().check(temp_id, &permanent)?;

        let index = self.update_store(|store| -> Result<usize, SyncError> {
            let collection = store.collection_mut::<E>();
            let mut record = match collection.get(temp_id.as_str()) {
                Some(optimistic) => optimistic.clone(),
                None => tx
                    .snapshot
                    .prior(temp_id.as_str())
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound {
                        kind: E::KIND,
                        id: temp_id.clone(),
                    })?,
            };
            let fields = canonical
                .as_object()
                .ok_or(StoreError::NotAnObject { kind: E::KIND })?;
            atrium_store::merge_patch(&mut record, fields)?;
            Ok(collection.replace_id(temp_id.as_str(), record))
        })?;

        self.temp_ids().borrow_mut().resolve(temp_id, &permanent)?;
        self.close(tx, TxStatus::Committed);
        self.mark_dirty(tx.regions.iter().cloned());
        debug!(tx = %tx.id, kind = E::KIND, temp = %temp_id, id = %permanent, index, "creation committed");
        Ok(Resolution::Committed)
    }

    /// Restore the snapshot, retire a pending temp id and raise an error toast.
    pub fn rollback<E: Entity>(&self, tx: &mut Transaction<E>, reason: &SyncError) -> Resolution {
        if let Some(early) = self.check_resolvable(tx) {
            return early;
        }
        self.update_store(|store| tx.snapshot.restore(store.collection_mut::<E>()));
        if let Some(temp) = &tx.created {
            self.temp_ids().borrow_mut().discard(temp.as_str());
        }
        self.close(tx, TxStatus::RolledBack);
        self.mark_dirty(tx.regions.iter().cloned());
        self.toast_error(ROLLBACK_TOAST_TITLE, reason.user_message());
        warn!(tx = %tx.id, kind = E::KIND, error = %reason, "rolled back");
        Resolution::RolledBack
    }

    /// Swap the record `old_id` for `record` at the same index, outside any
    /// transaction.
    pub fn replace_id<E: Entity>(&self, old_id: &str, record: E) -> usize {
        let index = self.update_store(|s| s.replace_id(old_id, record));
        self.mark_kind_dirty(E::KIND);
        index
    }

    /// Upsert outside any transaction (initial loads, manual refresh).
    pub fn upsert<E: Entity>(&self, record: E, mode: UpsertMode) -> Result<usize, SyncError> {
        let index = self.update_store(|s| s.upsert_with(record, mode))?.index();
        self.mark_kind_dirty(E::KIND);
        Ok(index)
    }

    /// Remove outside any transaction; no-op when absent.
    pub fn remove<E: Entity>(&self, id: &str) -> Option<E> {
        let removed = self.update_store(|s| s.remove::<E>(id)).map(|(_, r)| r);
        if removed.is_some() {
            self.mark_kind_dirty(E::KIND);
        }
        removed
    }

    fn check_resolvable<E>(&self, tx: &Transaction<E>) -> Option<Resolution> {
        if tx.status != TxStatus::Pending {
            debug!(tx = %tx.id, status = ?tx.status, "second resolution ignored");
            return Some(Resolution::AlreadyResolved(tx.status));
        }
        if tx.generation != self.generation() {
            debug!(tx = %tx.id, "resolution from a previous generation ignored");
            return Some(Resolution::Stale);
        }
        None
    }

    fn close<E>(&self, tx: &mut Transaction<E>, status: TxStatus) {
        tx.status = status;
        self.ledger().borrow_mut().close(tx.id);
    }
}
