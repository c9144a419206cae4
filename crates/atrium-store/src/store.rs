// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Workspace-scoped map from entity-type name to collection.

use crate::collection::Collection;
use crate::entity::{Entity, UpsertMode, Upserted};
use crate::error::StoreError;
use crate::ids::{RecordId, WorkspaceId};
use serde_json::Value;
use std::any::Any;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Type-erased view of a collection, used where only the entity-type name is
/// known (realtime payloads).
trait ErasedCollection {
    fn upsert_value(&mut self, value: &Value) -> Result<Upserted, StoreError>;
    fn remove_id(&mut self, id: &str) -> bool;
    fn len(&self) -> usize;
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Entity> ErasedCollection for Collection<E> {
    fn upsert_value(&mut self, value: &Value) -> Result<Upserted, StoreError> {
        self.upsert_patch(value)
    }

    fn remove_id(&mut self, id: &str) -> bool {
        self.remove(id).is_some()
    }

    fn len(&self) -> usize {
        Collection::len(self)
    }

    fn clear(&mut self) {
        Collection::clear(self);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The client-side cache: one ordered collection per entity type, bound to a
/// single workspace for the lifetime of a session.
pub struct Store {
    workspace: WorkspaceId,
    collections: BTreeMap<&'static str, Box<dyn ErasedCollection>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sizes: BTreeMap<_, _> = self
            .collections
            .iter()
            .map(|(kind, c)| (*kind, c.len()))
            .collect();
        f.debug_struct("Store")
            .field("workspace", &self.workspace)
            .field("collections", &sizes)
            .finish()
    }
}

impl Store {
    /// Create an empty store for `workspace`.
    pub fn new(workspace: WorkspaceId) -> Self {
        Self {
            workspace,
            collections: BTreeMap::new(),
        }
    }

    /// Active workspace.
    pub fn workspace(&self) -> &WorkspaceId {
        &self.workspace
    }

    /// Register an entity type so it can be addressed by name.
    pub fn register<E: Entity>(&mut self) -> &mut Self {
        let _ = self.collection_mut::<E>();
        self
    }

    /// Registered entity-type names.
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.collections.keys().copied()
    }

    /// True when `kind` is registered.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.collections.contains_key(kind)
    }

    /// Typed read access; `None` until the entity type is registered.
    pub fn collection<E: Entity>(&self) -> Option<&Collection<E>> {
        self.collections
            .get(E::KIND)
            .and_then(|c| c.as_any().downcast_ref::<Collection<E>>())
    }

    /// Typed write access, registering the entity type on first use.
    pub fn collection_mut<E: Entity>(&mut self) -> &mut Collection<E> {
        let slot = self
            .collections
            .entry(E::KIND)
            .or_insert_with(|| Box::new(Collection::<E>::new()));
        if !slot.as_any().is::<Collection<E>>() {
            warn!(kind = E::KIND, "entity kind re-registered with a new schema");
            *slot = Box::new(Collection::<E>::new());
        }
        match slot.as_any_mut().downcast_mut::<Collection<E>>() {
            Some(collection) => collection,
            None => unreachable!("collection schema checked above"),
        }
    }

    /// Merge into or append a record.
    pub fn upsert<E: Entity>(&mut self, record: E) -> Result<Upserted, StoreError> {
        self.collection_mut::<E>().upsert(record)
    }

    /// Upsert with explicit mode.
    pub fn upsert_with<E: Entity>(
        &mut self,
        record: E,
        mode: UpsertMode,
    ) -> Result<Upserted, StoreError> {
        self.collection_mut::<E>().upsert_with(record, mode)
    }

    /// Remove at most one record; no-op when absent.
    pub fn remove<E: Entity>(&mut self, id: &str) -> Option<(usize, E)> {
        self.collection_mut::<E>().remove(id)
    }

    /// Swap `old_id` for `record` at the same index.
    pub fn replace_id<E: Entity>(&mut self, old_id: &str, record: E) -> usize {
        self.collection_mut::<E>().replace_id(old_id, record)
    }

    /// Read-only filter; cloned so callers never hold a borrow on the store.
    pub fn query<E, F>(&self, predicate: F) -> Vec<E>
    where
        E: Entity,
        F: FnMut(&E) -> bool,
    {
        self.collection::<E>()
            .map(|c| c.query(predicate).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Upsert a raw JSON record into the collection named `kind`.
    pub fn upsert_value(&mut self, kind: &str, value: &Value) -> Result<Upserted, StoreError> {
        let collection = self
            .collections
            .get_mut(kind)
            .ok_or_else(|| StoreError::UnknownEntity(kind.to_owned()))?;
        let outcome = collection.upsert_value(value)?;
        debug!(kind, ?outcome, "upserted raw record");
        Ok(outcome)
    }

    /// Remove `id` from the collection named `kind`; `Ok(false)` when absent.
    pub fn remove_by_kind(&mut self, kind: &str, id: &RecordId) -> Result<bool, StoreError> {
        let collection = self
            .collections
            .get_mut(kind)
            .ok_or_else(|| StoreError::UnknownEntity(kind.to_owned()))?;
        Ok(collection.remove_id(id.as_str()))
    }

    /// Drop all records and rebind to `workspace`; registrations survive.
    pub fn reset(&mut self, workspace: WorkspaceId) {
        for collection in self.collections.values_mut() {
            collection.clear();
        }
        self.workspace = workspace;
    }
}
