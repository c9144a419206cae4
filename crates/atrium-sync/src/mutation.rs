// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! High-level mutations executed as one transaction each.

use crate::error::SyncError;
use crate::persist::{PersistCall, PersistRequest};
use crate::session::Session;
use atrium_store::{Collection, Entity, RecordId, StoreError};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;

/// Default field carrying the manual sort position.
pub const DEFAULT_SORT_FIELD: &str = "position";

/// A change to records of type `E`.
#[derive(Debug, Clone)]
pub enum Mutation<E> {
    /// Insert a record whose id came from [`Session::issue_temp_id`].
    Create {
        /// Complete optimistic record.
        record: E,
        /// Display index; appended when `None`.
        index: Option<usize>,
    },
    /// Merge a partial object into an existing record.
    Update {
        /// Target record.
        id: RecordId,
        /// Top-level fields to overwrite (snake_case keys).
        patch: Value,
    },
    /// Delete an existing record.
    Delete {
        /// Target record.
        id: RecordId,
    },
    /// Rearrange records: they fill, in the given order, the slots they
    /// occupied before. Each record's sort field is set to its new index.
    Reorder {
        /// Ids in their new relative order.
        order: Vec<RecordId>,
        /// Field persisted per record; `None` keeps the reorder local.
        sort_field: Option<String>,
    },
}

impl<E: Entity> Mutation<E> {
    /// Create at the end of the collection.
    pub fn create(record: E) -> Self {
        Mutation::Create {
            record,
            index: None,
        }
    }

    /// Update `id` with `patch`.
    pub fn update(id: impl Into<RecordId>, patch: Value) -> Self {
        Mutation::Update {
            id: id.into(),
            patch,
        }
    }

    /// Delete `id`.
    pub fn delete(id: impl Into<RecordId>) -> Self {
        Mutation::Delete { id: id.into() }
    }

    /// Reorder persisting [`DEFAULT_SORT_FIELD`].
    pub fn reorder<I>(order: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<RecordId>,
    {
        Mutation::Reorder {
            order: order.into_iter().map(Into::into).collect(),
            sort_field: Some(DEFAULT_SORT_FIELD.to_string()),
        }
    }

    /// Operation name for logs.
    pub fn op_name(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
            Mutation::Reorder { .. } => "reorder",
        }
    }

    /// Ids the transaction must snapshot.
    pub fn affected_ids(&self) -> Vec<RecordId> {
        match self {
            Mutation::Create { record, .. } => vec![record.id().clone()],
            Mutation::Update { id, .. } | Mutation::Delete { id } => vec![id.clone()],
            Mutation::Reorder { order, .. } => order.clone(),
        }
    }

    /// Reject input before anything is applied.
    pub fn validate(&self, session: &Session) -> Result<(), SyncError> {
        let store = session.store();
        let collection = store.collection::<E>();
        let exists = |id: &RecordId| collection.is_some_and(|c| c.contains(id.as_str()));
        match self {
            Mutation::Create { record, .. } => {
                let id = record.id();
                if !session.is_outstanding_temp_id(id.as_str()) {
                    return Err(SyncError::validation(format!(
                        "new {} record must use an issued temp id, got {id}",
                        E::KIND
                    )));
                }
                if exists(id) {
                    return Err(SyncError::validation(format!("{id} already exists")));
                }
                if record.workspace_id() != store.workspace() {
                    return Err(SyncError::validation(format!(
                        "record belongs to workspace {}, session is bound to {}",
                        record.workspace_id(),
                        store.workspace()
                    )));
                }
            }
            Mutation::Update { id, patch } => {
                let fields = patch
                    .as_object()
                    .ok_or_else(|| SyncError::validation("update patch must be an object"))?;
                if fields.is_empty() {
                    return Err(SyncError::validation("update patch is empty"));
                }
                if fields
                    .get("id")
                    .is_some_and(|v| v.as_str() != Some(id.as_str()))
                {
                    return Err(SyncError::validation("update patch cannot change the id"));
                }
                if fields
                    .get("workspace_id")
                    .is_some_and(|v| v.as_str() != Some(store.workspace().as_str()))
                {
                    return Err(SyncError::validation("update patch cannot move workspaces"));
                }
                if !exists(id) {
                    return Err(SyncError::validation(format!("no {} record {id}", E::KIND)));
                }
            }
            Mutation::Delete { id } => {
                if !exists(id) {
                    return Err(SyncError::validation(format!("no {} record {id}", E::KIND)));
                }
            }
            Mutation::Reorder { order, .. } => {
                if order.is_empty() {
                    return Err(SyncError::validation("reorder needs at least one id"));
                }
                let mut seen = BTreeSet::new();
                for id in order {
                    if !seen.insert(id) {
                        return Err(SyncError::validation(format!("{id} listed twice")));
                    }
                    if !exists(id) {
                        return Err(SyncError::validation(format!("no {} record {id}", E::KIND)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Network calls that persist this mutation, computed from the store
    /// before the optimistic change lands.
    pub fn persist_request(&self, session: &Session) -> Result<PersistRequest, SyncError> {
        match self {
            Mutation::Create { record, .. } => {
                let mut body = serde_json::to_value(record).map_err(|source| {
                    SyncError::Store(StoreError::Decode {
                        kind: E::KIND,
                        source,
                    })
                })?;
                if let Some(fields) = body.as_object_mut() {
                    fields.remove("id");
                }
                Ok(PersistRequest::Single(PersistCall::Create { body }))
            }
            Mutation::Update { id, patch } => {
                let mut body = Map::new();
                body.insert("id".into(), Value::String(id.to_string()));
                if let Some(fields) = patch.as_object() {
                    body.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Ok(PersistRequest::Single(PersistCall::Update {
                    body: Value::Object(body),
                }))
            }
            Mutation::Delete { id } => {
                Ok(PersistRequest::Single(PersistCall::Delete { id: id.clone() }))
            }
            Mutation::Reorder { order, sort_field } => {
                let Some(field) = sort_field else {
                    return Ok(PersistRequest::Batch(Vec::new()));
                };
                let store = session.store();
                let slots = store
                    .collection::<E>()
                    .map(|c| reorder_slots(c, order))
                    .unwrap_or_default();
                let calls = order
                    .iter()
                    .zip(slots)
                    .map(|(id, slot)| PersistCall::Update {
                        body: json!({ "id": id.as_str(), field.as_str(): slot }),
                    })
                    .collect();
                Ok(PersistRequest::Batch(calls))
            }
        }
    }

    /// Apply the optimistic change to `collection`.
    pub fn apply(&self, collection: &mut Collection<E>) -> Result<(), StoreError> {
        match self {
            Mutation::Create { record, index } => {
                match index {
                    Some(i) => {
                        collection.upsert_at(record.clone(), *i);
                    }
                    None => {
                        collection.upsert(record.clone())?;
                    }
                }
                Ok(())
            }
            Mutation::Update { id, patch } => collection.patch(id.as_str(), patch).map(|_| ()),
            Mutation::Delete { id } => {
                collection.remove(id.as_str());
                Ok(())
            }
            Mutation::Reorder { order, sort_field } => {
                let slots = reorder_slots(collection, order);
                let mut moved = Vec::with_capacity(order.len());
                for id in order {
                    let (_, record) =
                        collection
                            .remove(id.as_str())
                            .ok_or_else(|| StoreError::NotFound {
                                kind: E::KIND,
                                id: id.clone(),
                            })?;
                    moved.push(record);
                }
                for (slot, record) in slots.iter().zip(moved) {
                    collection.upsert_at(record, *slot);
                }
                if let Some(field) = sort_field {
                    for (id, slot) in order.iter().zip(&slots) {
                        collection.patch(id.as_str(), &json!({ field.as_str(): slot }))?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Indices currently held by `order`'s records, ascending.
fn reorder_slots<E: Entity>(collection: &Collection<E>, order: &[RecordId]) -> Vec<usize> {
    let mut slots: Vec<usize> = order
        .iter()
        .filter_map(|id| collection.position(id.as_str()))
        .collect();
    slots.sort_unstable();
    slots
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use atrium_app_core::prefs::SyncPrefs;
    use atrium_app_core::render_port::Region;
    use atrium_store::{UpsertMode, WorkspaceId};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: RecordId,
        workspace_id: WorkspaceId,
        #[serde(default)]
        position: usize,
    }

    impl Entity for Row {
        const KIND: &'static str = "rows";
        fn id(&self) -> &RecordId {
            &self.id
        }
        fn workspace_id(&self) -> &WorkspaceId {
            &self.workspace_id
        }
    }

    fn row(id: &str, position: usize) -> Row {
        Row {
            id: id.into(),
            workspace_id: "ws".into(),
            position,
        }
    }

    fn session() -> Session {
        let s = Session::new("ws".into(), SyncPrefs::default());
        s.register::<Row>([Region::Page]);
        for (i, id) in ["a", "b", "c", "d"].into_iter().enumerate() {
            s.upsert(row(id, i), UpsertMode::Merge).unwrap();
        }
        s
    }

    #[test]
    fn reorder_fills_previous_slots_and_sets_positions() {
        let mut c = Collection::from_records([row("a", 0), row("b", 1), row("c", 2), row("d", 3)])
            .unwrap();
        Mutation::<Row>::reorder(["d", "b"]).apply(&mut c).unwrap();
        let order: Vec<_> = c.iter().map(|r| (r.id.to_string(), r.position)).collect();
        assert_eq!(
            order,
            [
                ("a".to_string(), 0),
                ("d".to_string(), 1),
                ("c".to_string(), 2),
                ("b".to_string(), 3)
            ]
        );
    }

    #[test]
    fn reorder_persists_one_update_per_record() {
        let s = session();
        let request = Mutation::<Row>::reorder(["c", "a"]).persist_request(&s).unwrap();
        assert_eq!(
            request,
            PersistRequest::Batch(vec![
                PersistCall::Update {
                    body: json!({"id": "c", "position": 0})
                },
                PersistCall::Update {
                    body: json!({"id": "a", "position": 2})
                },
            ])
        );
    }

    #[test]
    fn validation_rejects_bad_input() {
        let s = session();
        assert!(Mutation::create(row("srv-1", 0)).validate(&s).is_err());
        assert!(Mutation::<Row>::update("a", json!({"id": "z"})).validate(&s).is_err());
        assert!(Mutation::<Row>::update("a", json!({})).validate(&s).is_err());
        assert!(Mutation::<Row>::update("zz", json!({"position": 1})).validate(&s).is_err());
        assert!(Mutation::<Row>::delete("zz").validate(&s).is_err());
        assert!(Mutation::<Row>::reorder(["a", "a"]).validate(&s).is_err());

        let temp = s.issue_temp_id();
        assert!(Mutation::create(row(temp.as_str(), 4)).validate(&s).is_ok());
        let mut foreign = row(temp.as_str(), 4);
        foreign.workspace_id = "other".into();
        assert!(Mutation::create(foreign).validate(&s).is_err());
    }

    #[test]
    fn create_body_omits_the_temp_id() {
        let s = session();
        let temp = s.issue_temp_id();
        let request = Mutation::create(row(temp.as_str(), 4)).persist_request(&s).unwrap();
        assert_eq!(
            request,
            PersistRequest::Single(PersistCall::Create {
                body: json!({"workspace_id": "ws", "position": 4})
            })
        );
    }
}
