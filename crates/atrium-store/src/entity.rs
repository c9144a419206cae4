// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entity schema trait and field-level merge helpers.
//!
//! Records are strongly typed structs. JSON only appears at the patch
//! boundary: server responses and realtime payloads are frequently partial, so
//! they are merged into the typed record through its serde representation.

use crate::error::StoreError;
use crate::ids::{RecordId, WorkspaceId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Schema of one server-owned record type (task, deal, invoice, ...).
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static {
    /// Entity-type name; also the collection key and the realtime topic.
    const KIND: &'static str;

    /// Unique id within the collection.
    fn id(&self) -> &RecordId;

    /// Tenant the record belongs to.
    fn workspace_id(&self) -> &WorkspaceId;
}

/// How `upsert` treats an already-present record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertMode {
    /// Overwrite only the fields the incoming value carries.
    #[default]
    Merge,
    /// Replace the whole record.
    Replace,
}

/// Result of an upsert: where the record now lives and whether it was new.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// Record was absent and got inserted at this index.
    Inserted(usize),
    /// Record was present at this index and got updated in place.
    Merged(usize),
}

impl Upserted {
    /// Index of the affected record.
    pub fn index(self) -> usize {
        match self {
            Upserted::Inserted(i) | Upserted::Merged(i) => i,
        }
    }
}

pub(crate) fn decode_error<E: Entity>(source: serde_json::Error) -> StoreError {
    StoreError::Decode {
        kind: E::KIND,
        source,
    }
}

pub(crate) fn as_object<E: Entity>(value: &Value) -> Result<&Map<String, Value>, StoreError> {
    value
        .as_object()
        .ok_or(StoreError::NotAnObject { kind: E::KIND })
}

/// Extract the `id` field of a raw record value.
pub fn value_id(value: &Value) -> Option<RecordId> {
    value.get("id").and_then(Value::as_str).map(RecordId::from)
}

/// Overwrite the top-level fields of `target` present in `patch`.
///
/// A field set to `null` in the patch clears the field. Nested objects are
/// replaced, not merged.
pub fn merge_patch<E: Entity>(target: &mut E, patch: &Map<String, Value>) -> Result<(), StoreError> {
    let mut base = serde_json::to_value(&*target).map_err(decode_error::<E>)?;
    let Value::Object(fields) = &mut base else {
        return Err(StoreError::NotAnObject { kind: E::KIND });
    };
    for (key, value) in patch {
        fields.insert(key.clone(), value.clone());
    }
    *target = serde_json::from_value(base).map_err(decode_error::<E>)?;
    Ok(())
}

/// Merge a typed record into another; fields serialized as `null` in the
/// incoming record count as "not provided" and keep the existing value.
pub(crate) fn merge_record<E: Entity>(target: &mut E, incoming: &E) -> Result<(), StoreError> {
    let value = serde_json::to_value(incoming).map_err(decode_error::<E>)?;
    let provided: Map<String, Value> = as_object::<E>(&value)?
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merge_patch(target, &provided)
}

/// Build a fresh record from a complete JSON object.
pub fn decode_record<E: Entity>(value: &Value) -> Result<E, StoreError> {
    serde_json::from_value(value.clone()).map_err(decode_error::<E>)
}
