// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ordered, id-unique sequence of records of one entity type.

use crate::entity::{
    as_object, decode_record, merge_patch, merge_record, value_id, Entity, UpsertMode, Upserted,
};
use crate::error::StoreError;
use crate::ids::RecordId;
use serde_json::Value;

/// Ordered records of one entity type; no two share an id.
///
/// Order is meaningful to the UI (manual sort) and every operation preserves
/// the position of records it does not explicitly move.
#[derive(Debug, Clone)]
pub struct Collection<E> {
    records: Vec<E>,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from records in order; later duplicates merge into
    /// the first occurrence.
    pub fn from_records(records: impl IntoIterator<Item = E>) -> Result<Self, StoreError> {
        let mut out = Self::new();
        for record in records {
            out.upsert(record)?;
        }
        Ok(out)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the collection holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in display order.
    pub fn as_slice(&self) -> &[E] {
        &self.records
    }

    /// Iterate records in display order.
    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.records.iter()
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|r| r.id().clone()).collect()
    }

    /// Index of the record with `id`, if present.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id().as_str() == id)
    }

    /// Borrow the record with `id`.
    pub fn get(&self, id: &str) -> Option<&E> {
        self.records.iter().find(|r| r.id().as_str() == id)
    }

    /// True when a record with `id` exists.
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Read-only filter in display order.
    pub fn query<F>(&self, mut predicate: F) -> Vec<&E>
    where
        F: FnMut(&E) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Merge into an existing record (in place) or append a new one.
    pub fn upsert(&mut self, record: E) -> Result<Upserted, StoreError> {
        self.upsert_with(record, UpsertMode::Merge)
    }

    /// Upsert with an explicit merge/replace mode.
    pub fn upsert_with(&mut self, record: E, mode: UpsertMode) -> Result<Upserted, StoreError> {
        match self.position(record.id().as_str()) {
            Some(index) => {
                match mode {
                    UpsertMode::Merge => merge_record(&mut self.records[index], &record)?,
                    UpsertMode::Replace => self.records[index] = record,
                }
                Ok(Upserted::Merged(index))
            }
            None => {
                self.records.push(record);
                Ok(Upserted::Inserted(self.records.len() - 1))
            }
        }
    }

    /// Place `record` at `index` (clamped to the length), replacing and moving
    /// any record that already carries the same id.
    pub fn upsert_at(&mut self, record: E, index: usize) -> usize {
        if let Some(existing) = self.position(record.id().as_str()) {
            self.records.remove(existing);
        }
        let index = index.min(self.records.len());
        self.records.insert(index, record);
        index
    }

    /// Merge a partial JSON object keyed by its `id` field.
    ///
    /// An absent record is created only if the object is a complete record.
    pub fn upsert_patch(&mut self, patch: &Value) -> Result<Upserted, StoreError> {
        let fields = as_object::<E>(patch)?;
        let id = value_id(patch).ok_or(StoreError::MissingId { kind: E::KIND })?;
        match self.position(id.as_str()) {
            Some(index) => {
                merge_patch(&mut self.records[index], fields)?;
                Ok(Upserted::Merged(index))
            }
            None => {
                let record = decode_record::<E>(patch)?;
                self.records.push(record);
                Ok(Upserted::Inserted(self.records.len() - 1))
            }
        }
    }

    /// Merge a partial JSON object into the existing record `id`.
    ///
    /// The patch may repeat `id` but not change it; renames go through
    /// [`Collection::replace_id`].
    pub fn patch(&mut self, id: &str, patch: &Value) -> Result<usize, StoreError> {
        let fields = as_object::<E>(patch)?;
        if let Some(patched) = value_id(patch).filter(|p| p.as_str() != id) {
            return Err(StoreError::IdChange {
                kind: E::KIND,
                id: RecordId::from(id),
                patched,
            });
        }
        let index = self.position(id).ok_or_else(|| StoreError::NotFound {
            kind: E::KIND,
            id: RecordId::from(id),
        })?;
        merge_patch(&mut self.records[index], fields)?;
        Ok(index)
    }

    /// Remove the record `id`; returns its former index and value. No-op when absent.
    pub fn remove(&mut self, id: &str) -> Option<(usize, E)> {
        let index = self.position(id)?;
        Some((index, self.records.remove(index)))
    }

    /// Atomically swap the record `old_id` for `record` at `old_id`'s index.
    ///
    /// Any other entry already carrying `record`'s id is dropped so ids stay
    /// unique. When `old_id` is absent the record is upserted at the end.
    pub fn replace_id(&mut self, old_id: &str, record: E) -> usize {
        let mut slot = self.position(old_id);
        if record.id().as_str() != old_id {
            if let Some(dup) = self.position(record.id().as_str()) {
                self.records.remove(dup);
                slot = slot.map(|i| if dup < i { i - 1 } else { i });
            }
        }
        match slot {
            Some(index) => {
                self.records[index] = record;
                index
            }
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        }
    }

    /// Move the record `id` to `index` (clamped), shifting the others.
    pub fn move_to(&mut self, id: &str, index: usize) -> Result<usize, StoreError> {
        let (_, record) = self.remove(id).ok_or_else(|| StoreError::NotFound {
            kind: E::KIND,
            id: RecordId::from(id),
        })?;
        Ok(self.upsert_at(record, index))
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<'a, E> IntoIterator for &'a Collection<E> {
    type Item = &'a E;
    type IntoIter = std::slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::ids::WorkspaceId;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: RecordId,
        workspace_id: WorkspaceId,
        title: String,
        #[serde(default)]
        pinned: Option<bool>,
    }

    impl Entity for Note {
        const KIND: &'static str = "notes";
        fn id(&self) -> &RecordId {
            &self.id
        }
        fn workspace_id(&self) -> &WorkspaceId {
            &self.workspace_id
        }
    }

    fn note(id: &str, title: &str) -> Note {
        Note {
            id: id.into(),
            workspace_id: "ws".into(),
            title: title.into(),
            pinned: None,
        }
    }

    fn ids(c: &Collection<Note>) -> Vec<String> {
        c.iter().map(|n| n.id.to_string()).collect()
    }

    #[test]
    fn upsert_merges_in_place_and_appends_new() {
        let mut c = Collection::from_records([note("a", "A"), note("b", "B")]).unwrap();
        let mut pinned = note("a", "A2");
        pinned.pinned = Some(true);
        assert_eq!(c.upsert(pinned).unwrap(), Upserted::Merged(0));
        assert_eq!(c.upsert(note("c", "C")).unwrap(), Upserted::Inserted(2));
        assert_eq!(ids(&c), ["a", "b", "c"]);
        assert_eq!(c.get("a").unwrap().title, "A2");

        // None fields do not clobber on merge
        c.upsert(note("a", "A3")).unwrap();
        assert_eq!(c.get("a").unwrap().pinned, Some(true));
    }

    #[test]
    fn replace_mode_overwrites_whole_record() {
        let mut c = Collection::new();
        let mut pinned = note("a", "A");
        pinned.pinned = Some(true);
        c.upsert(pinned).unwrap();
        c.upsert_with(note("a", "A"), UpsertMode::Replace).unwrap();
        assert_eq!(c.get("a").unwrap().pinned, None);
    }

    #[test]
    fn partial_patch_keeps_absent_fields() {
        let mut c = Collection::from_records([note("a", "A")]).unwrap();
        c.upsert_patch(&json!({"id": "a", "pinned": true})).unwrap();
        let a = c.get("a").unwrap();
        assert_eq!(a.title, "A");
        assert_eq!(a.pinned, Some(true));
    }

    #[test]
    fn incomplete_patch_for_absent_record_is_rejected() {
        let mut c = Collection::<Note>::new();
        let err = c.upsert_patch(&json!({"id": "z", "pinned": true})).unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
        assert!(c.is_empty());
        assert!(matches!(
            c.upsert_patch(&json!({"title": "no id"})),
            Err(StoreError::MissingId { .. })
        ));
    }

    #[test]
    fn patch_cannot_rename_a_record() {
        let mut c = Collection::from_records([note("a", "A"), note("b", "B")]).unwrap();
        let err = c.patch("a", &json!({"id": "b", "title": "taken"})).unwrap_err();
        assert!(matches!(err, StoreError::IdChange { .. }));
        assert_eq!(ids(&c), ["a", "b"]);
        assert_eq!(c.get("a").unwrap().title, "A");

        assert_eq!(c.patch("a", &json!({"id": "a", "title": "A2"})).unwrap(), 0);
        assert_eq!(c.get("a").unwrap().title, "A2");
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut c = Collection::from_records([note("a", "A")]).unwrap();
        assert!(c.remove("zzz").is_none());
        assert_eq!(ids(&c), ["a"]);
    }

    #[test]
    fn replace_id_keeps_position_and_drops_duplicate() {
        let mut c =
            Collection::from_records([note("x", "X"), note("tmp-1", "N"), note("y", "Y")]).unwrap();
        // realtime echo landed before the creation response
        c.upsert(note("srv-42", "N")).unwrap();
        let at = c.replace_id("tmp-1", note("srv-42", "N"));
        assert_eq!(at, 1);
        assert_eq!(ids(&c), ["x", "srv-42", "y"]);
    }

    #[test]
    fn replace_id_with_duplicate_before_slot_shifts_index() {
        let mut c = Collection::from_records([note("srv-42", "N"), note("tmp-1", "N")]).unwrap();
        let at = c.replace_id("tmp-1", note("srv-42", "N"));
        assert_eq!(at, 0);
        assert_eq!(ids(&c), ["srv-42"]);
    }

    #[test]
    fn move_to_reorders() {
        let mut c =
            Collection::from_records([note("a", "A"), note("b", "B"), note("c", "C")]).unwrap();
        c.move_to("c", 0).unwrap();
        assert_eq!(ids(&c), ["c", "a", "b"]);
        assert!(c.move_to("nope", 0).is_err());
    }
}
