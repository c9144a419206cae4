// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client-local ids for records that the server has not persisted yet.

use crate::error::TempIdError;
use atrium_store::RecordId;
use std::collections::BTreeSet;

/// Issues `"{prefix}{n}"` ids, monotonic for the whole session, and tracks
/// which ones still await substitution by a server id.
#[derive(Debug)]
pub struct TempIdIssuer {
    prefix: String,
    next: u64,
    outstanding: BTreeSet<RecordId>,
}

impl TempIdIssuer {
    /// Create an issuer; an empty prefix falls back to `tmp-`.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: if prefix.is_empty() {
                "tmp-".to_string()
            } else {
                prefix
            },
            next: 1,
            outstanding: BTreeSet::new(),
        }
    }

    /// Prefix that marks the temp namespace.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Issue a fresh id, distinct from every id issued before.
    pub fn issue(&mut self) -> RecordId {
        let id = RecordId::new(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        self.outstanding.insert(id.clone());
        id
    }

    /// True when `id` has the temp-id form.
    pub fn is_temp_id(&self, id: &str) -> bool {
        id.strip_prefix(self.prefix.as_str())
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }

    /// True when `id` was issued and not yet resolved or discarded.
    pub fn is_outstanding(&self, id: &str) -> bool {
        self.outstanding.contains(id)
    }

    /// Check that `temp` can be substituted by `permanent` without mutating.
    pub fn check(&self, temp: &RecordId, permanent: &RecordId) -> Result<(), TempIdError> {
        if !self.is_outstanding(temp.as_str()) {
            return Err(TempIdError::NotOutstanding(temp.clone()));
        }
        if self.is_temp_id(permanent.as_str()) {
            return Err(TempIdError::ServerIdInTempNamespace(permanent.clone()));
        }
        Ok(())
    }

    /// Retire `temp` after its substitution; succeeds once per issued id.
    pub fn resolve(&mut self, temp: &RecordId, permanent: &RecordId) -> Result<(), TempIdError> {
        self.check(temp, permanent)?;
        self.outstanding.remove(temp.as_str());
        Ok(())
    }

    /// Retire `temp` without substitution (its creation rolled back).
    pub fn discard(&mut self, temp: &str) -> bool {
        self.outstanding.remove(temp)
    }

    /// Forget every outstanding id; the counter keeps going.
    pub fn clear_outstanding(&mut self) {
        self.outstanding.clear();
    }

    /// Number of ids awaiting substitution.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}

impl Default for TempIdIssuer {
    fn default() -> Self {
        Self::new("tmp-")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn issued_ids_are_distinct_and_recognisable() {
        let mut ids = TempIdIssuer::default();
        let a = ids.issue();
        let b = ids.issue();
        assert_eq!(a.as_str(), "tmp-1");
        assert_ne!(a, b);
        assert!(ids.is_temp_id(a.as_str()));
        assert!(!ids.is_temp_id("srv-42"));
        assert!(!ids.is_temp_id("tmp-"));
        assert!(!ids.is_temp_id("tmp-abc"));
    }

    #[test]
    fn resolve_succeeds_exactly_once() {
        let mut ids = TempIdIssuer::default();
        let tmp = ids.issue();
        let srv = RecordId::from("srv-42");
        ids.resolve(&tmp, &srv).unwrap();
        assert_eq!(
            ids.resolve(&tmp, &srv),
            Err(TempIdError::NotOutstanding(tmp.clone()))
        );
        assert_eq!(ids.outstanding(), 0);
    }

    #[test]
    fn server_id_in_temp_form_is_rejected() {
        let mut ids = TempIdIssuer::default();
        let tmp = ids.issue();
        let bogus = RecordId::from("tmp-99");
        assert!(matches!(
            ids.resolve(&tmp, &bogus),
            Err(TempIdError::ServerIdInTempNamespace(_))
        ));
        assert!(ids.is_outstanding(tmp.as_str()));
    }

    #[test]
    fn counter_survives_clear() {
        let mut ids = TempIdIssuer::new("");
        let first = ids.issue();
        ids.clear_outstanding();
        let second = ids.issue();
        assert_ne!(first, second);
        assert_eq!(ids.prefix(), "tmp-");
    }
}
