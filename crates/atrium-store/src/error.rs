// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Error type for store operations.

use crate::ids::RecordId;
use thiserror::Error;

/// Failures raised by [`crate::Store`] and [`crate::Collection`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No collection is registered under this entity-type name.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
    /// The addressed record is not in the collection.
    #[error("{kind} record not found: {id}")]
    NotFound {
        /// Entity-type name.
        kind: &'static str,
        /// Missing record id.
        id: RecordId,
    },
    /// A patch or record did not deserialize into the entity schema.
    #[error("{kind} record does not match schema: {source}")]
    Decode {
        /// Entity-type name.
        kind: &'static str,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// A patch was expected to be a JSON object.
    #[error("{kind} patch must be a JSON object")]
    NotAnObject {
        /// Entity-type name.
        kind: &'static str,
    },
    /// A patch carried no usable `id` field.
    #[error("{kind} record has no id")]
    MissingId {
        /// Entity-type name.
        kind: &'static str,
    },
    /// A patch tried to rename a record.
    #[error("{kind} patch would rename {id} to {patched}")]
    IdChange {
        /// Entity-type name.
        kind: &'static str,
        /// Record being patched.
        id: RecordId,
        /// Id carried by the patch.
        patched: RecordId,
    },
}
