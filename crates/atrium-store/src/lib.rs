// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Entity store for the Atrium client cache.
//!
//! Typed, ordered per-entity collections keyed by id. The store is the single
//! source of UI truth; the sync engine mutates it optimistically and the
//! realtime reconciler merges pushed changes into it.
#![forbid(unsafe_code)]

pub mod collection;
pub mod entity;
pub mod error;
pub mod ids;
pub mod store;

pub use collection::Collection;
pub use entity::{decode_record, merge_patch, value_id, Entity, UpsertMode, Upserted};
pub use error::StoreError;
pub use ids::{RecordId, WorkspaceId};
pub use store::Store;
