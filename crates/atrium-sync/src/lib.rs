// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Optimistic sync engine for the Atrium client cache.
//!
//! Mutations apply to the [`Store`](atrium_store::Store) immediately, persist
//! in the background and either commit the server's canonical records or roll
//! back to a snapshot. Realtime pushes are reconciled into the same store and
//! every change dirties UI regions that a [`RenderScheduler`] re-renders in
//! coalesced passes.
//!
//! Everything runs on one thread: handles are `Rc`-based and futures are
//! `!Send`. Drive them with a current-thread tokio runtime or a `LocalSet`.
#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod mutation;
pub mod persist;
pub mod realtime;
pub mod render;
pub mod session;
pub mod temp_id;
pub mod transaction;

pub use engine::{SyncEngine, TxOutcome};
pub use error::{NetworkError, SyncError, TempIdError};
pub use mutation::{Mutation, DEFAULT_SORT_FIELD};
pub use persist::{PersistCall, PersistReply, PersistRequest, PersistenceApi};
pub use realtime::{
    Applied, ChannelStats, Inbound, RealtimeChannel, RealtimeEvent, RealtimeTransport,
    ReconcileError, Reconciler, TransportError,
};
pub use render::{project_view_model, DirtyRegions, FlushReport, RenderScheduler, ViewModel, ViewProjector};
pub use session::Session;
pub use temp_id::TempIdIssuer;
pub use transaction::{Resolution, Snapshot, Transaction, TxId, TxStatus, ROLLBACK_TOAST_TITLE};
