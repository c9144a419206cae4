// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence port: the network half of a transaction.

use crate::error::SyncError;
use atrium_store::RecordId;
use futures_util::future::try_join_all;
use serde_json::Value;

/// Server API for one entity type's resource.
///
/// Bodies and responses use the engine's snake_case keys; adapters convert at
/// the wire boundary.
#[allow(async_fn_in_trait)]
pub trait PersistenceApi {
    /// Create a record; returns the canonical record with its permanent id.
    async fn create(&self, entity: &str, body: Value) -> Result<Value, SyncError>;

    /// Apply a partial update keyed by `body.id`; returns the canonical
    /// record, or `null` when the server sends none back.
    async fn update(&self, entity: &str, body: Value) -> Result<Value, SyncError>;

    /// Delete the record `id`.
    async fn delete(&self, entity: &str, id: &RecordId) -> Result<(), SyncError>;
}

/// One network call.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistCall {
    /// POST a new record (no id).
    Create {
        /// Record body.
        body: Value,
    },
    /// PUT a partial body keyed by id.
    Update {
        /// Partial body including `id`.
        body: Value,
    },
    /// DELETE by id.
    Delete {
        /// Record to delete.
        id: RecordId,
    },
}

/// Everything a transaction sends.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistRequest {
    /// A single call.
    Single(PersistCall),
    /// Calls issued concurrently; the first failure fails the batch.
    Batch(Vec<PersistCall>),
}

/// Server answer for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistReply {
    /// Canonical created record.
    Created(Value),
    /// Canonical updated record (may be `null`).
    Updated(Value),
    /// Deletion acknowledged.
    Deleted,
}

impl PersistReply {
    /// Canonical record carried by the reply, when it is an object.
    pub fn canonical(&self) -> Option<&Value> {
        match self {
            PersistReply::Created(v) | PersistReply::Updated(v) if v.is_object() => Some(v),
            _ => None,
        }
    }
}

/// Issue one call.
pub async fn send_call<A>(api: &A, entity: &str, call: PersistCall) -> Result<PersistReply, SyncError>
where
    A: PersistenceApi,
{
    match call {
        PersistCall::Create { body } => api.create(entity, body).await.map(PersistReply::Created),
        PersistCall::Update { body } => api.update(entity, body).await.map(PersistReply::Updated),
        PersistCall::Delete { id } => api.delete(entity, &id).await.map(|()| PersistReply::Deleted),
    }
}

/// Issue a whole request; replies come back in call order.
pub async fn send<A>(api: &A, entity: &str, request: PersistRequest) -> Result<Vec<PersistReply>, SyncError>
where
    A: PersistenceApi,
{
    match request {
        PersistRequest::Single(call) => Ok(vec![send_call(api, entity, call).await?]),
        PersistRequest::Batch(calls) => {
            try_join_all(calls.into_iter().map(|call| send_call(api, entity, call))).await
        }
    }
}
