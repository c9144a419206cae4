// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! REST persistence adapter.
//!
//! `create` POSTs, `update` PUTs a partial body keyed by id, `delete` sends
//! DELETE with body `{id}`; all against `{base}/{entity}`. Bodies leave in
//! camelCase and responses come back through the envelope decoder in
//! snake_case.

use anyhow::Result;
use atrium_proto::{decode_envelope, encode_body, ProtoError};
use atrium_store::RecordId;
use atrium_sync::{NetworkError, PersistenceApi, SyncError};
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

/// [`PersistenceApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPersistence {
    client: Client,
    base: String,
}

impl HttpPersistence {
    /// Adapter for the API rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Adapter reusing an existing client (shared pool, custom headers).
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Resource URL for `entity`.
    pub fn endpoint(&self, entity: &str) -> String {
        format!("{}/{}", self.base, entity)
    }

    async fn send(&self, method: Method, entity: &str, body: &Value) -> Result<Value, SyncError> {
        let url = self.endpoint(entity);
        debug!(%method, %url, "persist request");
        let response = self
            .client
            .request(method, &url)
            .json(&encode_body(body))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport)?;
        interpret(status, &bytes)
    }
}

fn transport(err: reqwest::Error) -> SyncError {
    NetworkError::Transport(err.to_string()).into()
}

/// Map a status and body to canonical data or the right error.
fn interpret(status: StatusCode, body: &[u8]) -> Result<Value, SyncError> {
    let code = Some(status.as_u16());
    let reason = || status.canonical_reason().unwrap_or("request failed").to_string();
    match decode_envelope(body) {
        Err(ProtoError::Rejected(err)) => Err(SyncError::Server {
            status: code,
            message: err.message,
        }),
        Ok(_) | Err(_) if !status.is_success() => Err(SyncError::Server {
            status: code,
            message: reason(),
        }),
        Ok(data) => Ok(data),
        Err(_) if body.is_empty() => Ok(Value::Null),
        Err(err) => Err(SyncError::Server {
            status: code,
            message: format!("malformed response: {err}"),
        }),
    }
}

impl PersistenceApi for HttpPersistence {
    async fn create(&self, entity: &str, body: Value) -> Result<Value, SyncError> {
        self.send(Method::POST, entity, &body).await
    }

    async fn update(&self, entity: &str, body: Value) -> Result<Value, SyncError> {
        self.send(Method::PUT, entity, &body).await
    }

    async fn delete(&self, entity: &str, id: &RecordId) -> Result<(), SyncError> {
        self.send(Method::DELETE, entity, &json!({ "id": id.as_str() }))
            .await
            .map(|_| ())
    }
}
