// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted persistence API double.

use atrium_store::RecordId;
use atrium_sync::{NetworkError, PersistenceApi, SyncError};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// One scripted server answer.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Success with this canonical data (`null` for deletes).
    Ok(Value),
    /// Envelope error with this message.
    Server(String),
    /// Connection-level failure.
    Transport(String),
    /// Never answers; only a timeout ends the call.
    Hang,
}

/// A call the engine made.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// `create`, `update` or `delete`.
    pub method: &'static str,
    /// Entity-type name.
    pub entity: String,
    /// Request body (`{"id": ..}` for deletes).
    pub body: Value,
}

#[derive(Default)]
struct Inner {
    script: VecDeque<(Option<Duration>, Reply)>,
    calls: Vec<Call>,
    next_server_id: u64,
}

/// [`PersistenceApi`] that answers from a queue of scripted replies.
///
/// With the queue empty it behaves like a well-mannered server: creates get
/// an `srv-N` id, updates echo their body, deletes succeed. Clones share the
/// script and the call log.
#[derive(Clone, Default)]
pub struct ScriptedApi {
    inner: Rc<RefCell<Inner>>,
}

impl ScriptedApi {
    /// Empty script; every call succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next call.
    pub fn push(&self, reply: Reply) -> &Self {
        self.inner.borrow_mut().script.push_back((None, reply));
        self
    }

    /// Queue a reply delivered after `delay`.
    pub fn push_delayed(&self, delay: Duration, reply: Reply) -> &Self {
        self.inner
            .borrow_mut()
            .script
            .push_back((Some(delay), reply));
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.borrow().calls.clone()
    }

    /// Scripted replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.inner.borrow().script.len()
    }

    fn record(&self, method: &'static str, entity: &str, body: Value) -> Option<(Option<Duration>, Reply)> {
        let mut inner = self.inner.borrow_mut();
        inner.calls.push(Call {
            method,
            entity: entity.to_string(),
            body,
        });
        inner.script.pop_front()
    }

    fn next_server_id(&self) -> String {
        let mut inner = self.inner.borrow_mut();
        inner.next_server_id += 1;
        format!("srv-{}", inner.next_server_id)
    }

    async fn answer(&self, scripted: Option<(Option<Duration>, Reply)>, default: Value) -> Result<Value, SyncError> {
        let Some((delay, reply)) = scripted else {
            return Ok(default);
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Server(message) => Err(SyncError::Server {
                status: Some(422),
                message,
            }),
            Reply::Transport(reason) => Err(NetworkError::Transport(reason).into()),
            Reply::Hang => std::future::pending().await,
        }
    }
}

impl PersistenceApi for ScriptedApi {
    async fn create(&self, entity: &str, body: Value) -> Result<Value, SyncError> {
        let scripted = self.record("create", entity, body.clone());
        let mut default = body;
        if let Some(fields) = default.as_object_mut() {
            fields.insert("id".into(), Value::String(self.next_server_id()));
        }
        self.answer(scripted, default).await
    }

    async fn update(&self, entity: &str, body: Value) -> Result<Value, SyncError> {
        let scripted = self.record("update", entity, body.clone());
        self.answer(scripted, body).await
    }

    async fn delete(&self, entity: &str, id: &RecordId) -> Result<(), SyncError> {
        let scripted = self.record("delete", entity, json!({ "id": id.as_str() }));
        self.answer(scripted, Value::Null).await.map(|_| ())
    }
}
