// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted realtime transport double.

use atrium_proto::{EventType, Topic};
use atrium_sync::{Inbound, RealtimeEvent, RealtimeTransport, TransportError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    connect_failures: usize,
    frames: VecDeque<Result<Inbound, TransportError>>,
    connects: Vec<Topic>,
    closes: usize,
}

/// [`RealtimeTransport`] replaying queued frames, then waiting for more.
///
/// Clones share the queue, so a test can keep feeding frames after handing
/// the transport to a channel.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    inner: Rc<RefCell<Inner>>,
    wake: Rc<Notify>,
}

impl ScriptedTransport {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` connect attempts.
    pub fn fail_connects(&self, n: usize) -> &Self {
        self.inner.borrow_mut().connect_failures = n;
        self
    }

    /// Queue a change notification.
    pub fn event(&self, entity: &str, kind: EventType, record: Value) -> &Self {
        self.frame(Ok(Inbound::Event(RealtimeEvent {
            entity_type: entity.to_string(),
            kind,
            record,
        })))
    }

    /// Queue any frame or failure.
    pub fn frame(&self, frame: Result<Inbound, TransportError>) -> &Self {
        self.inner.borrow_mut().frames.push_back(frame);
        self.wake.notify_one();
        self
    }

    /// Topics subscribed so far, one entry per successful connect.
    pub fn connects(&self) -> Vec<Topic> {
        self.inner.borrow().connects.clone()
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.inner.borrow().closes
    }
}

impl RealtimeTransport for ScriptedTransport {
    async fn connect(&mut self, topic: &Topic) -> Result<(), TransportError> {
        let mut inner = self.inner.borrow_mut();
        if inner.connect_failures > 0 {
            inner.connect_failures -= 1;
            return Err(TransportError("connection refused".into()));
        }
        inner.connects.push(topic.clone());
        Ok(())
    }

    async fn next(&mut self) -> Result<Inbound, TransportError> {
        loop {
            let frame = self.inner.borrow_mut().frames.pop_front();
            if let Some(frame) = frame {
                return frame;
            }
            self.wake.notified().await;
        }
    }

    async fn close(&mut self, _topic: &Topic) {
        self.inner.borrow_mut().closes += 1;
    }
}
