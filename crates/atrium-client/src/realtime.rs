// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Realtime transport over a Unix socket speaking newline-delimited JSON.

use atrium_proto::wire::{decode_message, encode_message, MAX_FRAME_BYTES};
use atrium_proto::{Message, Topic};
use atrium_sync::{Inbound, RealtimeTransport, TransportError};
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tracing::{debug, warn};

struct Conn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

enum Line {
    Frame(Vec<u8>),
    Overlong,
    Eof,
}

impl Conn {
    /// Read one line of at most `MAX_FRAME_BYTES`; a longer line is consumed
    /// up to its newline without being buffered.
    async fn read_line(&mut self) -> io::Result<Line> {
        let mut line = Vec::new();
        let limit = MAX_FRAME_BYTES as u64 + 1;
        let n = (&mut self.reader).take(limit).read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Ok(Line::Eof);
        }
        if line.len() > MAX_FRAME_BYTES && line.last() != Some(&b'\n') {
            self.skip_line().await?;
            return Ok(Line::Overlong);
        }
        Ok(Line::Frame(line))
    }

    async fn skip_line(&mut self) -> io::Result<()> {
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(());
            }
            if let Some(end) = buf.iter().position(|b| *b == b'\n') {
                self.reader.consume(end + 1);
                return Ok(());
            }
            let len = buf.len();
            self.reader.consume(len);
        }
    }
}

/// [`RealtimeTransport`] connecting to the realtime host's Unix socket.
///
/// Each `connect` opens a fresh stream and sends one `subscribe` line; the
/// host then pushes `event` lines for that topic.
pub struct UnixRealtimeTransport {
    path: PathBuf,
    conn: Option<Conn>,
    seq: u64,
}

impl UnixRealtimeTransport {
    /// Transport for the socket at `path`; nothing is opened until `connect`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: None,
            seq: 0,
        }
    }

    /// Socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while a stream is open.
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        self.seq += 1;
        let line = encode_message(msg, self.seq).map_err(|e| TransportError(e.to_string()))?;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| TransportError("not connected".into()))?;
        conn.writer
            .write_all(&line)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}

impl RealtimeTransport for UnixRealtimeTransport {
    async fn connect(&mut self, topic: &Topic) -> Result<(), TransportError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|e| TransportError(format!("{}: {e}", self.path.display())))?;
        let (read, write) = stream.into_split();
        self.conn = Some(Conn {
            reader: BufReader::new(read),
            writer: write,
        });
        if let Err(err) = self.send(&Message::Subscribe(topic.clone())).await {
            self.conn = None;
            return Err(err);
        }
        debug!(%topic, path = %self.path.display(), "subscribe sent");
        Ok(())
    }

    async fn next(&mut self) -> Result<Inbound, TransportError> {
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| TransportError("not connected".into()))?;
        let read = conn.read_line().await;
        let line = match read {
            Ok(Line::Frame(line)) => line,
            Ok(Line::Overlong) => {
                warn!(max = MAX_FRAME_BYTES, "oversized realtime frame skipped");
                return Ok(Inbound::Malformed(format!("frame exceeds {MAX_FRAME_BYTES} bytes")));
            }
            Ok(Line::Eof) => {
                self.conn = None;
                return Ok(Inbound::Closed);
            }
            Err(err) => {
                self.conn = None;
                return Err(TransportError(err.to_string()));
            }
        };
        Ok(match decode_message(&line) {
            Ok((Message::Event(payload), _)) => Inbound::Event(payload.into()),
            Ok((Message::Error(err), _)) => {
                self.conn = None;
                return Err(TransportError(err.message));
            }
            Ok((other, _)) => Inbound::Malformed(format!("unexpected {} frame", other.op_name())),
            Err(err) => Inbound::Malformed(err.to_string()),
        })
    }

    async fn close(&mut self, topic: &Topic) {
        if self.conn.is_none() {
            return;
        }
        if let Err(err) = self.send(&Message::Unsubscribe(topic.clone())).await {
            warn!(%topic, error = %err, "unsubscribe failed");
        }
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.writer.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use atrium_proto::{EventPayload, EventType};
    use serde_json::json;
    use tokio::net::UnixListener;

    fn socket_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("atrium-{name}-{}-{nanos}.sock", std::process::id()))
    }

    #[tokio::test]
    async fn subscribes_then_yields_events_until_close() {
        let path = socket_path("rt");
        let listener = UnixListener::bind(&path).unwrap();
        let host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).await.unwrap();
            let (msg, _) = decode_message(&line).unwrap();
            let event = Message::Event(EventPayload {
                entity: "tasks".into(),
                event_type: EventType::Update,
                record: json!({"id": "t1", "due_date": "2026-01-01"}),
            });
            write.write_all(&encode_message(&event, 1).unwrap()).await.unwrap();
            write.write_all(b"{\"op\":\"bogus\",\"ts\":2,\"payload\":{}}\n").await.unwrap();
            msg
        });

        let topic = Topic::new("ws-1", "tasks");
        let mut transport = UnixRealtimeTransport::new(&path);
        transport.connect(&topic).await.unwrap();

        match transport.next().await.unwrap() {
            Inbound::Event(e) => {
                assert_eq!(e.entity_type, "tasks");
                assert_eq!(e.kind, EventType::Update);
                assert_eq!(e.record, json!({"id": "t1", "due_date": "2026-01-01"}));
            }
            other => panic!("expected event, got {other:?}"),
        }
        assert!(matches!(transport.next().await.unwrap(), Inbound::Malformed(_)));

        assert_eq!(host.await.unwrap(), Message::Subscribe(topic.clone()));
        assert_eq!(transport.next().await.unwrap(), Inbound::Closed);
        assert!(!transport.is_connected());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn oversized_line_is_skipped_without_losing_the_stream() {
        let path = socket_path("big");
        let listener = UnixListener::bind(&path).unwrap();
        let host = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut line = Vec::new();
            reader.read_until(b'\n', &mut line).await.unwrap();
            let mut junk = vec![b'x'; MAX_FRAME_BYTES + 4096];
            junk.push(b'\n');
            write.write_all(&junk).await.unwrap();
            let event = Message::Event(EventPayload {
                entity: "tasks".into(),
                event_type: EventType::Delete,
                record: json!({"id": "t1"}),
            });
            write.write_all(&encode_message(&event, 1).unwrap()).await.unwrap();
        });

        let mut transport = UnixRealtimeTransport::new(&path);
        transport.connect(&Topic::new("ws-1", "tasks")).await.unwrap();
        assert!(matches!(transport.next().await.unwrap(), Inbound::Malformed(_)));
        match transport.next().await.unwrap() {
            Inbound::Event(e) => assert_eq!(e.kind, EventType::Delete),
            other => panic!("expected event, got {other:?}"),
        }
        host.await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_socket_is_a_transport_error() {
        let mut transport = UnixRealtimeTransport::new(socket_path("missing"));
        let err = transport.connect(&Topic::new("ws", "tasks")).await.unwrap_err();
        assert!(err.0.contains("atrium-missing"));
        assert!(transport.next().await.is_err());
    }
}
