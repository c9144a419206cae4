// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Realtime channel lifecycle: subscribe, reconcile, resubscribe, shutdown.
#![allow(clippy::unwrap_used)]

use atrium_app_core::prefs::SyncPrefs;
use atrium_app_core::render_port::Region;
use atrium_dry_tests::{session, task_ids, ScriptedTransport, Task, WORKSPACE};
use atrium_proto::{EventType, Topic};
use atrium_sync::{ChannelStats, Inbound, RealtimeChannel, TransportError};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;

#[tokio::test(start_paused = true)]
async fn channel_reconciles_and_resubscribes_after_failures() {
    let session = session(SyncPrefs::default());
    let transport = ScriptedTransport::new();
    transport
        .fail_connects(1)
        .event(
            "tasks",
            EventType::Insert,
            json!({"id": "t1", "workspace_id": WORKSPACE, "title": "Call Bob", "status": "todo"}),
        )
        .frame(Err(TransportError("connection reset".into())))
        .event("tasks", EventType::Update, json!({"id": "t1", "status": "done"}))
        .event(
            "tasks",
            EventType::Insert,
            json!({"id": "t9", "workspace_id": "ws-other", "title": "Leak", "status": "todo"}),
        )
        .frame(Ok(Inbound::Malformed("not json".into())));

    let channel = RealtimeChannel::new(&session, "tasks", transport.clone());
    assert_eq!(channel.topic(), &Topic::new(WORKSPACE, "tasks"));
    let (stop, shutdown) = watch::channel(false);

    let (stats, ()) = tokio::join!(channel.run(shutdown), async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        stop.send(true).unwrap();
    });

    assert_eq!(
        stats,
        ChannelStats {
            applied: 2,
            dropped: 2,
            resubscribes: 2,
        }
    );
    assert_eq!(transport.connects().len(), 2);
    assert_eq!(transport.closes(), 1);
    assert_eq!(task_ids(&session), ["t1"]);
    assert_eq!(session.query::<Task, _>(|_| true)[0].status, "done");
    assert!(session.dirty().peek().contains(&Region::Page));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_fixed_and_interruptible() {
    let session = session(SyncPrefs {
        resubscribe_backoff_ms: 1_000,
        ..SyncPrefs::default()
    });
    let transport = ScriptedTransport::new();
    transport.fail_connects(100);
    let channel = RealtimeChannel::new(&session, "tasks", transport.clone());
    let (stop, shutdown) = watch::channel(false);

    let started = tokio::time::Instant::now();
    let (stats, ()) = tokio::join!(channel.run(shutdown), async {
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        stop.send(true).unwrap();
    });

    // attempts at t = 0, 1, 2, 3, 4 seconds; shutdown lands mid-backoff
    assert_eq!(stats.resubscribes, 5);
    assert!(transport.connects().is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_the_channel() {
    let session = session(SyncPrefs::default());
    let transport = ScriptedTransport::new();
    let channel = RealtimeChannel::new(&session, "deals", transport.clone());
    let (stop, shutdown) = watch::channel(false);
    drop(stop);

    let stats = channel.run(shutdown).await;

    assert_eq!(stats, ChannelStats::default());
    assert_eq!(transport.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn tenant_switch_moves_the_subscription() {
    let session = session(SyncPrefs::default());
    let transport = ScriptedTransport::new();
    let channel = RealtimeChannel::new(&session, "tasks", transport.clone());
    let (stop, shutdown) = watch::channel(false);

    let (stats, ()) = tokio::join!(channel.run(shutdown), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session.reset("ws-2".into());
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport.event(
            "tasks",
            EventType::Insert,
            json!({"id": "t2", "workspace_id": "ws-2", "title": "Fresh start", "status": "todo"}),
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.send(true).unwrap();
    });

    assert_eq!(
        transport.connects(),
        [Topic::new(WORKSPACE, "tasks"), Topic::new("ws-2", "tasks")]
    );
    // one unsubscribe on the switch, one on shutdown
    assert_eq!(transport.closes(), 2);
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.resubscribes, 0);
    assert_eq!(task_ids(&session), ["t2"]);
}
