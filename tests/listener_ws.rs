mod common;

use common::StreamServer;
use open_energy_dashboard::domain::NodeId;
use open_energy_dashboard::sync::{ListenerExit, ListenerHandle, Patch, SyncEvent};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

async fn next_patch(rx: &mut mpsc::Receiver<SyncEvent>) -> Patch {
    match timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(SyncEvent::Patch(event))) => event.patch,
        other => panic!("expected a patch, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forwards_each_field_and_skips_garbage() {
    let server = StreamServer::start(
        vec![
            r#"{"hour": 5, "houses": [{"id": 1, "production": 5.0}]}"#.into(),
            "definitely not json".into(),
            r#"{"metrics": {"solarUsage": 40.0}, "energy_flows": "broken"}"#.into(),
        ],
        false,
    )
    .await;
    let (tx, mut rx) = mpsc::channel(16);
    let handle = ListenerHandle::spawn(server.url.clone(), tx, &CancellationToken::new());

    match next_patch(&mut rx).await {
        Patch::Nodes(nodes) => {
            assert_eq!(nodes.len(), 1);
            assert_eq!(nodes[0].id, NodeId(1));
            assert_eq!(nodes[0].production, Some(5.0));
            assert_eq!(nodes[0].consumption, None);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(next_patch(&mut rx).await, Patch::Hour(5));
    match next_patch(&mut rx).await {
        Patch::Metrics(m) => assert_eq!(m.solar_utilization_pct, Some(40.0)),
        other => panic!("unexpected {other:?}"),
    }

    assert!(matches!(handle.join().await, ListenerExit::Disconnected));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_close_stops_forwarding() {
    let server = StreamServer::start(vec![r#"{"hour": 1}"#.into()], true).await;
    let (tx, mut rx) = mpsc::channel(16);
    let handle = ListenerHandle::spawn(server.url.clone(), tx, &CancellationToken::new());

    assert_eq!(next_patch(&mut rx).await, Patch::Hour(1));
    assert!(matches!(handle.close().await, ListenerExit::Closed));
    // the task owned the only sender
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_parent_cancel_closes_listener() {
    let server = StreamServer::start(Vec::new(), true).await;
    let (tx, _rx) = mpsc::channel(16);
    let parent = CancellationToken::new();
    let handle = ListenerHandle::spawn(server.url.clone(), tx, &parent);

    tokio::time::sleep(Duration::from_millis(100)).await;
    parent.cancel();
    let exit = timeout(Duration::from_secs(5), handle.join()).await.unwrap();
    assert!(matches!(exit, ListenerExit::Closed));
}

#[tokio::test]
async fn test_does_not_reconnect_on_its_own() {
    let server = StreamServer::start(vec![r#"{"hour": 2}"#.into()], false).await;
    let (tx, mut rx) = mpsc::channel(16);
    let handle = ListenerHandle::spawn(server.url.clone(), tx, &CancellationToken::new());

    assert_eq!(next_patch(&mut rx).await, Patch::Hour(2));
    assert!(matches!(handle.join().await, ListenerExit::Disconnected));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connections(), 1);
}
