//! Node Runtime Tests
//!
//! ## Test Scopes
//! - **Status API**: Handlers render the latest published snapshot.
//! - **UDP Runtime**: Real sockets on loopback (introducer bootstrap, two-node admission).

#[cfg(test)]
mod tests {
    use crate::membership::types::{Endpoint, NodeState};
    use crate::node::handlers::{handle_get_member, handle_members, handle_status};
    use crate::node::service::{NodeService, next_backoff};
    use crate::node::types::{MemberView, NodeOptions, NodeSnapshot};
    use axum::extract::{Extension, Path};
    use axum::http::StatusCode;
    use std::time::Duration;
    use tokio::sync::{oneshot, watch};

    fn snapshot() -> NodeSnapshot {
        NodeSnapshot {
            endpoint: Endpoint::new(1, 0),
            state: NodeState::Member,
            tick: 12,
            heartbeat: 12,
            malformed: 0,
            members: vec![
                MemberView {
                    endpoint: Endpoint::new(1, 0),
                    heartbeat: 12,
                    last_update: 11,
                    suspected: false,
                },
                MemberView {
                    endpoint: Endpoint::new(2, 0),
                    heartbeat: 9,
                    last_update: 4,
                    suspected: true,
                },
            ],
            recent_events: Vec::new(),
        }
    }

    /// A base port such that `base + 1` and `base + 2` were free a moment ago.
    fn free_base_port() -> u16 {
        for _ in 0..64 {
            let scratch = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            let port = scratch.local_addr().unwrap().port();
            drop(scratch);

            if port < 2 || port == u16::MAX {
                continue;
            }
            if std::net::UdpSocket::bind(("127.0.0.1", port + 1)).is_ok() {
                return port - 1;
            }
        }
        panic!("no free port pair found");
    }

    fn fast(id: i32, base_port: u16) -> NodeOptions {
        let mut options = NodeOptions::local(id, base_port);
        options.tick_interval = Duration::from_millis(10);
        options.join_retry = 5;
        options.protocol = options.protocol.with_seed(id as u64);
        options
    }

    async fn wait_for(
        rx: &mut watch::Receiver<NodeSnapshot>,
        condition: impl Fn(&NodeSnapshot) -> bool,
    ) -> NodeSnapshot {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let current = rx.borrow_and_update();
                    if condition(&current) {
                        return current.clone();
                    }
                }
                rx.changed().await.expect("node stopped publishing");
            }
        })
        .await
        .expect("condition not reached in time")
    }

    // ============================================================
    // STATUS API TESTS
    // ============================================================

    #[tokio::test]
    async fn test_status_handler_returns_latest_snapshot() {
        let (tx, rx) = watch::channel(snapshot());

        let first = handle_status(Extension(rx.clone())).await.0;
        assert_eq!(first.tick, 12);

        let mut next = snapshot();
        next.tick = 13;
        tx.send_replace(next);

        let second = handle_status(Extension(rx)).await.0;
        assert_eq!(second.tick, 13);
    }

    #[tokio::test]
    async fn test_members_handler_lists_table() {
        let (_tx, rx) = watch::channel(snapshot());

        let members = handle_members(Extension(rx)).await.0;
        assert_eq!(members.len(), 2);
        assert!(members[1].suspected);
    }

    #[tokio::test]
    async fn test_get_member_handler() {
        let (_tx, rx) = watch::channel(snapshot());

        let found = handle_get_member(Extension(rx.clone()), Path(2)).await.unwrap().0;
        assert_eq!(found.endpoint, Endpoint::new(2, 0));

        let missing = handle_get_member(Extension(rx), Path(7)).await;
        assert_eq!(missing.err(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_snapshot_serializes() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(value["members"][1]["suspected"], true);
        assert_eq!(value["endpoint"]["id"], 1);
    }

    // ============================================================
    // UDP RUNTIME TESTS
    // ============================================================

    #[tokio::test]
    async fn test_introducer_runs_heartbeats() {
        let base = free_base_port();
        let service = NodeService::bind(fast(1, base)).unwrap();
        assert_eq!(service.local_addr().port(), base + 1);

        let mut rx = service.subscribe();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(service.run(async {
            let _ = stop_rx.await;
        }));

        let snapshot = wait_for(&mut rx, |s| s.heartbeat >= 3).await;
        assert_eq!(snapshot.state, NodeState::Member);
        assert_eq!(snapshot.members.len(), 1);

        stop_tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_two_nodes_join_over_udp() {
        let base = free_base_port();
        let introducer = NodeService::bind(fast(1, base)).unwrap();
        let joiner = NodeService::bind(fast(2, base)).unwrap();

        let mut introducer_rx = introducer.subscribe();
        let mut joiner_rx = joiner.subscribe();

        let (stop_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let mut handles = Vec::new();
        for service in [introducer, joiner] {
            let mut stop = stop_tx.subscribe();
            handles.push(tokio::spawn(service.run(async move {
                let _ = stop.recv().await;
            })));
        }

        let joined = wait_for(&mut joiner_rx, |s| {
            s.state == NodeState::Member && s.knows(&Endpoint::new(1, 0))
        })
        .await;
        assert_eq!(joined.endpoint, Endpoint::new(2, 0));

        wait_for(&mut introducer_rx, |s| s.knows(&Endpoint::new(2, 0))).await;

        stop_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_joiner_started_late_is_admitted_and_kept() {
        let base = free_base_port();
        let mut introducer_options = fast(1, base);
        introducer_options.tick_interval = Duration::from_millis(30);
        let mut joiner_options = fast(2, base);
        joiner_options.tick_interval = Duration::from_millis(30);

        let (stop_tx, _) = tokio::sync::broadcast::channel::<()>(1);
        let mut handles = Vec::new();

        let introducer = NodeService::bind(introducer_options).unwrap();
        let mut introducer_rx = introducer.subscribe();
        let mut stop = stop_tx.subscribe();
        handles.push(tokio::spawn(introducer.run(async move {
            let _ = stop.recv().await;
        })));

        // Let the introducer run alone for a while before the joiner exists.
        let head_start = wait_for(&mut introducer_rx, |s| s.heartbeat >= 20).await;

        let joiner = NodeService::bind(joiner_options).unwrap();
        let mut joiner_rx = joiner.subscribe();
        let mut stop = stop_tx.subscribe();
        handles.push(tokio::spawn(joiner.run(async move {
            let _ = stop.recv().await;
        })));

        let joined = wait_for(&mut joiner_rx, |s| {
            s.state == NodeState::Member && s.knows(&Endpoint::new(1, 0))
        })
        .await;
        assert!(joined.tick >= head_start.tick);

        let admitted = wait_for(&mut introducer_rx, |s| s.knows(&Endpoint::new(2, 0))).await;

        // Well past timeout + cleanup: the joiner must still be listed, unsuspected.
        let later = wait_for(&mut introducer_rx, |s| {
            s.heartbeat >= admitted.heartbeat + 15
        })
        .await;
        let view = later
            .members
            .iter()
            .find(|m| m.endpoint == Endpoint::new(2, 0))
            .expect("introducer dropped the late joiner");
        assert!(!view.suspected);

        let joiner_now = joiner_rx.borrow().clone();
        let view = joiner_now
            .members
            .iter()
            .find(|m| m.endpoint == Endpoint::new(1, 0))
            .expect("joiner dropped the introducer");
        assert!(!view.suspected);

        stop_tx.send(()).unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[test]
    fn test_receive_backoff_grows_and_caps() {
        let first = next_backoff(None);
        assert_eq!(first, Duration::from_millis(10));

        let second = next_backoff(Some(first));
        assert_eq!(second, Duration::from_millis(20));

        let mut delay = second;
        for _ in 0..20 {
            delay = next_backoff(Some(delay));
        }
        assert_eq!(delay, Duration::from_secs(1));
    }
}
