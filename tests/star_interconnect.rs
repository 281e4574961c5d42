//! Star-interconnect synthesis across three proxies sharing one group.

mod common;

use common::*;
use mesh_agent::api::wire;
use mesh_agent::mesh::apply_star_interconnect;
use mesh_agent::model::{BridgeTargetConfig, ConnKind};
use mesh_agent::AgentError;

struct Star {
    agent: TestAgent,
    p1: String,
    p2: String,
    p3: String,
    rx_conn: String,
    tx_conns: Vec<String>,
}

/// P1 carries the group's rx connection, P2 and P3 carry tx connections.
async fn build_star() -> Star {
    let agent = start_agent();
    let mut ids = Vec::new();
    for (st_ip, rdma_ip) in [
        ("192.168.96.1", "10.0.0.1"),
        ("192.168.96.2", "10.0.0.2"),
        ("192.168.96.3", "10.0.0.3"),
    ] {
        let id = agent
            .svc
            .register_media_proxy(register_proxy_request(st_ip, rdma_ip, "9100-9199"))
            .await
            .unwrap()
            .proxy_id;
        ids.push(id);
    }
    let (p1, p2, p3) = (ids[0].clone(), ids[1].clone(), ids[2].clone());

    let rx_conn = register_connection(&agent, &p1, "rx", video_group_config("g"))
        .await
        .unwrap();
    let mut tx_conns = Vec::new();
    for proxy in [&p2, &p3] {
        tx_conns.push(
            register_connection(&agent, proxy, "tx", video_group_config("g"))
                .await
                .unwrap(),
        );
    }

    Star { agent, p1, p2, p3, rx_conn, tx_conns }
}

#[tokio::test]
async fn star_synthesis_builds_two_pairs() {
    let star = build_star().await;
    let cx = &star.agent.cx;

    // The synthesizer runs off the async group events; wait for all four
    // half-bridges to land.
    eventually("four bridges synthesized", || async {
        cx.bridges.list(None, false, true).await.unwrap().len() == 4
    })
    .await;

    let bridges = cx.bridges.list(None, false, true).await.unwrap();
    let rdma = |b: &mesh_agent::model::Bridge| match &b.config.as_ref().unwrap().target {
        BridgeTargetConfig::Rdma(rdma) => rdma.clone(),
        other => panic!("expected rdma bridge, got {other:?}"),
    };

    for dest in [&star.p2, &star.p3] {
        // One rx half on the destination proxy at its own port 9100,
        // pointing back at the source's dataplane address.
        let rx: Vec<_> = bridges
            .iter()
            .filter(|b| &b.proxy_id == dest && b.config.as_ref().unwrap().kind == ConnKind::Rx)
            .collect();
        assert_eq!(rx.len(), 1, "one rx half on {dest}");
        assert_eq!(rx[0].group_id, "g");
        let target = rdma(rx[0]);
        assert_eq!(target.remote_ip, "10.0.0.1");
        assert_eq!(target.port, 9100);
    }

    // Two tx halves on the source proxy, one per destination, sharing the
    // destination's port.
    let tx: Vec<_> = bridges
        .iter()
        .filter(|b| b.proxy_id == star.p1 && b.config.as_ref().unwrap().kind == ConnKind::Tx)
        .collect();
    assert_eq!(tx.len(), 2);
    let mut tx_targets: Vec<(String, u32)> = tx
        .iter()
        .map(|b| {
            let t = rdma(b);
            (t.remote_ip.clone(), u32::from(t.port))
        })
        .collect();
    tx_targets.sort();
    assert_eq!(
        tx_targets,
        vec![("10.0.0.2".to_string(), 9100), ("10.0.0.3".to_string(), 9100)]
    );

    // Registry invariants hold for every proxy and the group.
    let group = cx.groups.get("g", false).await.unwrap();
    assert_eq!(group.bridge_ids.len(), 4);
    for proxy_id in [&star.p1, &star.p2, &star.p3] {
        let proxy = cx.proxies.get(proxy_id, false).await.unwrap();
        assert_eq!(proxy.status.as_ref().unwrap().bridges_num, proxy.bridge_ids.len());
        for bridge_id in &proxy.bridge_ids {
            assert!(group.bridge_ids.contains(bridge_id));
        }
    }
}

#[tokio::test]
async fn star_synthesis_rerun_is_a_noop() {
    let star = build_star().await;
    let cx = &star.agent.cx;

    eventually("four bridges synthesized", || async {
        cx.bridges.list(None, false, true).await.unwrap().len() == 4
    })
    .await;

    let mut before: Vec<String> = cx
        .bridges
        .list(None, false, false)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    before.sort();

    assert!(apply_star_interconnect(cx).await.unwrap());

    let mut after: Vec<String> = cx
        .bridges
        .list(None, false, false)
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    after.sort();
    assert_eq!(before, after, "re-run must not churn bridges");
}

#[tokio::test]
async fn group_teardown_deletes_bridges() {
    let star = build_star().await;
    let cx = &star.agent.cx;

    eventually("four bridges synthesized", || async {
        cx.bridges.list(None, false, true).await.unwrap().len() == 4
    })
    .await;

    // Drop every connection; the last unregistration empties the group.
    for (proxy_id, conn_id) in [
        (&star.p2, &star.tx_conns[0]),
        (&star.p3, &star.tx_conns[1]),
        (&star.p1, &star.rx_conn),
    ] {
        star.agent
            .svc
            .unregister_connection(wire::UnregisterConnectionRequest {
                proxy_id: proxy_id.clone(),
                conn_id: conn_id.clone(),
            })
            .await
            .unwrap();
    }

    eventually("group deleted", || async {
        matches!(
            cx.groups.get("g", false).await,
            Err(AgentError::ResourceNotFound)
        )
    })
    .await;
    eventually("bridges deleted", || async {
        cx.bridges.list(None, false, false).await.unwrap().is_empty()
    })
    .await;

    for proxy_id in [&star.p1, &star.p2, &star.p3] {
        let proxy = cx.proxies.get(proxy_id, false).await.unwrap();
        assert!(proxy.bridge_ids.is_empty(), "{proxy_id} still holds bridges");
        assert_eq!(proxy.status.unwrap().bridges_num, 0);
    }
}
