//! End-to-end scenarios over the proxy service: registration, group
//! lifecycle, compatibility gating and reconnects.

mod common;

use common::*;
use mesh_agent::api::wire;
use mesh_agent::model::sdk::SdkPayload;
use mesh_agent::AgentError;

#[tokio::test]
async fn solo_proxy_registration() {
    let agent = start_agent();

    let reply = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap();
    assert!(!reply.proxy_id.is_empty());

    let proxies = agent.cx.proxies.list(None, true, true).await.unwrap();
    assert_eq!(proxies.len(), 1);
    let proxy = &proxies[0];
    assert_eq!(proxy.id, reply.proxy_id);

    let status = proxy.status.as_ref().unwrap();
    assert!(status.healthy);
    assert_eq!(status.conns_num, 0);

    let config = proxy.config.as_ref().unwrap();
    assert_eq!(config.sdk_api_port, 2345);
    assert_eq!(config.st2110.dev_port_bdf, "0000:32:01.0");
    assert_eq!(config.st2110.dataplane_ip_addr, "192.168.96.10");
    assert_eq!(config.rdma.dataplane_ip_addr, "192.168.97.10");
    assert_eq!(config.rdma.dataplane_local_ports, "9100-9199");
}

#[tokio::test]
async fn proxy_registration_requires_valid_port_ranges() {
    let agent = start_agent();
    let err = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "oops"))
        .await
        .unwrap_err();
    // The port list fails to parse, so no proxy id is ever produced.
    assert!(matches!(err, AgentError::Other(_)), "{err:?}");
    assert!(agent.cx.proxies.list(None, false, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn group_created_on_first_join() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    let conn_id = register_connection(&agent, &proxy_id, "tx", video_group_config("abc"))
        .await
        .unwrap();
    assert!(!conn_id.is_empty());

    let conn = agent.cx.conns.get(&conn_id, true).await.unwrap();
    assert_eq!(conn.group_id, "abc");
    assert_eq!(conn.proxy_id, proxy_id);

    let group = agent.cx.groups.get("abc", true).await.unwrap();
    assert_eq!(group.conn_ids, vec![conn_id.clone()]);
    // The first joiner's payload becomes the canonical group config.
    let group_cfg = group.config.unwrap();
    assert!(matches!(group_cfg.payload, SdkPayload::Video(ref v) if v.width == 1920));

    let proxy = agent.cx.proxies.get(&proxy_id, false).await.unwrap();
    assert_eq!(proxy.conn_ids, vec![conn_id]);
    assert_eq!(proxy.status.unwrap().conns_num, 1);
}

#[tokio::test]
async fn incompatible_second_joiner_is_rejected() {
    let agent = start_agent();
    let p = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;
    let q = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.11", "192.168.97.11", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    register_connection(&agent, &p, "tx", video_group_config("abc"))
        .await
        .unwrap();

    let err = register_connection(&agent, &q, "rx", audio_group_config("abc"))
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("no video cfg") || msg.contains("incompatible"),
        "unexpected rejection message: {msg}"
    );

    // Group membership is unchanged.
    let group = agent.cx.groups.get("abc", false).await.unwrap();
    assert_eq!(group.conn_ids.len(), 1);
    let q_proxy = agent.cx.proxies.get(&q, false).await.unwrap();
    assert!(q_proxy.conn_ids.is_empty());
}

#[tokio::test]
async fn second_rx_joiner_is_rejected() {
    let agent = start_agent();
    let p = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    register_connection(&agent, &p, "rx", video_group_config("abc"))
        .await
        .unwrap();
    let err = register_connection(&agent, &p, "rx", video_group_config("abc"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("rx conn already linked"), "{err}");
}

#[tokio::test]
async fn empty_group_cleanup() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    let conn_id = register_connection(&agent, &proxy_id, "tx", video_group_config("abc"))
        .await
        .unwrap();
    agent.cx.groups.get("abc", false).await.unwrap();

    agent
        .svc
        .unregister_connection(wire::UnregisterConnectionRequest {
            proxy_id: proxy_id.clone(),
            conn_id: conn_id.clone(),
        })
        .await
        .unwrap();

    assert_eq!(
        agent.cx.conns.get(&conn_id, false).await.unwrap_err(),
        AgentError::ResourceNotFound
    );
    assert_eq!(
        agent.cx.groups.get("abc", false).await.unwrap_err(),
        AgentError::ResourceNotFound
    );
    let proxy = agent.cx.proxies.get(&proxy_id, false).await.unwrap();
    assert!(proxy.conn_ids.is_empty());
}

#[tokio::test]
async fn reconnect_preserves_connection_id() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;
    let conn_id = register_connection(&agent, &proxy_id, "tx", video_group_config("abc"))
        .await
        .unwrap();

    // Known id: the same id comes back with success.
    let reply = agent
        .svc
        .register_connection(wire::RegisterConnectionRequest {
            proxy_id: proxy_id.clone(),
            kind: "tx".into(),
            conn_id: conn_id.clone(),
            config: None,
        })
        .await
        .unwrap();
    assert_eq!(reply.conn_id, conn_id);

    // No duplicate membership appeared.
    let group = agent.cx.groups.get("abc", false).await.unwrap();
    assert_eq!(group.conn_ids.len(), 1);

    // Unknown id: the proxy is told to drop its local copy.
    let err = agent
        .svc
        .register_connection(wire::RegisterConnectionRequest {
            proxy_id,
            kind: "tx".into(),
            conn_id: "no-such-conn".into(),
            config: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::ResourceNotFound);
}

#[tokio::test]
async fn unregister_proxy_removes_it() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    agent
        .svc
        .unregister_media_proxy(wire::UnregisterMediaProxyRequest {
            proxy_id: proxy_id.clone(),
        })
        .await
        .unwrap();

    assert_eq!(
        agent.cx.proxies.get(&proxy_id, false).await.unwrap_err(),
        AgentError::ResourceNotFound
    );
}
