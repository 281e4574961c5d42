//! Command stream attach/detach lifecycle and request/reply correlation
//! through the full service path.

mod common;

use common::*;
use mesh_agent::api::wire;
use mesh_agent::AgentError;

#[tokio::test]
async fn attached_stream_round_trips_commands() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    let (_stream_cancel, seen) = attach_stream(&agent, &proxy_id);

    eventually("proxy marked active", || async {
        agent.cx.proxies.get(&proxy_id, false).await.unwrap().active
    })
    .await;

    // Attaching posts on-activate-proxy, which pushes a config down the
    // fresh stream.
    eventually("apply-config delivered", || async {
        seen.lock()
            .unwrap()
            .iter()
            .any(|req| matches!(req.command, Some(wire::Command::ApplyConfig(_))))
    })
    .await;

    // A debug command round-trips through the pending map.
    let proxy = agent.cx.proxies.get(&proxy_id, false).await.unwrap();
    let out = proxy
        .exec_debug_command("ping", agent.cx.cfg.command_timeout)
        .await
        .unwrap();
    assert_eq!(out, "ping");
}

#[tokio::test]
async fn detached_stream_fails_fast_and_recovers() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    let proxy = agent.cx.proxies.get(&proxy_id, false).await.unwrap();
    assert_eq!(
        proxy
            .exec_debug_command("ping", agent.cx.cfg.command_timeout)
            .await
            .unwrap_err(),
        AgentError::ProxyNotReady
    );

    // Attach, verify it works, detach, verify commands fail fast again.
    let (stream_cancel, _seen) = attach_stream(&agent, &proxy_id);
    eventually("proxy marked active", || async {
        agent.cx.proxies.get(&proxy_id, false).await.unwrap().active
    })
    .await;
    proxy
        .exec_debug_command("ping", agent.cx.cfg.command_timeout)
        .await
        .unwrap();

    stream_cancel.cancel();
    eventually("proxy marked inactive", || async {
        !agent.cx.proxies.get(&proxy_id, false).await.unwrap().active
    })
    .await;
    assert_eq!(
        proxy
            .exec_debug_command("ping", agent.cx.cfg.command_timeout)
            .await
            .unwrap_err(),
        AgentError::ProxyNotReady
    );
}

#[tokio::test]
async fn reply_for_unknown_request_is_rejected() {
    let agent = start_agent();
    let err = agent
        .svc
        .send_command_reply(wire::CommandReply {
            req_id: "no-such-req".into(),
            proxy_id: "p".into(),
            reply: Some(wire::Reply::ApplyConfig(wire::ApplyConfigReply {})),
        })
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::ReplyNotFound);
}

#[tokio::test]
async fn metrics_are_upserted_per_provider() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;

    agent
        .svc
        .send_metrics(wire::SendMetricsRequest {
            proxy_id: proxy_id.clone(),
            metrics: vec![
                wire::Metric {
                    timestamp_ms: 1_700_000_000_000,
                    provider_id: "conn-1".into(),
                    fields: vec![wire::MetricField {
                        name: "in".into(),
                        value: wire::MetricValue::UintValue(512),
                    }],
                },
                wire::Metric {
                    timestamp_ms: 1_700_000_001_000,
                    provider_id: "conn-1".into(),
                    fields: vec![wire::MetricField {
                        name: "in".into(),
                        value: wire::MetricValue::UintValue(1024),
                    }],
                },
            ],
        })
        .await
        .unwrap();

    let metric = agent.cx.telemetry.get_metric("conn-1").unwrap();
    assert_eq!(metric.timestamp_ms, 1_700_000_001_000);

    // Metrics for an unknown proxy are refused.
    let err = agent
        .svc
        .send_metrics(wire::SendMetricsRequest {
            proxy_id: "unknown".into(),
            metrics: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(err, AgentError::ResourceNotFound);
}
