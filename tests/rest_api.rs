//! REST management surface over a live listener.

mod common;

use std::net::SocketAddr;

use common::*;
use serde_json::Value;

async fn serve_rest(agent: &TestAgent) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = mesh_agent::api::router(agent.cx.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

#[tokio::test]
async fn listing_wraps_resources_and_honors_flags() {
    let agent = start_agent();
    let proxy_id = agent
        .svc
        .register_media_proxy(register_proxy_request("192.168.96.10", "192.168.97.10", "9100-9199"))
        .await
        .unwrap()
        .proxy_id;
    register_connection(&agent, &proxy_id, "tx", video_group_config("abc"))
        .await
        .unwrap();

    let addr = serve_rest(&agent).await;
    let client = reqwest::Client::new();

    // Full projections requested.
    let body: Value = client
        .get(format!("http://{addr}/media-proxy?config&status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let proxies = body["mediaProxy"].as_array().unwrap();
    assert_eq!(proxies.len(), 1);
    let proxy = &proxies[0];
    assert_eq!(proxy["id"], proxy_id.as_str());
    assert_eq!(proxy["status"]["healthy"], true);
    assert_eq!(proxy["status"]["connsNum"], 1);
    assert_eq!(proxy["config"]["st2110"]["dataplaneIpAddr"], "192.168.96.10");

    // Bare listing keeps the response light.
    let body: Value = client
        .get(format!("http://{addr}/media-proxy"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["mediaProxy"][0].get("status").is_none());

    // Connections and groups wrap under their own resource names.
    let body: Value = client
        .get(format!("http://{addr}/connection?config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["connection"].as_array().unwrap().len(), 1);

    let body: Value = client
        .get(format!("http://{addr}/multipoint-group"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["multipointGroup"][0]["id"], "abc");
}

#[tokio::test]
async fn missing_resources_map_to_404() {
    let agent = start_agent();
    let addr = serve_rest(&agent).await;
    let client = reqwest::Client::new();

    for path in ["media-proxy/nope", "connection/nope", "multipoint-group/nope", "bridge/nope"] {
        let status = client
            .get(format!("http://{addr}/{path}"))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::NOT_FOUND, "{path}");
    }

    let status = client
        .delete(format!("http://{addr}/media-proxy/nope"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn debug_create_and_delete_round_trip() {
    let agent = start_agent();
    let addr = serve_rest(&agent).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .put(format!("http://{addr}/media-proxy"))
        .json(&serde_json::json!({
            "sdkApiPort": 2345,
            "st2110": { "dataplaneIpAddr": "192.168.96.10", "devPort": "0000:32:01.0" },
            "rdma": { "dataplaneIpAddr": "192.168.97.10", "dataplanePorts": "9100-9199" }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = body["id"].as_str().unwrap().to_string();

    let status = client
        .delete(format!("http://{addr}/media-proxy/{id}"))
        .send()
        .await
        .unwrap()
        .status();
    assert!(status.is_success());
    assert!(agent.cx.proxies.list(None, false, false).await.unwrap().is_empty());
}
