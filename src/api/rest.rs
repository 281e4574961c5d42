//! # REST management surface.
//!
//! JSON read/inspect endpoints over the four resource registries, plus
//! debug create/delete per resource and a debug command pass-through.
//! Listings accept `?status&config` to opt into the heavier projections;
//! response bodies wrap their arrays under the resource name.
//!
//! Missing ids map to 404, every other failure to 400.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::mesh::apply_proxy_config;
use crate::model::{
    Bridge, Connection, MediaProxy, MediaProxyConfig, MediaProxyStatus, MultipointGroup,
    PortMask, ProxyChannel,
};

struct ApiError(AgentError);

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match self.0 {
            AgentError::ResourceNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        (code, self.0.to_string()).into_response()
    }
}

type Cx = State<Arc<AgentContext>>;
type Flags = Query<HashMap<String, String>>;

fn projections(query: &HashMap<String, String>) -> (bool, bool) {
    (query.contains_key("status"), query.contains_key("config"))
}

/// Builds the REST router over the shared agent context.
pub fn router(cx: Arc<AgentContext>) -> Router {
    Router::new()
        .route("/media-proxy", get(list_media_proxies).put(add_media_proxy))
        .route(
            "/media-proxy/:id",
            get(get_media_proxy).delete(delete_media_proxy),
        )
        .route("/media-proxy/:id/command/:cmd", get(media_proxy_command))
        .route("/connection", get(list_connections).put(add_connection))
        .route("/connection/:id", get(get_connection).delete(delete_connection))
        .route(
            "/multipoint-group",
            get(list_multipoint_groups).put(add_multipoint_group),
        )
        .route(
            "/multipoint-group/:id",
            get(get_multipoint_group).delete(delete_multipoint_group),
        )
        .route("/bridge", get(list_bridges).put(add_bridge))
        .route("/bridge/:id", get(get_bridge).delete(delete_bridge))
        .with_state(cx)
}

/// Serves the router until cancellation.
pub async fn run_rest_server(cx: Arc<AgentContext>, cancel: CancellationToken) {
    let port = cx.cfg.rest_port;
    let app = router(cx);
    let listener = match tokio::net::TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(port, err = %err, "rest api listen err");
            return;
        }
    };
    info!(port, "server starts listening - management api (rest)");

    let shutdown = async move { cancel.cancelled().await };
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(err = %err, "rest api server err");
    }
}

fn populate_conn_metrics(cx: &AgentContext, conns: &mut [Connection]) {
    for conn in conns {
        if let Some(status) = conn.status.as_mut() {
            cx.telemetry.populate_conn_status(status, &conn.id);
        }
    }
}

// ---- media proxy ----

async fn list_media_proxies(State(cx): Cx, Query(query): Flags) -> Result<Json<Value>, ApiError> {
    let (add_status, add_config) = projections(&query);
    let mut proxies = cx.proxies.list(None, add_status, add_config).await?;

    for proxy in &mut proxies {
        if !proxy.conn_ids.is_empty() {
            if let Ok(mut conns) = cx.conns.list(Some(proxy.conn_ids.clone()), true, true).await {
                populate_conn_metrics(&cx, &mut conns);
                proxy.conns = conns;
            }
        }
        if !proxy.bridge_ids.is_empty() {
            if let Ok(bridges) = cx.bridges.list(Some(proxy.bridge_ids.clone()), true, true).await {
                proxy.bridges = bridges;
            }
        }
    }

    Ok(Json(json!({ "mediaProxy": proxies })))
}

async fn get_media_proxy(State(cx): Cx, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let proxy = cx.proxies.get(&id, true).await?;
    Ok(Json(json!({ "mediaProxy": proxy })))
}

async fn add_media_proxy(State(cx): Cx, Json(config): Json<MediaProxyConfig>) -> Result<Json<Value>, ApiError> {
    let rdma_ports_allowed = PortMask::parse(&config.rdma.dataplane_local_ports)?;
    let channel = ProxyChannel::new(
        cx.router.clone(),
        cx.cfg.command_queue_capacity,
        cx.root.child_token(),
    );
    let proxy = MediaProxy::new(config, MediaProxyStatus::healthy_now(), rdma_ports_allowed, channel);
    let id = cx.proxies.add(proxy).await?;
    Ok(Json(json!({ "id": id })))
}

async fn delete_media_proxy(State(cx): Cx, Path(id): Path<String>) -> Result<(), ApiError> {
    cx.proxies.delete(&id).await?;
    Ok(())
}

async fn media_proxy_command(
    State(cx): Cx,
    Path((id, cmd)): Path<(String, String)>,
) -> Result<String, ApiError> {
    if cmd == "apply-config" {
        apply_proxy_config(&cx, &id).await?;
        return Ok(String::new());
    }

    let proxy = cx.proxies.get(&id, false).await?;
    let out = proxy.exec_debug_command(&cmd, cx.cfg.command_timeout).await?;
    Ok(out)
}

// ---- connection ----

async fn list_connections(State(cx): Cx, Query(query): Flags) -> Result<Json<Value>, ApiError> {
    let (add_status, add_config) = projections(&query);
    let mut conns = cx.conns.list(None, add_status, add_config).await?;
    populate_conn_metrics(&cx, &mut conns);
    Ok(Json(json!({ "connection": conns })))
}

async fn get_connection(State(cx): Cx, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let mut conn = cx.conns.get(&id, true).await?;
    if let Some(status) = conn.status.as_mut() {
        cx.telemetry.populate_conn_status(status, &conn.id);
    }
    Ok(Json(json!({ "connection": conn })))
}

async fn add_connection(State(cx): Cx, Json(conn): Json<Connection>) -> Result<Json<Value>, ApiError> {
    let proxy_id = conn.proxy_id.clone();
    let id = cx.conns.add(conn).await?;
    if !proxy_id.is_empty() {
        cx.proxies.update_link_conn(&proxy_id, &id).await?;
    }
    Ok(Json(json!({ "id": id })))
}

async fn delete_connection(State(cx): Cx, Path(id): Path<String>) -> Result<(), ApiError> {
    let conn = cx.conns.get(&id, false).await?;
    cx.conns.delete(&id).await?;
    if !conn.proxy_id.is_empty() {
        let _ = cx.proxies.update_unlink_conn(&conn.proxy_id, &id).await;
    }
    Ok(())
}

// ---- multipoint group ----

async fn list_multipoint_groups(State(cx): Cx, Query(query): Flags) -> Result<Json<Value>, ApiError> {
    let (add_status, add_config) = projections(&query);
    let groups = cx.groups.list(None, add_status, add_config).await?;
    Ok(Json(json!({ "multipointGroup": groups })))
}

async fn get_multipoint_group(State(cx): Cx, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let group = cx.groups.get(&id, true).await?;
    Ok(Json(json!({ "multipointGroup": group })))
}

async fn add_multipoint_group(State(cx): Cx, Json(group): Json<MultipointGroup>) -> Result<Json<Value>, ApiError> {
    let id = cx.groups.add(group).await?;
    Ok(Json(json!({ "id": id })))
}

async fn delete_multipoint_group(State(cx): Cx, Path(id): Path<String>) -> Result<(), ApiError> {
    cx.groups.delete(&id).await?;
    Ok(())
}

// ---- bridge ----

async fn list_bridges(State(cx): Cx, Query(query): Flags) -> Result<Json<Value>, ApiError> {
    let (add_status, add_config) = projections(&query);
    let bridges = cx.bridges.list(None, add_status, add_config).await?;
    Ok(Json(json!({ "bridge": bridges })))
}

async fn get_bridge(State(cx): Cx, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let bridge = cx.bridges.get(&id, true).await?;
    Ok(Json(json!({ "bridge": bridge })))
}

async fn add_bridge(State(cx): Cx, Json(bridge): Json<Bridge>) -> Result<Json<Value>, ApiError> {
    let proxy_id = bridge.proxy_id.clone();
    let id = cx.bridges.add(bridge).await?;
    if !proxy_id.is_empty() {
        cx.proxies.update_link_bridge(&proxy_id, &id).await?;
    }
    Ok(Json(json!({ "id": id })))
}

async fn delete_bridge(State(cx): Cx, Path(id): Path<String>) -> Result<(), ApiError> {
    let bridge = cx.bridges.get(&id, false).await?;
    cx.bridges.delete(&id).await?;
    if !bridge.proxy_id.is_empty() {
        let _ = cx.proxies.update_unlink_bridge(&bridge.proxy_id, &id).await;
    }
    Ok(())
}
