//! # Proxy-facing service.
//!
//! The calls a media proxy makes against the agent: registration of the
//! proxy itself and of its connections, the server-initiated command
//! stream, the unary reply path and metric ingestion. The methods are
//! transport-agnostic — the RPC binding that frames them on the wire
//! lives outside this crate. Each call converts its request into a
//! synchronous event post and shapes the returned chain context into a
//! reply.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::api::wire;
use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{EventParams, EventType};
use crate::model::sdk::SdkConnectionConfig;
use crate::model::ConnKind;
use crate::telemetry::Metric;

/// Transport half of the command stream: whatever carries
/// [`wire::CommandRequest`] frames down to the proxy.
#[async_trait]
pub trait CommandSink: Send {
    async fn send(&mut self, request: &wire::CommandRequest) -> Result<(), AgentError>;
}

/// The agent-side implementation of the proxy service.
#[derive(Clone)]
pub struct ProxyService {
    cx: Arc<AgentContext>,
}

impl ProxyService {
    pub fn new(cx: Arc<AgentContext>) -> Self {
        Self { cx }
    }

    pub async fn register_media_proxy(
        &self,
        request: wire::RegisterMediaProxyRequest,
    ) -> Result<wire::RegisterMediaProxyReply, AgentError> {
        let params = EventParams {
            sdk_api_port: Some(request.sdk_api_port),
            st2110: request.st2110_config.map(|cfg| crate::model::St2110ProxyConfig {
                dev_port_bdf: cfg.dev_port_bdf,
                dataplane_ip_addr: cfg.dataplane_ip_addr,
            }),
            rdma: request.rdma_config.map(|cfg| crate::model::RdmaProxyConfig {
                dataplane_ip_addr: cfg.dataplane_ip_addr,
                dataplane_local_ports: cfg.dataplane_local_ports,
            }),
            ..EventParams::default()
        };

        let ctx = self.cx.bus.post_sync(EventType::OnRegisterProxy, params).await?;
        let proxy_id = ctx.proxy_id.ok_or_else(|| {
            AgentError::Other("proxy register request: registry reported no proxy id".into())
        })?;

        let _ = self
            .cx
            .bus
            .post_async(
                EventType::OnRegisterProxyOk,
                EventParams {
                    proxy_id: Some(proxy_id.clone()),
                    ..EventParams::default()
                },
            )
            .await;

        Ok(wire::RegisterMediaProxyReply { proxy_id })
    }

    pub async fn unregister_media_proxy(
        &self,
        request: wire::UnregisterMediaProxyRequest,
    ) -> Result<(), AgentError> {
        let result = self
            .cx
            .bus
            .post_sync(
                EventType::OnUnregisterProxy,
                EventParams {
                    proxy_id: Some(request.proxy_id),
                    ..EventParams::default()
                },
            )
            .await;
        if let Err(err) = &result {
            error!(err = %err, "proxy unregister req err");
        }

        let _ = self
            .cx
            .bus
            .post_async(EventType::OnUnregisterProxyOk, EventParams::default())
            .await;
        Ok(())
    }

    /// Registers a connection. A non-empty `conn_id` is a reconnect: if
    /// the connection is still known the same id is echoed back, otherwise
    /// the error tells the proxy to drop its local state. A fresh
    /// registration surfaces a group-compatibility rejection verbatim.
    pub async fn register_connection(
        &self,
        request: wire::RegisterConnectionRequest,
    ) -> Result<wire::RegisterConnectionReply, AgentError> {
        if !request.conn_id.is_empty() {
            self.cx.conns.get(&request.conn_id, false).await?;
            return Ok(wire::RegisterConnectionReply { conn_id: request.conn_id });
        }

        let wire_cfg = request
            .config
            .as_ref()
            .ok_or_else(|| AgentError::InvalidConfig("nil register conn config".into()))?;
        let config = SdkConnectionConfig::from_wire(wire_cfg)?;
        let kind = ConnKind::from_str(&request.kind)?;
        let group_urn = config.multipoint_group_urn()?;
        let conn_type = config.conn_type();

        let params = EventParams {
            proxy_id: Some(request.proxy_id.clone()),
            kind: Some(kind),
            conn_type: Some(conn_type),
            conn_config: Some(Arc::new(config)),
            // Here the group URN becomes the group id.
            group_id: Some(group_urn),
            ..EventParams::default()
        };

        let ctx = self.cx.bus.post_sync(EventType::OnRegisterConnection, params).await?;

        if let Some(err) = ctx.incompatible {
            return Err(err);
        }
        let conn_id = ctx.conn_id.ok_or_else(|| {
            AgentError::Other("conn register request: registry reported no conn id".into())
        })?;

        let _ = self
            .cx
            .bus
            .post_async(
                EventType::OnRegisterConnectionOk,
                EventParams {
                    proxy_id: Some(request.proxy_id),
                    ..EventParams::default()
                },
            )
            .await;

        Ok(wire::RegisterConnectionReply { conn_id })
    }

    pub async fn unregister_connection(
        &self,
        request: wire::UnregisterConnectionRequest,
    ) -> Result<(), AgentError> {
        let conn = self.cx.conns.get(&request.conn_id, false).await?;

        let result = self
            .cx
            .bus
            .post_sync(
                EventType::OnUnregisterConnection,
                EventParams {
                    conn_id: Some(request.conn_id),
                    proxy_id: Some(request.proxy_id),
                    group_id: Some(conn.group_id),
                    ..EventParams::default()
                },
            )
            .await;
        if let Err(err) = &result {
            error!(err = %err, "conn unregister req err");
        }

        let _ = self
            .cx
            .bus
            .post_async(EventType::OnUnregisterConnectionOk, EventParams::default())
            .await;
        Ok(())
    }

    /// Runs the command stream for one proxy until the stream or the
    /// proxy is torn down. Marks the proxy active, announces it, then
    /// pumps queued requests into `sink`, parking each in the router
    /// before it goes out.
    pub async fn start_command_queue(
        &self,
        proxy_id: &str,
        stream_cancel: CancellationToken,
        sink: &mut dyn CommandSink,
    ) -> Result<(), AgentError> {
        let proxy = self.cx.proxies.get(proxy_id, false).await?;

        proxy.channel().latch().set(true).await;
        self.cx.proxies.update_set_active(proxy_id, true).await?;
        let _ = self
            .cx
            .bus
            .post_async(
                EventType::OnActivateProxy,
                EventParams {
                    proxy_id: Some(proxy_id.to_string()),
                    ..EventParams::default()
                },
            )
            .await;
        info!(proxy_id, "command stream attached");

        let result = loop {
            let req = match proxy.next_command_request(&stream_cancel).await {
                Ok(req) => req,
                Err(err) => break Err(err),
            };

            let req_id = req.request.req_id.clone();
            self.cx.router.register(&req_id, &req.proxy_id, req.reply);

            if let Err(err) = sink.send(&req.request).await {
                error!(proxy_id, %req_id, err = %err, "error sending command");
                self.cx.router.fail(&req_id, err.clone());
                break Err(err);
            }
        };

        // Stream gone: flip the latch back, deactivate, announce.
        proxy.channel().latch().set(false).await;
        let _ = self.cx.proxies.update_set_active(proxy_id, false).await;
        let _ = self
            .cx
            .bus
            .post_async(
                EventType::OnProxyDisconnected,
                EventParams {
                    proxy_id: Some(proxy_id.to_string()),
                    ..EventParams::default()
                },
            )
            .await;
        info!(proxy_id, "command stream detached");

        result
    }

    /// Delivers a proxy's reply to whoever is waiting on the request id.
    pub async fn send_command_reply(&self, reply: wire::CommandReply) -> Result<(), AgentError> {
        let payload = reply.reply.ok_or(AgentError::ReplyNotFound)?;
        self.cx.router.complete(&reply.req_id, &reply.proxy_id, payload)
    }

    /// Drops a pending request on behalf of its initiator.
    pub fn cancel_command_request(&self, req_id: &str) {
        self.cx.router.cancel(req_id);
    }

    /// Upserts the latest metric sample per provider id.
    pub async fn send_metrics(&self, request: wire::SendMetricsRequest) -> Result<(), AgentError> {
        self.cx.proxies.get(&request.proxy_id, false).await?;

        for sample in request.metrics {
            let mut metric = Metric::new(sample.timestamp_ms);
            for field in sample.fields {
                let value = match field.value {
                    wire::MetricValue::StrValue(v) => serde_json::Value::from(v),
                    wire::MetricValue::UintValue(v) => serde_json::Value::from(v),
                    wire::MetricValue::DoubleValue(v) => serde_json::Value::from(v),
                    wire::MetricValue::BoolValue(v) => serde_json::Value::from(v),
                };
                metric.fields.insert(field.name, value);
            }
            self.cx.telemetry.add_metric(&sample.provider_id, metric);
        }
        Ok(())
    }
}
