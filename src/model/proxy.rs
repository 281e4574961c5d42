//! # Media proxy entity and its command channel.
//!
//! Each registered proxy carries a bounded queue of outbound command
//! requests and a readiness latch tracking whether its command stream is
//! attached. Requests are correlated with replies by request id through the
//! process-wide [`CommandRouter`]: the stream loop registers a request
//! before sending it, and the unary reply call pops it.
//!
//! ## Command round trip
//! ```text
//! send_command_sync()
//!   ├─► bail fast if latch says not-ready
//!   ├─► queue ──► stream loop ──► router.register() ──► stream send
//!   └─► wait (10 s) ◄── router.complete(req_id) ◄── proxy reply
//!
//! any error on the wait path ──► router.cancel(req_id)
//! ```
//!
//! A proxy teardown cancels the per-proxy token, which releases every
//! pending sync wait with a terminal error so no reply channel leaks.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::api::wire;
use crate::error::AgentError;
use crate::model::port_mask::PortMask;
use crate::model::time_millis;
use crate::model::{Bridge, Connection};
use crate::readiness::ReadinessLatch;

use chrono::{DateTime, Utc};

/// Outcome of one command, delivered over the request's private channel.
pub type CommandResult = Result<wire::Reply, AgentError>;

/// A single outbound command travelling from a caller to the stream loop.
pub struct CommandRequest {
    pub proxy_id: String,
    pub request: wire::CommandRequest,
    pub reply: oneshot::Sender<CommandResult>,
}

struct PendingReply {
    proxy_id: String,
    reply: oneshot::Sender<CommandResult>,
}

/// Process-wide request/reply correlation map, keyed by request id.
#[derive(Default)]
pub struct CommandRouter {
    pending: DashMap<String, PendingReply>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Parks a request that has been handed to the stream.
    pub fn register(&self, req_id: &str, proxy_id: &str, reply: oneshot::Sender<CommandResult>) {
        self.pending.insert(
            req_id.to_string(),
            PendingReply {
                proxy_id: proxy_id.to_string(),
                reply,
            },
        );
    }

    /// Delivers a proxy's reply to the waiting caller. Rejects unknown
    /// request ids and replies claiming the wrong proxy.
    pub fn complete(&self, req_id: &str, proxy_id: &str, reply: wire::Reply) -> Result<(), AgentError> {
        let (_, pending) = self
            .pending
            .remove(req_id)
            .ok_or(AgentError::ReplyNotFound)?;
        if pending.proxy_id != proxy_id {
            return Err(AgentError::ReplyProxyMismatch {
                got: proxy_id.to_string(),
                want: pending.proxy_id,
            });
        }
        let _ = pending.reply.send(Ok(reply));
        Ok(())
    }

    /// Fails a parked request with the given error (stream send failure).
    pub fn fail(&self, req_id: &str, err: AgentError) {
        if let Some((_, pending)) = self.pending.remove(req_id) {
            let _ = pending.reply.send(Err(err));
        }
    }

    /// Drops a parked request on behalf of the side that issued it, used
    /// when the outer sync call's own deadline fired.
    pub fn cancel(&self, req_id: &str) {
        if let Some((_, pending)) = self.pending.remove(req_id) {
            let _ = pending.reply.send(Err(AgentError::CancelledByInitiator));
        }
    }
}

/// Per-proxy command plumbing: bounded request queue, readiness latch and
/// the proxy-scoped cancellation token.
pub struct ProxyChannel {
    tx: mpsc::Sender<CommandRequest>,
    rx: Mutex<mpsc::Receiver<CommandRequest>>,
    cancel: CancellationToken,
    ready: ReadinessLatch,
    router: Arc<CommandRouter>,
}

impl ProxyChannel {
    pub fn new(router: Arc<CommandRouter>, capacity: usize, cancel: CancellationToken) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        let ready = ReadinessLatch::spawn(cancel.clone());
        Arc::new(Self {
            tx,
            rx: Mutex::new(rx),
            cancel,
            ready,
            router,
        })
    }

    pub fn latch(&self) -> &ReadinessLatch {
        &self.ready
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Tears the proxy down: cancels the per-proxy token, releasing the
    /// stream loop and every pending sync wait.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct St2110ProxyConfig {
    pub dataplane_ip_addr: String,
    #[serde(rename = "devPort")]
    pub dev_port_bdf: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdmaProxyConfig {
    pub dataplane_ip_addr: String,
    #[serde(rename = "dataplanePorts")]
    pub dataplane_local_ports: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProxyConfig {
    #[serde(rename = "sdkApiPort")]
    pub sdk_api_port: u32,
    pub st2110: St2110ProxyConfig,
    pub rdma: RdmaProxyConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProxyStatus {
    pub healthy: bool,
    #[serde(with = "time_millis")]
    pub registered_at: DateTime<Utc>,
    pub conns_num: usize,
    pub bridges_num: usize,
}

impl MediaProxyStatus {
    pub fn healthy_now() -> Self {
        Self {
            healthy: true,
            registered_at: Utc::now(),
            conns_num: 0,
            bridges_num: 0,
        }
    }
}

/// A registered data-plane process.
///
/// `conn_ids` / `bridge_ids` are hidden from JSON; listings embed the
/// resolved `conns` / `bridges` arrays instead.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaProxy {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<MediaProxyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<MediaProxyStatus>,
    #[serde(skip)]
    pub conn_ids: Vec<String>,
    #[serde(skip)]
    pub bridge_ids: Vec<String>,
    /// Populated only for JSON listings.
    pub conns: Vec<Connection>,
    /// Populated only for JSON listings.
    pub bridges: Vec<Bridge>,
    #[serde(skip)]
    pub rdma_ports_allowed: PortMask,
    #[serde(skip)]
    pub active: bool,
    #[serde(skip)]
    channel: Arc<ProxyChannel>,
}

impl std::fmt::Debug for MediaProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaProxy")
            .field("id", &self.id)
            .field("active", &self.active)
            .field("conn_ids", &self.conn_ids)
            .field("bridge_ids", &self.bridge_ids)
            .finish()
    }
}

impl MediaProxy {
    pub fn new(
        config: MediaProxyConfig,
        status: MediaProxyStatus,
        rdma_ports_allowed: PortMask,
        channel: Arc<ProxyChannel>,
    ) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            config: Some(config),
            status: Some(status),
            conn_ids: Vec::new(),
            bridge_ids: Vec::new(),
            conns: Vec::new(),
            bridges: Vec::new(),
            rdma_ports_allowed,
            active: false,
            channel,
        }
    }

    pub fn channel(&self) -> &Arc<ProxyChannel> {
        &self.channel
    }

    fn new_command_request(&self, command: wire::Command) -> (CommandRequest, oneshot::Receiver<CommandResult>) {
        let (tx, rx) = oneshot::channel();
        let req = CommandRequest {
            proxy_id: self.id.clone(),
            request: wire::CommandRequest {
                req_id: Uuid::new_v4().to_string(),
                command: Some(command),
            },
            reply: tx,
        };
        (req, rx)
    }

    /// Pulls the next outbound request, honoring both the stream's token
    /// and the proxy's own teardown token.
    pub async fn next_command_request(
        &self,
        stream_cancel: &CancellationToken,
    ) -> Result<CommandRequest, AgentError> {
        let mut rx = self.channel.rx.lock().await;
        tokio::select! {
            _ = stream_cancel.cancelled() => Err(AgentError::Cancelled),
            _ = self.channel.cancel.cancelled() => Err(AgentError::Cancelled),
            req = rx.recv() => req.ok_or(AgentError::Cancelled),
        }
    }

    /// Enqueues a request and waits for the correlated reply under the
    /// command deadline. Fails immediately with [`AgentError::ProxyNotReady`]
    /// while the stream is detached. Every error path cancels the parked
    /// request so its reply channel cannot leak.
    async fn send_command_sync(
        &self,
        req: CommandRequest,
        reply_rx: oneshot::Receiver<CommandResult>,
        timeout: std::time::Duration,
    ) -> CommandResult {
        let req_id = req.request.req_id.clone();
        let router = Arc::clone(&self.channel.router);

        let result = self.send_and_wait(req, reply_rx, timeout).await;
        if result.is_err() {
            router.cancel(&req_id);
        }
        result
    }

    async fn send_and_wait(
        &self,
        req: CommandRequest,
        mut reply_rx: oneshot::Receiver<CommandResult>,
        timeout: std::time::Duration,
    ) -> CommandResult {
        // Biased: a detached stream must win over a ready queue slot so the
        // caller fails fast instead of parking a request nobody will pull.
        tokio::select! {
            biased;
            _ = self.channel.ready.not_ready() => return Err(AgentError::ProxyNotReady),
            _ = self.channel.cancel.cancelled() => return Err(AgentError::Cancelled),
            sent = self.channel.tx.send(req) => {
                if sent.is_err() {
                    return Err(AgentError::Cancelled);
                }
            }
        }

        let wait = async {
            tokio::select! {
                biased;
                _ = self.channel.cancel.cancelled() => Err(AgentError::Cancelled),
                reply = &mut reply_rx => reply.unwrap_or(Err(AgentError::Cancelled)),
                _ = self.channel.ready.not_ready() => Err(AgentError::ProxyNotReady),
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout(timeout)),
        }
    }

    /// Round-trips a debug command, returning the proxy's text output.
    pub async fn exec_debug_command(
        &self,
        text: &str,
        timeout: std::time::Duration,
    ) -> Result<String, AgentError> {
        let (req, rx) = self.new_command_request(wire::Command::Debug(wire::DebugRequest {
            in_text: text.to_string(),
        }));
        debug!(proxy_id = %self.id, text, "send debug command");
        match self.send_command_sync(req, rx, timeout).await? {
            wire::Reply::Debug(reply) => Ok(reply.out_text),
            _ => Err(AgentError::TypeCastFailed),
        }
    }

    /// Pushes a full configuration to the proxy and waits for the ack.
    pub async fn send_apply_config_command(
        &self,
        config: wire::ApplyConfigRequest,
        timeout: std::time::Duration,
    ) -> Result<(), AgentError> {
        if self.channel.cancel.is_cancelled() {
            return Ok(());
        }

        let (req, rx) = self.new_command_request(wire::Command::ApplyConfig(config));
        match self.send_command_sync(req, rx, timeout).await? {
            wire::Reply::ApplyConfig(_) => Ok(()),
            _ => Err(AgentError::TypeCastFailed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::PortMask;

    fn test_proxy(router: Arc<CommandRouter>) -> MediaProxy {
        let cancel = CancellationToken::new();
        let channel = ProxyChannel::new(router, 16, cancel);
        let mut proxy = MediaProxy::new(
            MediaProxyConfig::default(),
            MediaProxyStatus::healthy_now(),
            PortMask::default(),
            channel,
        );
        proxy.id = "proxy-1".into();
        proxy
    }

    #[tokio::test]
    async fn detached_stream_fails_fast_without_enqueuing() {
        let router = Arc::new(CommandRouter::new());
        let proxy = test_proxy(Arc::clone(&router));

        let err = proxy
            .exec_debug_command("ping", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, AgentError::ProxyNotReady);
        assert_eq!(router.pending_len(), 0);
    }

    #[tokio::test]
    async fn reply_is_correlated_by_request_id() {
        let router = Arc::new(CommandRouter::new());
        let proxy = test_proxy(Arc::clone(&router));
        proxy.channel().latch().set(true).await;
        tokio::task::yield_now().await;

        // Emulate the stream loop: register the pulled request, then reply.
        let stream_router = Arc::clone(&router);
        let stream_proxy = proxy.clone();
        let stream_cancel = CancellationToken::new();
        tokio::spawn(async move {
            let req = stream_proxy
                .next_command_request(&stream_cancel)
                .await
                .unwrap();
            let req_id = req.request.req_id.clone();
            stream_router.register(&req_id, &req.proxy_id, req.reply);
            stream_router
                .complete(
                    &req_id,
                    "proxy-1",
                    wire::Reply::Debug(wire::DebugReply { out_text: "pong".into() }),
                )
                .unwrap();
        });

        let out = proxy
            .exec_debug_command("ping", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, "pong");
        assert_eq!(router.pending_len(), 0);
    }

    #[tokio::test]
    async fn reply_with_wrong_proxy_id_is_rejected() {
        let router = Arc::new(CommandRouter::new());
        let (tx, _rx) = oneshot::channel();
        router.register("req-1", "proxy-1", tx);
        let err = router
            .complete("req-1", "proxy-2", wire::Reply::ApplyConfig(wire::ApplyConfigReply {}))
            .unwrap_err();
        assert!(matches!(err, AgentError::ReplyProxyMismatch { .. }));
        assert_eq!(
            router
                .complete("req-404", "proxy-1", wire::Reply::ApplyConfig(wire::ApplyConfigReply {}))
                .unwrap_err(),
            AgentError::ReplyNotFound
        );
    }

    #[tokio::test]
    async fn timeout_cancels_the_parked_request() {
        let router = Arc::new(CommandRouter::new());
        let proxy = test_proxy(Arc::clone(&router));
        proxy.channel().latch().set(true).await;
        tokio::task::yield_now().await;

        // Pull and register the request, but never reply.
        let stream_router = Arc::clone(&router);
        let stream_proxy = proxy.clone();
        let stream_cancel = CancellationToken::new();
        tokio::spawn(async move {
            let req = stream_proxy
                .next_command_request(&stream_cancel)
                .await
                .unwrap();
            stream_router.register(&req.request.req_id.clone(), &req.proxy_id, req.reply);
        });

        let err = proxy
            .exec_debug_command("ping", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Timeout(_)));
        tokio::task::yield_now().await;
        assert_eq!(router.pending_len(), 0, "error path must clear the pending entry");
    }

    #[tokio::test]
    async fn proxy_shutdown_releases_pending_senders() {
        let router = Arc::new(CommandRouter::new());
        let proxy = test_proxy(Arc::clone(&router));
        proxy.channel().latch().set(true).await;
        tokio::task::yield_now().await;

        let waiter = {
            let proxy = proxy.clone();
            tokio::spawn(async move { proxy.exec_debug_command("ping", Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;

        proxy.channel().shutdown();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_cancellation() || err == AgentError::ProxyNotReady, "{err:?}");
    }
}
