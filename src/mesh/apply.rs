//! # Apply-config worker.
//!
//! Actions never push configuration to proxies directly; they enqueue the
//! proxy id here. A single worker drains the queue, coalesces duplicate
//! ids that piled up while it was busy, rebuilds the per-proxy view from
//! fresh registry reads and sends one `ApplyConfig` command per proxy.
//! A detached stream is not an error: the next enqueue after the stream
//! reattaches will deliver the current state.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::api::wire;
use crate::context::AgentContext;
use crate::error::AgentError;
use crate::model::{MediaProxy, MultipointGroup};
use crate::util::intersection;

/// Submission handle for the worker. Cheap to clone.
#[derive(Clone)]
pub struct ApplyConfigQueue {
    tx: mpsc::Sender<String>,
}

impl ApplyConfigQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Non-blocking enqueue; safe to call from synchronous event handlers.
    pub fn enqueue(&self, proxy_id: &str) -> Result<(), AgentError> {
        self.tx.try_send(proxy_id.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AgentError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => AgentError::Cancelled,
        })
    }
}

/// Runs the worker until cancellation. Spawned once by the agent.
pub async fn run_apply_worker(
    cx: std::sync::Arc<AgentContext>,
    mut rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = cancel.cancelled() => return,
            id = rx.recv() => match id {
                Some(id) => id,
                None => return,
            },
        };

        // Coalesce whatever queued up behind the first id; one push per
        // proxy is enough to convey the current state.
        let mut batch = vec![first];
        while let Ok(id) = rx.try_recv() {
            if !batch.contains(&id) {
                batch.push(id);
            }
        }

        for proxy_id in batch {
            if let Err(err) = apply_proxy_config(&cx, &proxy_id).await {
                error!(%proxy_id, err = %err, "apply config failed");
            }
        }
    }
}

/// Reads the proxy and all groups fresh, builds the per-proxy view and
/// sends it down the proxy's command channel. A not-ready stream is
/// swallowed.
pub async fn apply_proxy_config(cx: &AgentContext, proxy_id: &str) -> Result<(), AgentError> {
    let proxy = cx.proxies.get(proxy_id, false).await?;
    let groups = cx.groups.list(None, false, false).await?;

    let request = build_proxy_view(cx, &proxy, &groups).await;
    match proxy
        .send_apply_config_command(request, cx.cfg.command_timeout)
        .await
    {
        Err(AgentError::ProxyNotReady) => Ok(()),
        other => other,
    }
}

/// Synthesizes the configuration a single proxy should hold: its slice of
/// every group it participates in, plus its own bridges.
pub async fn build_proxy_view(
    cx: &AgentContext,
    proxy: &MediaProxy,
    groups: &[MultipointGroup],
) -> wire::ApplyConfigRequest {
    let mut view_groups = Vec::new();
    for group in groups {
        let conn_ids = intersection(&group.conn_ids, &proxy.conn_ids);
        if conn_ids.is_empty() {
            continue;
        }
        view_groups.push(wire::MultipointGroupView {
            // Composite value: group id + proxy id.
            group_id: format!("{}/{}", group.id, proxy.id),
            conn_ids,
            bridge_ids: intersection(&group.bridge_ids, &proxy.bridge_ids),
        });
    }

    let mut view_bridges = Vec::with_capacity(proxy.bridge_ids.len());
    for bridge_id in &proxy.bridge_ids {
        let bridge = match cx.bridges.get(bridge_id, true).await {
            Ok(bridge) => bridge,
            Err(err) => {
                warn!(%bridge_id, err = %err, "apply config bridge read failed");
                continue;
            }
        };
        if let Err(err) = bridge.validate_config() {
            error!(%bridge_id, err = %err, "apply config bridge validate failed");
            continue;
        }
        let Some(cfg) = bridge.config.as_ref() else {
            continue;
        };

        let target = match &cfg.target {
            crate::model::BridgeTargetConfig::St2110(st) => {
                wire::BridgeTarget::St2110(wire::BridgeSt2110 {
                    remote_ip: st.remote_ip.clone(),
                    port: u32::from(st.port),
                    transport: st.transport,
                })
            }
            crate::model::BridgeTargetConfig::Rdma(rdma) => {
                wire::BridgeTarget::Rdma(wire::BridgeRdma {
                    remote_ip: rdma.remote_ip.clone(),
                    port: u32::from(rdma.port),
                })
            }
        };

        view_bridges.push(wire::BridgeView {
            bridge_id: bridge.id.clone(),
            r#type: cfg.bridge_type().to_string(),
            kind: cfg.kind.to_string(),
            conn_config: cfg.sdk.as_ref().map(|sdk| sdk.to_wire()),
            config: Some(target),
        });
    }

    wire::ApplyConfigRequest {
        groups: view_groups,
        bridges: view_bridges,
    }
}
