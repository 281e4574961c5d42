//! Typed registry of media proxies.

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::model::MediaProxy;
use crate::registry::kernel::{EntityHandler, ReadFlags, RegistryKernel};

struct MediaProxyHandler;

impl EntityHandler for MediaProxyHandler {
    type Item = MediaProxy;

    fn project(&self, id: &str, item: &MediaProxy, flags: ReadFlags) -> MediaProxy {
        let mut out = item.clone();
        out.id = id.to_string();
        if !flags.status {
            out.status = None;
        }
        if !flags.config {
            out.config = None;
        }
        out
    }

    fn on_delete(&self, item: &MediaProxy) {
        // Releases the stream loop and every pending sync command.
        item.channel().shutdown();
    }
}

/// Single-writer store of [`MediaProxy`] entities.
#[derive(Clone)]
pub struct MediaProxyRegistry {
    kernel: RegistryKernel<MediaProxy>,
}

impl MediaProxyRegistry {
    pub fn spawn(queue_capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            kernel: RegistryKernel::spawn(MediaProxyHandler, queue_capacity, cancel),
        }
    }

    pub async fn list(
        &self,
        filter_ids: Option<Vec<String>>,
        add_status: bool,
        add_config: bool,
    ) -> Result<Vec<MediaProxy>, AgentError> {
        self.kernel
            .read_many(filter_ids, ReadFlags { status: add_status, config: add_config })
            .await
    }

    /// Reads one proxy; status is always attached, config on request.
    pub async fn get(&self, id: &str, add_config: bool) -> Result<MediaProxy, AgentError> {
        self.kernel
            .read_one(id, ReadFlags { status: true, config: add_config })
            .await
    }

    pub async fn add(&self, proxy: MediaProxy) -> Result<String, AgentError> {
        self.kernel.add_one(None, proxy).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AgentError> {
        self.kernel.delete_one(id).await
    }

    /// Links a connection id; idempotent. Keeps `status.conns_num` equal to
    /// the list length.
    pub async fn update_link_conn(&self, id: &str, conn_id: &str) -> Result<(), AgentError> {
        let conn_id = conn_id.to_string();
        self.kernel
            .update_one(id, move |proxy| {
                if !proxy.conn_ids.iter().any(|v| v == &conn_id) {
                    proxy.conn_ids.push(conn_id);
                }
                if let Some(status) = proxy.status.as_mut() {
                    status.conns_num = proxy.conn_ids.len();
                }
                Ok(())
            })
            .await
    }

    /// Unlinks a connection id; fails when it is absent.
    pub async fn update_unlink_conn(&self, id: &str, conn_id: &str) -> Result<(), AgentError> {
        let conn_id = conn_id.to_string();
        self.kernel
            .update_one(id, move |proxy| {
                let before = proxy.conn_ids.len();
                proxy.conn_ids.retain(|v| v != &conn_id);
                if proxy.conn_ids.len() == before {
                    return Err(AgentError::ResourceNotFound);
                }
                if let Some(status) = proxy.status.as_mut() {
                    status.conns_num = proxy.conn_ids.len();
                }
                Ok(())
            })
            .await
    }

    /// Links a bridge id; idempotent. Keeps `status.bridges_num` current.
    pub async fn update_link_bridge(&self, id: &str, bridge_id: &str) -> Result<(), AgentError> {
        let bridge_id = bridge_id.to_string();
        self.kernel
            .update_one(id, move |proxy| {
                if !proxy.bridge_ids.iter().any(|v| v == &bridge_id) {
                    proxy.bridge_ids.push(bridge_id);
                }
                if let Some(status) = proxy.status.as_mut() {
                    status.bridges_num = proxy.bridge_ids.len();
                }
                Ok(())
            })
            .await
    }

    /// Unlinks a bridge id; fails when it is absent.
    pub async fn update_unlink_bridge(&self, id: &str, bridge_id: &str) -> Result<(), AgentError> {
        let bridge_id = bridge_id.to_string();
        self.kernel
            .update_one(id, move |proxy| {
                let before = proxy.bridge_ids.len();
                proxy.bridge_ids.retain(|v| v != &bridge_id);
                if proxy.bridge_ids.len() == before {
                    return Err(AgentError::ResourceNotFound);
                }
                if let Some(status) = proxy.status.as_mut() {
                    status.bridges_num = proxy.bridge_ids.len();
                }
                Ok(())
            })
            .await
    }

    /// Records whether the proxy's command stream is attached.
    pub async fn update_set_active(&self, id: &str, active: bool) -> Result<(), AgentError> {
        self.kernel
            .update_one(id, move |proxy| {
                proxy.active = active;
                Ok(())
            })
            .await
    }
}
