//! Typed registry of inter-proxy bridges.

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::model::Bridge;
use crate::registry::kernel::{EntityHandler, ReadFlags, RegistryKernel};

struct BridgeHandler;

impl EntityHandler for BridgeHandler {
    type Item = Bridge;

    fn project(&self, id: &str, item: &Bridge, flags: ReadFlags) -> Bridge {
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
}

/// Single-writer store of [`Bridge`] entities.
#[derive(Clone)]
pub struct BridgeRegistry {
    kernel: RegistryKernel<Bridge>,
}

impl BridgeRegistry {
    pub fn spawn(queue_capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            kernel: RegistryKernel::spawn(BridgeHandler, queue_capacity, cancel),
        }
    }

    pub async fn list(
        &self,
        filter_ids: Option<Vec<String>>,
        add_status: bool,
        add_config: bool,
    ) -> Result<Vec<Bridge>, AgentError> {
        self.kernel
            .read_many(filter_ids, ReadFlags { status: add_status, config: add_config })
            .await
    }

    pub async fn get(&self, id: &str, add_config: bool) -> Result<Bridge, AgentError> {
        self.kernel
            .read_one(id, ReadFlags { status: true, config: add_config })
            .await
    }

    pub async fn add(&self, bridge: Bridge) -> Result<String, AgentError> {
        self.kernel.add_one(None, bridge).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AgentError> {
        self.kernel.delete_one(id).await
    }

    pub async fn update_link_group(&self, id: &str, group_id: &str) -> Result<(), AgentError> {
        let group_id = group_id.to_string();
        self.kernel
            .update_one(id, move |bridge| {
                bridge.group_id = group_id;
                Ok(())
            })
            .await
    }

    pub async fn update_unlink_group(&self, id: &str) -> Result<(), AgentError> {
        self.update_link_group(id, "").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BridgeConfig, BridgeRdmaConfig, BridgeTargetConfig, ConnKind, ConnectionStatus};

    fn test_bridge(proxy_id: &str) -> Bridge {
        Bridge {
            proxy_id: proxy_id.into(),
            config: Some(BridgeConfig {
                kind: ConnKind::Rx,
                target: BridgeTargetConfig::Rdma(BridgeRdmaConfig {
                    remote_ip: "10.0.0.1".into(),
                    port: 9100,
                }),
                sdk: None,
            }),
            status: Some(ConnectionStatus::active_now()),
            ..Bridge::default()
        }
    }

    #[tokio::test]
    async fn add_get_link_group() {
        let reg = BridgeRegistry::spawn(100, CancellationToken::new());
        let id = reg.add(test_bridge("p1")).await.unwrap();

        reg.update_link_group(&id, "g").await.unwrap();
        let bridge = reg.get(&id, true).await.unwrap();
        assert_eq!(bridge.group_id, "g");
        assert_eq!(bridge.proxy_id, "p1");
        assert!(bridge.config.is_some());

        reg.update_unlink_group(&id).await.unwrap();
        assert!(reg.get(&id, false).await.unwrap().group_id.is_empty());

        reg.delete(&id).await.unwrap();
        assert_eq!(reg.get(&id, false).await.unwrap_err(), AgentError::ResourceNotFound);
    }
}
