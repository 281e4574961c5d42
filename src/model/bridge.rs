//! Inter-proxy tunnel halves. A bridge is one end (rx or tx) of an
//! ST 2110 or RDMA link; the star synthesizer creates RDMA halves in
//! pairs sharing a port.

use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::model::conn::{ConnKind, ConnectionStatus};
use crate::model::sdk::{SdkConnectionConfig, St2110Transport};

/// Tunnel technology of a bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeType {
    St2110,
    Rdma,
}

impl std::fmt::Display for BridgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeType::St2110 => write!(f, "st2110"),
            BridgeType::Rdma => write!(f, "rdma"),
        }
    }
}

/// An inter-proxy tunnel endpoint owned by exactly one proxy and group.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bridge {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<BridgeConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionStatus>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSt2110Config {
    pub remote_ip: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mcast_sip_addr: String,
    pub transport: St2110Transport,
    pub payload_type: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRdmaConfig {
    pub remote_ip: String,
    pub port: u16,
}

/// Type-specific tunnel target. Exactly one per bridge, by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeTargetConfig {
    St2110(BridgeSt2110Config),
    Rdma(BridgeRdmaConfig),
}

/// Bridge configuration: direction, target, and the group's payload
/// descriptor carried along so the data plane can shape the tunnel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub kind: ConnKind,
    #[serde(flatten)]
    pub target: BridgeTargetConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk: Option<SdkConnectionConfig>,
}

impl BridgeConfig {
    pub fn bridge_type(&self) -> BridgeType {
        match self.target {
            BridgeTargetConfig::St2110(_) => BridgeType::St2110,
            BridgeTargetConfig::Rdma(_) => BridgeType::Rdma,
        }
    }
}

impl Bridge {
    /// Checks that the target is complete enough to be pushed to a proxy.
    pub fn validate_config(&self) -> Result<(), AgentError> {
        let cfg = self
            .config
            .as_ref()
            .ok_or_else(|| AgentError::InvalidConfig("bridge config is nil".into()))?;
        match &cfg.target {
            BridgeTargetConfig::St2110(st) => {
                if st.remote_ip.is_empty() {
                    return Err(AgentError::InvalidConfig("bad st2110 bridge ip addr".into()));
                }
                if st.port == 0 {
                    return Err(AgentError::InvalidConfig("bad st2110 bridge port".into()));
                }
            }
            BridgeTargetConfig::Rdma(rdma) => {
                if rdma.remote_ip.is_empty() {
                    return Err(AgentError::InvalidConfig("bad rdma bridge remote ip addr".into()));
                }
                if rdma.port == 0 {
                    return Err(AgentError::InvalidConfig("bad rdma bridge port".into()));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rdma_bridge(remote_ip: &str, port: u16) -> Bridge {
        Bridge {
            config: Some(BridgeConfig {
                kind: ConnKind::Rx,
                target: BridgeTargetConfig::Rdma(BridgeRdmaConfig {
                    remote_ip: remote_ip.into(),
                    port,
                }),
                sdk: None,
            }),
            ..Bridge::default()
        }
    }

    #[test]
    fn validate_accepts_complete_rdma_target() {
        assert!(rdma_bridge("10.0.0.1", 9100).validate_config().is_ok());
    }

    #[test]
    fn validate_rejects_incomplete_targets() {
        assert!(rdma_bridge("", 9100).validate_config().is_err());
        assert!(rdma_bridge("10.0.0.1", 0).validate_config().is_err());
        assert!(Bridge::default().validate_config().is_err());
    }

    #[test]
    fn bridge_type_follows_target() {
        let b = rdma_bridge("10.0.0.1", 9100);
        assert_eq!(b.config.unwrap().bridge_type(), BridgeType::Rdma);
    }
}
