//! Local media endpoints registered by application SDKs through a proxy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::model::sdk::SdkConnectionConfig;
use crate::model::time_millis;

/// Direction of a connection or bridge half, from the proxy's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnKind {
    Tx,
    Rx,
}

impl std::fmt::Display for ConnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnKind::Tx => write!(f, "tx"),
            ConnKind::Rx => write!(f, "rx"),
        }
    }
}

impl std::str::FromStr for ConnKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tx" => Ok(ConnKind::Tx),
            "rx" => Ok(ConnKind::Rx),
            other => Err(AgentError::InvalidConfig(format!("bad conn kind: '{other}'"))),
        }
    }
}

/// A local media endpoint on a specific proxy.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proxy_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConnectionConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionStatus>,
}

/// Full connection configuration: direction plus the SDK descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub kind: ConnKind,
    #[serde(flatten)]
    pub sdk: SdkConnectionConfig,
}

/// Live status of a connection or a bridge half. Counter fields are
/// populated from the telemetry sink on listing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    #[serde(with = "time_millis")]
    pub registered_at: DateTime<Utc>,
    #[serde(with = "time_millis::opt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub state: String,
    pub linked: bool,
    #[serde(rename = "inbound")]
    pub inbound_bytes: u64,
    #[serde(rename = "outbound")]
    pub outbound_bytes: u64,
    #[serde(rename = "trnSucceeded")]
    pub transactions_succeeded: u32,
    #[serde(rename = "trnFailed")]
    pub transactions_failed: u32,
    #[serde(rename = "tps")]
    pub transactions_per_second: f64,
    /// One unit is 1 Mbit/s.
    #[serde(rename = "inBandwidthMbit")]
    pub inbound_bandwidth: f64,
    /// One unit is 1 Mbit/s.
    #[serde(rename = "outBandwidthMbit")]
    pub outbound_bandwidth: f64,
    pub errors: u32,
    pub errors_delta: u32,
}

impl ConnectionStatus {
    /// Fresh status in the `active` state, registered now.
    pub fn active_now() -> Self {
        Self {
            registered_at: Utc::now(),
            updated_at: None,
            state: "active".into(),
            linked: false,
            inbound_bytes: 0,
            outbound_bytes: 0,
            transactions_succeeded: 0,
            transactions_failed: 0,
            transactions_per_second: 0.0,
            inbound_bandwidth: 0.0,
            outbound_bandwidth: 0.0,
            errors: 0,
            errors_delta: 0,
        }
    }
}
