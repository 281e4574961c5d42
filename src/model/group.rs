//! Multipoint groups: logical many-to-many rendezvous points keyed by URN.

use serde::{Deserialize, Serialize};

use crate::model::conn::ConnectionStatus;
use crate::model::sdk::SdkConnectionConfig;

/// Canonical payload descriptor of a group, carried from its first joiner.
/// Later joiners must be pairwise-compatible with it.
pub type MultipointGroupConfig = SdkConnectionConfig;

/// A logical rendezvous. The id is the URN itself (`ip:port` for ST 2110,
/// the explicit URN string otherwise), never a generated UUID.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipointGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<MultipointGroupConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ConnectionStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conn_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bridge_ids: Vec<String>,
}
