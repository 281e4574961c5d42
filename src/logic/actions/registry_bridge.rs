//! Bridge registry bindings.

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;
use crate::mesh::parse_group_urn;
use crate::model::sdk::{ConnType, SdkConn, St2110Transport};
use crate::model::{
    Bridge, BridgeConfig, BridgeSt2110Config, BridgeTargetConfig, ConnKind, ConnectionStatus,
};

/// Creates the ST 2110 half-bridge that anchors a group derived from an
/// ST 2110 connection: an rx bridge pulling the remote essence in when the
/// local connection transmits, a tx bridge feeding the remote target when
/// the local connection receives. The bridge lands on the connection's
/// proxy; its target comes from the group URN.
pub struct RegistryAddBridgeSt2110;

#[async_trait]
impl Action for RegistryAddBridgeSt2110 {
    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let conn_type = params.conn_type()?;
        if conn_type != ConnType::St2110 {
            return Err(AgentError::InvalidConfig(format!(
                "registry add bridge st2110 wrong type: '{conn_type}'"
            )));
        }

        let proxy_id = params.proxy_id()?;
        let conn_kind = params.kind()?;
        let group_id = ctx
            .group_id
            .clone()
            .ok_or_else(|| AgentError::Other("registry add bridge st2110: no group id in ctx".into()))?;

        let bridge_kind = match conn_kind {
            ConnKind::Tx => ConnKind::Rx,
            ConnKind::Rx => ConnKind::Tx,
        };

        let (remote_ip, port) = parse_group_urn(&group_id)?;

        let sdk = params.conn_config()?;
        let (transport, payload_type) = match &sdk.conn {
            SdkConn::St2110(st) => (st.transport, st.payload_type),
            _ => (St2110Transport::St2110_20, 112),
        };

        let id = cx
            .bridges
            .add(Bridge {
                proxy_id: proxy_id.to_string(),
                group_id: group_id.clone(),
                config: Some(BridgeConfig {
                    kind: bridge_kind,
                    target: BridgeTargetConfig::St2110(BridgeSt2110Config {
                        remote_ip,
                        port,
                        mcast_sip_addr: String::new(),
                        transport,
                        payload_type,
                    }),
                    sdk: Some((**sdk).clone()),
                }),
                status: Some(ConnectionStatus::active_now()),
                ..Bridge::default()
            })
            .await?;

        cx.proxies.update_link_bridge(proxy_id, &id).await?;

        ctx.bridge_id = Some(id);
        Ok(true)
    }
}
