//! Multipoint-group registry bindings.

use async_trait::async_trait;
use tracing::error;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;
use crate::model::{ConnectionStatus, MultipointGroup};

/// Links the chain's connection into the event's group, creating the
/// group on first join with the connection's payload as its canonical
/// config. Holds the group mutex across the check-then-create.
pub struct RegistryUpdateOrAddMultipointGroupLinkConnection;

#[async_trait]
impl Action for RegistryUpdateOrAddMultipointGroupLinkConnection {
    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let group_id = params.group_id()?;
        let conn_id = ctx
            .conn_id
            .clone()
            .ok_or_else(|| AgentError::Other("multipoint group link conn: no conn id in ctx".into()))?;
        let sdk = params.conn_config()?;

        cx.conns.update_link_group(&conn_id, group_id).await?;

        let _guard = cx.groups.mx.lock().await;

        match cx.groups.update_link_conn(group_id, &conn_id).await {
            Err(AgentError::ResourceNotFound) => {
                cx.groups
                    .add(MultipointGroup {
                        id: group_id.to_string(),
                        config: Some((**sdk).clone()),
                        status: Some(ConnectionStatus::active_now()),
                        conn_ids: vec![conn_id],
                        bridge_ids: Vec::new(),
                    })
                    .await?;
            }
            other => other?,
        }
        Ok(true)
    }
}

/// Unlinks a connection from its group and clears the back-reference.
pub struct RegistryUpdateMultipointGroupUnlinkConnection;

#[async_trait]
impl Action for RegistryUpdateMultipointGroupUnlinkConnection {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let group_id = params.group_id()?;
        let conn_id = params.conn_id()?;

        cx.groups.update_unlink_conn(group_id, conn_id).await?;
        Ok(true)
    }
}

/// Links the chain's freshly created bridge into the event's group.
pub struct RegistryUpdateMultipointGroupLinkBridge;

#[async_trait]
impl Action for RegistryUpdateMultipointGroupLinkBridge {
    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let group_id = match &ctx.group_id {
            Some(id) => id.clone(),
            None => params.group_id()?.to_string(),
        };
        let bridge_id = ctx
            .bridge_id
            .clone()
            .ok_or_else(|| AgentError::Other("multipoint group link bridge: no bridge id in ctx".into()))?;

        cx.bridges.update_link_group(&bridge_id, &group_id).await?;
        cx.groups.update_link_bridge(&group_id, &bridge_id).await?;
        Ok(true)
    }
}

/// Under the group mutex: when the group holds no connections, deletes
/// its bridges (unlinking each from its proxy) and then the group itself.
pub struct RegistryDeleteMultipointGroupIfEmpty;

#[async_trait]
impl Action for RegistryDeleteMultipointGroupIfEmpty {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let group_id = params.group_id()?;

        let _guard = cx.groups.mx.lock().await;

        let group = cx.groups.get(group_id, false).await?;
        if !group.conn_ids.is_empty() {
            return Ok(true);
        }

        for bridge_id in &group.bridge_ids {
            let proxy_id = match cx.bridges.get(bridge_id, false).await {
                Ok(bridge) => Some(bridge.proxy_id),
                Err(_) => None,
            };
            if let Err(err) = cx.bridges.delete(bridge_id).await {
                error!(%bridge_id, err = %err, "delete group: bridge delete err");
            }
            if let Some(proxy_id) = proxy_id {
                if let Err(err) = cx.proxies.update_unlink_bridge(&proxy_id, bridge_id).await {
                    error!(%bridge_id, err = %err, "delete group: proxy unlink bridge err");
                }
            }
        }

        cx.groups.delete(group_id).await?;
        Ok(true)
    }
}
