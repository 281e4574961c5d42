//! Connection registry bindings.

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;
use crate::model::{Connection, ConnectionConfig, ConnectionStatus};

/// Adds a connection and links it into its owning proxy. The new id (and
/// the target group id) is left in the chain context for downstream
/// actions.
pub struct RegistryAddConnection;

#[async_trait]
impl Action for RegistryAddConnection {
    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let proxy_id = params.proxy_id()?;
        let kind = params.kind()?;
        let sdk = params.conn_config()?;

        let id = cx
            .conns
            .add(Connection {
                proxy_id: proxy_id.to_string(),
                config: Some(ConnectionConfig {
                    kind,
                    sdk: (**sdk).clone(),
                }),
                status: Some(ConnectionStatus::active_now()),
                ..Connection::default()
            })
            .await?;

        cx.proxies.update_link_conn(proxy_id, &id).await?;

        ctx.conn_id = Some(id);
        ctx.group_id = params.group_id.clone();
        Ok(true)
    }
}

/// Deletes a connection and unlinks it from its proxy.
pub struct RegistryDeleteConnection;

#[async_trait]
impl Action for RegistryDeleteConnection {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let proxy_id = params.proxy_id()?;
        let conn_id = params.conn_id()?;

        cx.conns.delete(conn_id).await?;
        cx.proxies.update_unlink_conn(proxy_id, conn_id).await?;
        Ok(true)
    }
}
