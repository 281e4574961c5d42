//! Proxy registry bindings.

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;
use crate::model::{MediaProxy, MediaProxyConfig, MediaProxyStatus, PortMask, ProxyChannel};

/// Creates a media proxy from the registration parameters. The allowed
/// RDMA port list must parse; everything else is taken as supplied.
pub struct RegistryAddProxy;

#[async_trait]
impl Action for RegistryAddProxy {
    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let st2110 = params.st2110.clone().unwrap_or_default();
        let rdma = params.rdma.clone().unwrap_or_default();

        let rdma_ports_allowed = PortMask::parse(&rdma.dataplane_local_ports)?;

        let channel = ProxyChannel::new(
            cx.router.clone(),
            cx.cfg.command_queue_capacity,
            cx.root.child_token(),
        );
        let proxy = MediaProxy::new(
            MediaProxyConfig {
                sdk_api_port: params.sdk_api_port.unwrap_or_default(),
                st2110,
                rdma,
            },
            MediaProxyStatus::healthy_now(),
            rdma_ports_allowed,
            channel,
        );

        let id = cx.proxies.add(proxy).await?;
        ctx.proxy_id = Some(id);
        Ok(true)
    }
}

/// Deletes a media proxy; its per-proxy context is cancelled on the way
/// out, releasing any in-flight command waits.
pub struct RegistryDeleteProxy;

#[async_trait]
impl Action for RegistryDeleteProxy {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let proxy_id = params.proxy_id()?;
        cx.proxies.delete(proxy_id).await?;
        Ok(true)
    }
}
