//! Apply-config enqueue actions.

use async_trait::async_trait;
use tracing::warn;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;

/// Enqueues one proxy for a config push. The enqueue is non-blocking, so
/// the action is safe inside synchronous event handlers.
pub struct ProxyApplyConfig;

#[async_trait]
impl Action for ProxyApplyConfig {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let proxy_id = params.proxy_id()?;

        // Verify the proxy still exists before scheduling work for it.
        cx.proxies.get(proxy_id, false).await?;
        cx.apply.enqueue(proxy_id)?;
        Ok(true)
    }
}

/// Enqueues every registered proxy for a config push. Wired to
/// asynchronous events only, so fleet-wide pushes never run inside a
/// synchronous caller's critical section.
pub struct AllProxiesApplyConfig;

#[async_trait]
impl Action for AllProxiesApplyConfig {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        _params: &EventParams,
    ) -> Result<bool, AgentError> {
        let proxies = cx.proxies.list(None, false, false).await?;
        for proxy in &proxies {
            if let Err(err) = cx.apply.enqueue(&proxy.id) {
                warn!(proxy_id = %proxy.id, err = %err, "apply config enqueue failed");
            }
        }
        Ok(true)
    }
}
