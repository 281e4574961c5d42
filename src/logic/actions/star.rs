//! Star-interconnect synthesis action.

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;
use crate::mesh::apply_star_interconnect;

/// Reconciles every group's RDMA bridges against the desired star
/// topology (see [`crate::mesh::star`]).
pub struct AllMultipointGroupsApplyProxyStarInterconnect;

#[async_trait]
impl Action for AllMultipointGroupsApplyProxyStarInterconnect {
    async fn perform(
        &self,
        cx: &AgentContext,
        _ctx: &mut ActionCtx,
        _modifier: &str,
        _params: &EventParams,
    ) -> Result<bool, AgentError> {
        apply_star_interconnect(cx).await
    }
}
