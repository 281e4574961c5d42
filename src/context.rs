//! # Agent context: the owner objects of the control plane.
//!
//! There are no process-wide singletons; everything a component or action
//! needs is constructed once at startup and carried here. API handlers
//! receive an `Arc<AgentContext>`, actions receive a reference per
//! invocation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::events::EventBus;
use crate::mesh::ApplyConfigQueue;
use crate::model::CommandRouter;
use crate::registry::{BridgeRegistry, ConnRegistry, MediaProxyRegistry, MultipointGroupRegistry};
use crate::telemetry::TelemetrySink;

/// Shared coordination point for registries, the bus and the workers.
pub struct AgentContext {
    pub cfg: AgentConfig,
    pub proxies: MediaProxyRegistry,
    pub conns: ConnRegistry,
    pub groups: MultipointGroupRegistry,
    pub bridges: BridgeRegistry,
    pub bus: EventBus,
    pub apply: ApplyConfigQueue,
    pub router: Arc<CommandRouter>,
    pub telemetry: TelemetrySink,
    /// Root of the cancellation hierarchy; per-proxy tokens are children.
    pub root: CancellationToken,
}
