//! # Built-in actions of the rule engine.
//!
//! An action is a named unit the manifest composes into per-event trees.
//! Each invocation receives the shared [`AgentContext`], the mutable
//! [`ActionCtx`] threading through the chain, its opaque modifier and the
//! event's parameter record. The boolean result (or an error) selects
//! which branch of the tree runs next.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};

mod apply_config;
mod predicate;
mod registry_bridge;
mod registry_conn;
mod registry_group;
mod registry_proxy;
mod star;

/// A named unit of business logic driven by the manifest.
#[async_trait]
pub trait Action: Send + Sync {
    /// Parse-time validation of the `(modifier)` suffix.
    fn validate_modifier(&self, _modifier: &str) -> Result<(), AgentError> {
        Ok(())
    }

    /// Performs the action. `Ok(true)` routes to the success/true branch,
    /// `Ok(false)` and `Err` route to the error/false branch.
    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError>;
}

/// Name → action lookup used by the manifest parser and the controller.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    map: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with every built-in action.
    pub fn builtin() -> Self {
        let mut reg = Self::new();
        reg.register("registry-add-proxy", Arc::new(registry_proxy::RegistryAddProxy));
        reg.register("registry-delete-proxy", Arc::new(registry_proxy::RegistryDeleteProxy));
        reg.register("registry-add-connection", Arc::new(registry_conn::RegistryAddConnection));
        reg.register(
            "registry-delete-connection",
            Arc::new(registry_conn::RegistryDeleteConnection),
        );
        reg.register(
            "registry-add-bridge-st2110",
            Arc::new(registry_bridge::RegistryAddBridgeSt2110),
        );
        reg.register(
            "registry-update-multipoint-group-link-bridge",
            Arc::new(registry_group::RegistryUpdateMultipointGroupLinkBridge),
        );
        reg.register(
            "registry-update-or-add-multipoint-group-link-connection",
            Arc::new(registry_group::RegistryUpdateOrAddMultipointGroupLinkConnection),
        );
        reg.register(
            "registry-update-multipoint-group-unlink-connection",
            Arc::new(registry_group::RegistryUpdateMultipointGroupUnlinkConnection),
        );
        reg.register(
            "registry-delete-multipoint-group-if-empty",
            Arc::new(registry_group::RegistryDeleteMultipointGroupIfEmpty),
        );
        reg.register("if", Arc::new(predicate::If));
        reg.register("proxy-apply-config", Arc::new(apply_config::ProxyApplyConfig));
        reg.register("all-proxies-apply-config", Arc::new(apply_config::AllProxiesApplyConfig));
        reg.register(
            "all-multipoint-groups-apply-proxy-star-interconnect",
            Arc::new(star::AllMultipointGroupsApplyProxyStarInterconnect),
        );
        reg
    }

    pub fn register(&mut self, name: &str, action: Arc<dyn Action>) {
        self.map.insert(name.to_string(), action);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.map.get(name).cloned()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    struct Noop;

    #[async_trait]
    impl Action for Noop {
        async fn perform(
            &self,
            _cx: &AgentContext,
            _ctx: &mut ActionCtx,
            _modifier: &str,
            _params: &EventParams,
        ) -> Result<bool, AgentError> {
            Ok(true)
        }
    }

    /// Registry containing trivial actions under the given names.
    pub(crate) fn registry_with_noop(names: &[&str]) -> ActionRegistry {
        let mut reg = ActionRegistry::new();
        for name in names {
            reg.register(name, Arc::new(Noop));
        }
        reg
    }
}
