//! # Typed events and their parameter record.
//!
//! Every external stimulus is serialized into one [`Event`] posted on the
//! bus. Parameters travel in a closed, typed record ([`EventParams`])
//! rather than an open key/value map; actions destructure the fields they
//! need and report missing ones by name. Action outputs travel the other
//! way in an [`ActionCtx`] threaded through the chain — its value at the
//! end of the first matching chain is what a synchronous poster receives.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::error::AgentError;
use crate::model::sdk::{ConnType, SdkConnectionConfig};
use crate::model::{ConnKind, RdmaProxyConfig, St2110ProxyConfig};

/// Identifiers of everything that can happen to the control plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    OnRegisterProxy,
    OnRegisterProxyOk,
    OnActivateProxy,
    OnUnregisterProxy,
    OnUnregisterProxyOk,
    OnRegisterConnection,
    OnRegisterConnectionOk,
    OnUnregisterConnection,
    OnUnregisterConnectionOk,
    OnMultipointGroupAdded,
    OnMultipointGroupUpdated,
    OnMultipointGroupDeleted,
    OnProxyDisconnected,
}

impl EventType {
    /// All event types, in manifest order.
    pub const ALL: [EventType; 13] = [
        EventType::OnRegisterProxy,
        EventType::OnRegisterProxyOk,
        EventType::OnActivateProxy,
        EventType::OnUnregisterProxy,
        EventType::OnUnregisterProxyOk,
        EventType::OnRegisterConnection,
        EventType::OnRegisterConnectionOk,
        EventType::OnUnregisterConnection,
        EventType::OnUnregisterConnectionOk,
        EventType::OnMultipointGroupAdded,
        EventType::OnMultipointGroupUpdated,
        EventType::OnMultipointGroupDeleted,
        EventType::OnProxyDisconnected,
    ];

    /// Manifest identifier of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventType::OnRegisterProxy => "on-register-proxy",
            EventType::OnRegisterProxyOk => "on-register-proxy-ok",
            EventType::OnActivateProxy => "on-activate-proxy",
            EventType::OnUnregisterProxy => "on-unregister-proxy",
            EventType::OnUnregisterProxyOk => "on-unregister-proxy-ok",
            EventType::OnRegisterConnection => "on-register-connection",
            EventType::OnRegisterConnectionOk => "on-register-connection-ok",
            EventType::OnUnregisterConnection => "on-unregister-connection",
            EventType::OnUnregisterConnectionOk => "on-unregister-connection-ok",
            EventType::OnMultipointGroupAdded => "on-multipoint-group-added",
            EventType::OnMultipointGroupUpdated => "on-multipoint-group-updated",
            EventType::OnMultipointGroupDeleted => "on-multipoint-group-deleted",
            EventType::OnProxyDisconnected => "on-proxy-disconnected",
        }
    }

    pub fn from_name(name: &str) -> Option<EventType> {
        EventType::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed record of everything an event can carry into its handlers.
#[derive(Clone, Debug, Default)]
pub struct EventParams {
    pub proxy_id: Option<String>,
    pub conn_id: Option<String>,
    pub group_id: Option<String>,
    pub bridge_id: Option<String>,
    pub kind: Option<ConnKind>,
    pub conn_type: Option<ConnType>,
    pub conn_config: Option<Arc<SdkConnectionConfig>>,
    pub sdk_api_port: Option<u32>,
    pub st2110: Option<St2110ProxyConfig>,
    pub rdma: Option<RdmaProxyConfig>,
}

impl EventParams {
    pub fn proxy_id(&self) -> Result<&str, AgentError> {
        self.proxy_id.as_deref().ok_or(AgentError::MissingParam("proxy_id"))
    }

    pub fn conn_id(&self) -> Result<&str, AgentError> {
        self.conn_id.as_deref().ok_or(AgentError::MissingParam("conn_id"))
    }

    pub fn group_id(&self) -> Result<&str, AgentError> {
        self.group_id.as_deref().ok_or(AgentError::MissingParam("group_id"))
    }

    pub fn kind(&self) -> Result<ConnKind, AgentError> {
        self.kind.ok_or(AgentError::MissingParam("kind"))
    }

    pub fn conn_type(&self) -> Result<ConnType, AgentError> {
        self.conn_type.ok_or(AgentError::MissingParam("conn_type"))
    }

    pub fn conn_config(&self) -> Result<&Arc<SdkConnectionConfig>, AgentError> {
        self.conn_config
            .as_ref()
            .ok_or(AgentError::MissingParam("conn_config"))
    }
}

impl std::fmt::Display for EventParams {
    /// `{k=v, …}` over the fields that are set; used by the `[EVT]` trace.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if let Some(v) = &self.proxy_id {
            parts.push(format!("proxy_id={v}"));
        }
        if let Some(v) = &self.conn_id {
            parts.push(format!("conn_id={v}"));
        }
        if let Some(v) = &self.group_id {
            parts.push(format!("group_id={v}"));
        }
        if let Some(v) = &self.bridge_id {
            parts.push(format!("bridge_id={v}"));
        }
        if let Some(v) = &self.kind {
            parts.push(format!("kind={v}"));
        }
        if let Some(v) = &self.conn_type {
            parts.push(format!("conn_type={v}"));
        }
        if self.conn_config.is_some() {
            parts.push("conn_config=…".into());
        }
        if let Some(v) = self.sdk_api_port {
            parts.push(format!("sdk_api_port={v}"));
        }
        if parts.is_empty() {
            Ok(())
        } else {
            write!(f, "{{{}}}", parts.join(", "))
        }
    }
}

/// Values produced by an action chain, returned to synchronous posters.
#[derive(Clone, Debug, Default)]
pub struct ActionCtx {
    pub proxy_id: Option<String>,
    pub conn_id: Option<String>,
    pub group_id: Option<String>,
    pub bridge_id: Option<String>,
    /// Concrete compatibility rejection recorded by the `if(...)`
    /// predicate so the register-connection call can surface it verbatim.
    pub incompatible: Option<AgentError>,
}

/// One stimulus on the bus.
pub struct Event {
    pub event_type: EventType,
    pub params: EventParams,
    pub(crate) sync_reply: Option<oneshot::Sender<ActionCtx>>,
}
