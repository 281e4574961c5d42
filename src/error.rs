//! # Error types shared across the agent.
//!
//! [`AgentError`] is the single error enum surfaced by registries, the event
//! bus, the command channel and the rule engine. Domain failures keep their
//! original message text because several of them travel back to the data
//! plane verbatim (compatibility rejections in particular).

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the agent core.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// Lookup or unlink of an id that is not in a registry.
    #[error("resource not found")]
    ResourceNotFound,

    /// An externally supplied id collides with an existing entry.
    #[error("id already exists in registry ({0})")]
    IdExists(String),

    /// Internal invariant violation inside a registry handler.
    #[error("type cast failed")]
    TypeCastFailed,

    /// A textual port list did not parse.
    #[error("invalid port range")]
    InvalidPortRange,

    /// The allocator scanned the whole allowed mask without a free bit.
    #[error("no available ports")]
    NoAvailablePorts,

    /// The proxy's command stream is detached.
    #[error("proxy command stream not ready")]
    ProxyNotReady,

    /// A command reply arrived for an unknown or already-completed request.
    #[error("command reply id not found")]
    ReplyNotFound,

    /// A command reply named a proxy other than the request's owner.
    #[error("bad proxy id in command reply: '{got}', expected '{want}'")]
    ReplyProxyMismatch { got: String, want: String },

    /// An in-flight command was cancelled by the side that issued it.
    #[error("command request cancelled by initiator")]
    CancelledByInitiator,

    /// A required event parameter was absent.
    #[error("param not found: {0}")]
    MissingParam(&'static str),

    /// A connection joined a group with an incompatible payload.
    #[error("incompatible with multipoint group: {0}")]
    Incompatible(String),

    /// Config validation failure (bridge/sdk descriptors).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Manifest or expression rejected at parse time.
    #[error("manifest parse err: {0}")]
    ManifestParse(String),

    /// A synchronous wait exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The component the caller talked to is shutting down.
    #[error("cancelled")]
    Cancelled,

    /// Queue at capacity and the caller asked for a non-blocking submit.
    #[error("queue full")]
    QueueFull,

    /// Anything the above does not classify.
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Short stable label (snake_case) for logs and metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            AgentError::ResourceNotFound => "resource_not_found",
            AgentError::IdExists(_) => "id_exists",
            AgentError::TypeCastFailed => "type_cast_failed",
            AgentError::InvalidPortRange => "invalid_port_range",
            AgentError::NoAvailablePorts => "no_available_ports",
            AgentError::ProxyNotReady => "proxy_not_ready",
            AgentError::ReplyNotFound => "reply_not_found",
            AgentError::ReplyProxyMismatch { .. } => "reply_proxy_mismatch",
            AgentError::CancelledByInitiator => "cancelled_by_initiator",
            AgentError::MissingParam(_) => "missing_param",
            AgentError::Incompatible(_) => "incompatible",
            AgentError::InvalidConfig(_) => "invalid_config",
            AgentError::ManifestParse(_) => "manifest_parse",
            AgentError::Timeout(_) => "timeout",
            AgentError::Cancelled => "cancelled",
            AgentError::QueueFull => "queue_full",
            AgentError::Other(_) => "other",
        }
    }

    /// True for cancellation/timeout outcomes that the core never retries.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AgentError::Cancelled | AgentError::Timeout(_))
    }
}
