//! # Global agent configuration.
//!
//! [`AgentConfig`] centralizes listen ports, queue capacities and the two
//! synchronous deadlines (event sync, proxy command sync).
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use mesh_agent::AgentConfig;
//!
//! let mut cfg = AgentConfig::default();
//! cfg.rest_port = 8200;
//! cfg.command_timeout = Duration::from_secs(5);
//!
//! assert_eq!(cfg.event_queue_capacity, 1000);
//! ```

use std::time::Duration;

/// Configuration for the agent runtime.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// REST management surface listen port.
    pub rest_port: u16,
    /// Proxy-facing service listen port (bound by the transport layer).
    pub proxy_port: u16,
    /// Capacity of each registry's request queue.
    pub registry_queue_capacity: usize,
    /// Capacity of the event bus.
    pub event_queue_capacity: usize,
    /// Capacity of each proxy's command request queue.
    pub command_queue_capacity: usize,
    /// Capacity of the apply-config worker inbox.
    pub apply_queue_capacity: usize,
    /// Deadline for a synchronous event post.
    pub event_timeout: Duration,
    /// Deadline for a synchronous proxy command.
    pub command_timeout: Duration,
}

impl Default for AgentConfig {
    /// Defaults:
    /// - `rest_port = 8100`, `proxy_port = 50051`
    /// - `registry_queue_capacity = 100`
    /// - `event_queue_capacity = 1000`
    /// - `command_queue_capacity = 1000`
    /// - `apply_queue_capacity = 10000`
    /// - `event_timeout = 20s`, `command_timeout = 10s`
    fn default() -> Self {
        Self {
            rest_port: 8100,
            proxy_port: 50051,
            registry_queue_capacity: 100,
            event_queue_capacity: 1000,
            command_queue_capacity: 1000,
            apply_queue_capacity: 10_000,
            event_timeout: Duration::from_secs(20),
            command_timeout: Duration::from_secs(10),
        }
    }
}
