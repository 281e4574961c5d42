//! External surfaces: the proxy-facing service, the REST management
//! endpoints and the wire message model they exchange.

pub mod proxy;
pub mod rest;
pub mod wire;

pub use proxy::{CommandSink, ProxyService};
pub use rest::{router, run_rest_server};
