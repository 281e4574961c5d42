//! Single-writer registries for the four resource kinds.
//!
//! Each registry is one task owning its state (see [`kernel`]); the typed
//! wrappers add projection flags, domain link/unlink verbs and, for
//! groups, the external creation mutex.

mod bridge;
mod conn;
mod group;
pub mod kernel;
mod proxy;

pub use bridge::BridgeRegistry;
pub use conn::ConnRegistry;
pub use group::MultipointGroupRegistry;
pub use kernel::{EntityHandler, ReadFlags, RegistryKernel};
pub use proxy::MediaProxyRegistry;
