//! Mesh topology logic: star-interconnect synthesis, per-proxy config
//! views and group membership rules.

pub mod apply;
pub mod compat;
pub mod star;

pub use apply::{apply_proxy_config, build_proxy_view, run_apply_worker, ApplyConfigQueue};
pub use compat::{check_group_accepts_kind, parse_group_urn};
pub use star::apply_star_interconnect;
