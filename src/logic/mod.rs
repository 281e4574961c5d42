//! The rule engine: manifest, actions, predicate expressions and the
//! controller that interprets them against the event stream.

pub mod actions;
pub mod controller;
pub mod expr;
pub mod manifest;

pub use actions::{Action, ActionRegistry};
pub use controller::LogicController;
pub use manifest::{ActionNode, Manifest, ManifestEvent};

/// The manifest shipped with the agent.
pub const DEFAULT_MANIFEST: &str = include_str!("default.yaml");
