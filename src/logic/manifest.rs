//! # Manifest: declarative event → action-tree routing.
//!
//! The manifest is a YAML document of the shape
//!
//! ```yaml
//! logic:
//!   <event-name>:
//!     <action-name>[(modifier)]:
//!       success | true:
//!         <action-name>: …
//!       error | false:
//!         <action-name>: …
//! ```
//!
//! Parsing is strict: unknown event names, unknown action names, unknown
//! branch keys and malformed modifiers all fail. The four branch keys
//! collapse into two at parse time — `success` wins over `true` and
//! `error` over `false` when both are present, matching the runtime
//! priority of the original rule engine.

use serde_yaml::Value;

use crate::error::AgentError;
use crate::events::EventType;
use crate::logic::actions::ActionRegistry;

/// One node of an action tree.
#[derive(Clone, Debug, Default)]
pub struct ActionNode {
    pub name: String,
    pub modifier: String,
    pub on_true: Vec<ActionNode>,
    pub on_false: Vec<ActionNode>,
}

/// All action chains of one event.
#[derive(Clone, Debug)]
pub struct ManifestEvent {
    pub event_type: EventType,
    pub actions: Vec<ActionNode>,
}

/// Parsed manifest: per-event action trees in document order.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    pub events: Vec<ManifestEvent>,
}

fn parse_err(msg: impl Into<String>) -> AgentError {
    AgentError::ManifestParse(msg.into())
}

/// Splits `name(modifier)` into its parts; the modifier is opaque and
/// passed through verbatim.
fn split_action_key(key: &str) -> Result<(String, String), AgentError> {
    match key.split_once('(') {
        None => Ok((key.to_string(), String::new())),
        Some((name, rest)) => {
            let modifier = rest
                .strip_suffix(')')
                .ok_or_else(|| parse_err(format!("unbalanced modifier in action '{key}'")))?;
            if name.is_empty() {
                return Err(parse_err(format!("empty action name in '{key}'")));
            }
            Ok((name.to_string(), modifier.to_string()))
        }
    }
}

fn as_str_key(key: &Value) -> Result<&str, AgentError> {
    key.as_str()
        .ok_or_else(|| parse_err(format!("non-string key in manifest: {key:?}")))
}

fn decode_actions(value: &Value, actions: &ActionRegistry) -> Result<Vec<ActionNode>, AgentError> {
    let mapping = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(m) => m,
        other => return Err(parse_err(format!("expected action mapping, found {other:?}"))),
    };

    let mut out = Vec::new();
    for (key, body) in mapping {
        let key = as_str_key(key)?;
        let (name, modifier) = split_action_key(key)?;

        let action = actions
            .get(&name)
            .ok_or_else(|| parse_err(format!("unknown action name ({name})")))?;
        action.validate_modifier(&modifier)?;

        let mut res_true = Vec::new();
        let mut res_false = Vec::new();
        let mut res_success = Vec::new();
        let mut res_error = Vec::new();

        match body {
            Value::Null => {}
            Value::Mapping(branches) => {
                for (branch_key, branch_body) in branches {
                    let branch_key = as_str_key(branch_key)?;
                    let decoded = decode_actions(branch_body, actions)
                        .map_err(|e| parse_err(format!("branch '{branch_key}' of '{name}': {e}")))?;
                    match branch_key {
                        "true" => res_true = decoded,
                        "false" => res_false = decoded,
                        "success" => res_success = decoded,
                        "error" => res_error = decoded,
                        other => return Err(parse_err(format!("unknown result type ({other})"))),
                    }
                }
            }
            other => {
                return Err(parse_err(format!(
                    "action '{name}' body must be a mapping, found {other:?}"
                )))
            }
        }

        out.push(ActionNode {
            name,
            modifier,
            on_true: if res_success.is_empty() { res_true } else { res_success },
            on_false: if res_error.is_empty() { res_false } else { res_error },
        });
    }

    Ok(out)
}

impl Manifest {
    /// Parses and validates a manifest document against the registered
    /// event and action names.
    pub fn parse(text: &str, actions: &ActionRegistry) -> Result<Manifest, AgentError> {
        let doc: Value =
            serde_yaml::from_str(text).map_err(|e| parse_err(format!("manifest decode err: {e}")))?;

        let Value::Mapping(root) = doc else {
            return Err(parse_err("manifest root must be a mapping"));
        };
        for key in root.keys() {
            if as_str_key(key)? != "logic" {
                return Err(parse_err(format!("unknown top-level key ({:?})", key)));
            }
        }
        let logic = root
            .iter()
            .find_map(|(key, value)| (key.as_str() == Some("logic")).then_some(value))
            .unwrap_or(&Value::Null);

        let events_map = match logic {
            Value::Null => return Ok(Manifest::default()),
            Value::Mapping(m) => m,
            other => return Err(parse_err(format!("'logic' must be a mapping, found {other:?}"))),
        };

        let mut events = Vec::new();
        for (key, body) in events_map {
            let name = as_str_key(key)?;
            let event_type = EventType::from_name(name)
                .ok_or_else(|| parse_err(format!("unknown event name ({name})")))?;
            let actions = decode_actions(body, actions)
                .map_err(|e| parse_err(format!("event '{name}': {e}")))?;
            events.push(ManifestEvent { event_type, actions });
        }

        Ok(Manifest { events })
    }
}
