//! The `if(expr)` predicate action.

use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::{ActionCtx, EventParams};
use crate::logic::actions::Action;
use crate::logic::expr::{self, ExprEnv, Value};
use crate::mesh::check_group_accepts_kind;
use crate::model::ConnKind;

const IDENTS: [&str; 4] = ["conn_kind", "conn_type", "conn_config", "group_id"];
const FUNCS: [(&str, usize); 2] = [("group_exists", 1), ("group_compatible", 3)];

/// Evaluates its modifier as a boolean expression over the event params.
///
/// `group_exists` and `group_compatible` take the group mutex so their
/// answer stays valid for a link-or-add immediately after them in the
/// chain. A compatibility rejection is recorded in the chain context so
/// the register-connection call can surface the concrete reason.
pub struct If;

struct IfEnv<'a> {
    cx: &'a AgentContext,
    params: &'a EventParams,
    incompatible: Mutex<Option<AgentError>>,
}

#[async_trait]
impl ExprEnv for IfEnv<'_> {
    fn lookup(&self, name: &str) -> Value {
        match name {
            "conn_kind" => Value::Str(
                self.params
                    .kind
                    .map(|k| k.to_string())
                    .unwrap_or_default(),
            ),
            "conn_type" => Value::Str(
                self.params
                    .conn_type
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
            ),
            "conn_config" => match &self.params.conn_config {
                Some(cfg) => Value::Config(cfg.clone()),
                None => Value::Null,
            },
            "group_id" => Value::Str(self.params.group_id.clone().unwrap_or_default()),
            _ => Value::Null,
        }
    }

    async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, AgentError> {
        match name {
            "group_exists" => {
                let Some(Value::Str(id)) = args.first() else {
                    return Err(AgentError::ManifestParse("group_exists: bad argument".into()));
                };
                if id.is_empty() {
                    return Ok(Value::Bool(false));
                }
                let _guard = self.cx.groups.mx.lock().await;
                Ok(Value::Bool(self.cx.groups.get(id, false).await.is_ok()))
            }
            "group_compatible" => {
                let (Some(Value::Str(id)), Some(Value::Str(kind)), Some(Value::Config(cfg))) =
                    (args.first(), args.get(1), args.get(2))
                else {
                    return Err(AgentError::ManifestParse("group_compatible: bad arguments".into()));
                };
                if id.is_empty() {
                    return Ok(Value::Bool(false));
                }
                let kind = ConnKind::from_str(kind)?;

                let _guard = self.cx.groups.mx.lock().await;
                let Ok(group) = self.cx.groups.get(id, true).await else {
                    return Ok(Value::Bool(false));
                };

                let check = match check_group_accepts_kind(self.cx, &group, kind).await {
                    Ok(()) => match &group.config {
                        Some(group_cfg) => group_cfg.check_payload_compatibility(cfg),
                        None => Err(AgentError::Incompatible("group has no canonical config".into())),
                    },
                    Err(err) => Err(err),
                };
                match check {
                    Ok(()) => Ok(Value::Bool(true)),
                    Err(err) => {
                        if let Ok(mut slot) = self.incompatible.lock() {
                            *slot = Some(err);
                        }
                        Ok(Value::Bool(false))
                    }
                }
            }
            other => Err(AgentError::ManifestParse(format!("unknown function '{other}'"))),
        }
    }
}

#[async_trait]
impl Action for If {
    fn validate_modifier(&self, modifier: &str) -> Result<(), AgentError> {
        let parsed = expr::parse(modifier)?;
        expr::validate(&parsed, &IDENTS, &FUNCS)
    }

    async fn perform(
        &self,
        cx: &AgentContext,
        ctx: &mut ActionCtx,
        modifier: &str,
        params: &EventParams,
    ) -> Result<bool, AgentError> {
        let parsed = expr::parse(modifier)?;
        let env = IfEnv {
            cx,
            params,
            incompatible: Mutex::new(None),
        };

        let output = expr::eval(&parsed, &env).await;

        if let Ok(mut slot) = env.incompatible.lock() {
            if let Some(err) = slot.take() {
                ctx.incompatible = Some(err);
            }
        }

        match output? {
            Value::Bool(result) => Ok(result),
            _ => Ok(false),
        }
    }
}
