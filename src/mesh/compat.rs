//! Group membership rules and URN parsing.

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::model::{ConnKind, MultipointGroup};

/// A group may hold at most one rx participant, counting both local
/// connections and rx bridges. Joining tx is always fine.
pub async fn check_group_accepts_kind(
    cx: &AgentContext,
    group: &MultipointGroup,
    kind: ConnKind,
) -> Result<(), AgentError> {
    if kind != ConnKind::Rx {
        return Ok(());
    }

    let conns = cx.conns.list(Some(group.conn_ids.clone()), false, true).await?;
    for conn in &conns {
        if conn.config.as_ref().is_some_and(|cfg| cfg.kind == ConnKind::Rx) {
            return Err(AgentError::Incompatible("rx conn already linked in group".into()));
        }
    }

    let bridges = cx.bridges.list(Some(group.bridge_ids.clone()), false, true).await?;
    for bridge in &bridges {
        if bridge.config.as_ref().is_some_and(|cfg| cfg.kind == ConnKind::Rx) {
            return Err(AgentError::Incompatible("rx bridge already linked in group".into()));
        }
    }

    Ok(())
}

/// Splits an `ip:port` URN into its parts.
pub fn parse_group_urn(group_urn: &str) -> Result<(String, u16), AgentError> {
    let (ip, port) = group_urn
        .split_once(':')
        .ok_or_else(|| AgentError::InvalidConfig(format!("invalid group urn format: {group_urn}")))?;
    if ip.is_empty() || port.contains(':') {
        return Err(AgentError::InvalidConfig(format!(
            "invalid group urn format: {group_urn}"
        )));
    }
    let port: u16 = port.parse().map_err(|_| {
        AgentError::InvalidConfig(format!("invalid port number in group urn '{group_urn}': {port}"))
    })?;
    Ok((ip.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_parses_ip_port() {
        assert_eq!(parse_group_urn("224.0.0.1:9002").unwrap(), ("224.0.0.1".into(), 9002));
    }

    #[test]
    fn urn_rejects_bad_forms() {
        for bad in ["abc", ":9002", "1.2.3.4:", "1.2.3.4:x", "1.2.3.4:70000", "a:b:c"] {
            assert!(parse_group_urn(bad).is_err(), "{bad}");
        }
    }
}
