//! # Star-interconnect synthesizer.
//!
//! For every multipoint group spanning more than one proxy, the mesh is a
//! star: the proxy owning the group's single rx participant is the source,
//! every proxy owning a tx connection is a destination. Each
//! (source, destination) pair is realized as two RDMA half-bridges that
//! share one port — an rx half on the destination proxy listening at that
//! port, and a tx half on the source proxy pointing at the destination's
//! RDMA dataplane address.
//!
//! ```text
//!            ┌────────────┐   rdma    ┌────────────┐
//!  rx conn ──│  source P1 │ tx ──► rx │  dest  P2  │── tx conn
//!            │            │           └────────────┘
//!            │            │   rdma    ┌────────────┐
//!            │            │ tx ──► rx │  dest  P3  │── tx conn
//!            └────────────┘           └────────────┘
//! ```
//!
//! The synthesizer is reconciling: it deletes RDMA bridges that no longer
//! belong to any desired pair and creates the missing halves. Desired
//! bridges are modeled as explicit [`BridgePair`] values so the "rx and tx
//! share a port" invariant is structural rather than positional. Re-running
//! against an unchanged topology is a no-op.

use std::collections::HashMap;

use tracing::{error, warn};

use crate::context::AgentContext;
use crate::error::AgentError;
use crate::model::{
    Bridge, BridgeConfig, BridgeRdmaConfig, BridgeTargetConfig, BridgeType, ConnKind,
    ConnectionStatus, MediaProxy, PortMask,
};

/// One desired half-bridge, identified by everything except the port.
#[derive(Clone, Debug, PartialEq, Eq)]
struct HalfBridge {
    group_id: String,
    proxy_id: String,
    kind: ConnKind,
    remote_ip: String,
}

/// One desired (destination rx, source tx) pair sharing a port.
#[derive(Clone, Debug)]
struct BridgePair {
    rx: HalfBridge,
    tx: HalfBridge,
    /// Ids of surviving halves, filled by the reconciliation match.
    existing_rx: Option<String>,
    existing_tx: Option<String>,
    /// Port of the surviving rx half, reused for a re-created tx half.
    existing_port: Option<u16>,
}

/// Reconciles the RDMA bridge set of every group against the desired star
/// topology. Returns `false` (without touching anything) when a snapshot
/// is incomplete.
pub async fn apply_star_interconnect(cx: &AgentContext) -> Result<bool, AgentError> {
    // 1. Snapshot everything; reject snapshots with missing configs.
    let groups = cx.groups.list(None, false, false).await?;
    if groups.is_empty() {
        return Ok(true);
    }
    let conns = cx.conns.list(None, false, true).await?;
    if conns.is_empty() {
        return Ok(true);
    }
    let proxies = cx.proxies.list(None, false, true).await?;
    if proxies.is_empty() {
        return Ok(true);
    }
    let bridges = cx.bridges.list(None, false, true).await?;

    for conn in &conns {
        if conn.config.is_none() {
            error!(id = %conn.id, "star interconnect: conn cfg is nil");
            return Ok(false);
        }
    }
    for proxy in &proxies {
        if proxy.config.is_none() {
            error!(id = %proxy.id, "star interconnect: proxy cfg is nil");
            return Ok(false);
        }
    }
    for bridge in &bridges {
        if bridge.config.is_none() {
            error!(id = %bridge.id, "star interconnect: bridge cfg is nil");
            return Ok(false);
        }
    }

    let conns_by_id: HashMap<&str, &crate::model::Connection> =
        conns.iter().map(|c| (c.id.as_str(), c)).collect();
    let proxies_by_id: HashMap<&str, &MediaProxy> =
        proxies.iter().map(|p| (p.id.as_str(), p)).collect();
    let bridges_by_id: HashMap<&str, &Bridge> =
        bridges.iter().map(|b| (b.id.as_str(), b)).collect();

    // 2. Per proxy, the RDMA rx ports already in use.
    let mut used_ports: HashMap<String, PortMask> = HashMap::new();
    for proxy in &proxies {
        let mut mask = PortMask::default();
        for bridge_id in &proxy.bridge_ids {
            let Some(bridge) = bridges_by_id.get(bridge_id.as_str()) else {
                warn!(proxy_id = %proxy.id, %bridge_id, "star interconnect: proxy bridge id not found");
                continue;
            };
            if let Some(cfg) = &bridge.config {
                if cfg.kind == ConnKind::Rx {
                    if let BridgeTargetConfig::Rdma(rdma) = &cfg.target {
                        mask.set_bit(rdma.port);
                    }
                }
            }
        }
        used_ports.insert(proxy.id.clone(), mask);
    }

    // 3. Resolve source and destinations per group. A group with multiple
    //    rx participants is invalid: skipped, its bridges left alone.
    let mut desired: Vec<BridgePair> = Vec::new();
    let mut invalid_groups: Vec<String> = Vec::new();
    'groups: for group in &groups {
        let mut source_proxy_id: Option<String> = None;
        let mut source_id: Option<&str> = None;

        for conn_id in &group.conn_ids {
            let Some(conn) = conns_by_id.get(conn_id.as_str()) else {
                error!(%conn_id, "star interconnect: conn not found");
                invalid_groups.push(group.id.clone());
                continue 'groups;
            };
            let Some(cfg) = &conn.config else { continue };
            if cfg.kind == ConnKind::Rx {
                if let Some(first) = source_id {
                    error!(
                        group_id = %group.id, %conn_id, first,
                        "star interconnect: multiple sources in group"
                    );
                    invalid_groups.push(group.id.clone());
                    continue 'groups;
                }
                source_id = Some(conn_id.as_str());
                source_proxy_id = Some(conn.proxy_id.clone());
            }
        }

        // Fall back to an ST 2110 rx bridge as the source.
        if source_id.is_none() {
            for bridge_id in &group.bridge_ids {
                let Some(bridge) = bridges_by_id.get(bridge_id.as_str()) else {
                    error!(%bridge_id, "star interconnect: bridge not found");
                    invalid_groups.push(group.id.clone());
                    continue 'groups;
                };
                let Some(cfg) = &bridge.config else { continue };
                if cfg.kind == ConnKind::Rx && cfg.bridge_type() == BridgeType::St2110 {
                    if let Some(first) = source_id {
                        error!(
                            group_id = %group.id, %bridge_id, first,
                            "star interconnect: multiple sources in group"
                        );
                        invalid_groups.push(group.id.clone());
                        continue 'groups;
                    }
                    source_id = Some(bridge_id.as_str());
                    source_proxy_id = Some(bridge.proxy_id.clone());
                }
            }
        }
        let Some(source_proxy_id) = source_proxy_id else {
            continue;
        };

        let mut dest_proxy_ids: Vec<String> = Vec::new();
        for conn_id in &group.conn_ids {
            let Some(conn) = conns_by_id.get(conn_id.as_str()) else { continue };
            let Some(cfg) = &conn.config else { continue };
            if cfg.kind == ConnKind::Tx
                && conn.proxy_id != source_proxy_id
                && !dest_proxy_ids.contains(&conn.proxy_id)
            {
                dest_proxy_ids.push(conn.proxy_id.clone());
            }
        }
        if dest_proxy_ids.is_empty() {
            continue;
        }

        let Some(source_proxy) = proxies_by_id.get(source_proxy_id.as_str()) else {
            error!(proxy_id = %source_proxy_id, "star interconnect: src proxy not found");
            continue;
        };
        let Some(source_cfg) = &source_proxy.config else { continue };

        // 4. Desired pairs for this group.
        for dest_proxy_id in dest_proxy_ids {
            let Some(dest_proxy) = proxies_by_id.get(dest_proxy_id.as_str()) else {
                error!(proxy_id = %dest_proxy_id, "star interconnect: dest proxy not found");
                continue;
            };
            let Some(dest_cfg) = &dest_proxy.config else { continue };

            desired.push(BridgePair {
                rx: HalfBridge {
                    group_id: group.id.clone(),
                    proxy_id: dest_proxy_id.clone(),
                    kind: ConnKind::Rx,
                    remote_ip: source_cfg.rdma.dataplane_ip_addr.clone(),
                },
                tx: HalfBridge {
                    group_id: group.id.clone(),
                    proxy_id: source_proxy_id.clone(),
                    kind: ConnKind::Tx,
                    remote_ip: dest_cfg.rdma.dataplane_ip_addr.clone(),
                },
                existing_rx: None,
                existing_tx: None,
                existing_port: None,
            });
        }
    }

    // 5. Match existing RDMA bridges against the desired pairs; anything
    //    unmatched (outside invalid groups) is stale and gets deleted.
    let mut delete_ids: Vec<String> = Vec::new();
    for bridge in &bridges {
        let Some(cfg) = &bridge.config else { continue };
        let BridgeTargetConfig::Rdma(rdma) = &cfg.target else { continue };
        if invalid_groups.contains(&bridge.group_id) {
            continue;
        }

        let half = HalfBridge {
            group_id: bridge.group_id.clone(),
            proxy_id: bridge.proxy_id.clone(),
            kind: cfg.kind,
            remote_ip: rdma.remote_ip.clone(),
        };

        let mut found = false;
        for pair in desired.iter_mut() {
            if pair.rx == half {
                pair.existing_rx = Some(bridge.id.clone());
                pair.existing_port = Some(rdma.port);
                found = true;
            } else if pair.tx == half {
                pair.existing_tx = Some(bridge.id.clone());
                found = true;
            }
        }
        if !found {
            delete_ids.push(bridge.id.clone());
        }
    }

    for id in &delete_ids {
        if let Err(err) = cx.bridges.delete(id).await {
            error!(%id, err = %err, "star interconnect: error deleting bridge");
        }
        let Some(bridge) = bridges_by_id.get(id.as_str()) else {
            error!(%id, "star interconnect: bridge id not found");
            continue;
        };
        if let Err(err) = cx.proxies.update_unlink_bridge(&bridge.proxy_id, id).await {
            error!(%id, err = %err, "star interconnect: proxy unlink bridge err");
        }
        if let Err(err) = cx.groups.update_unlink_bridge(&bridge.group_id, id).await {
            error!(%id, err = %err, "star interconnect: group unlink bridge err");
        }
    }

    // 6. Create missing halves. A fresh pair allocates one port on the
    //    destination proxy and stamps it on both halves; a pair whose rx
    //    half survived reuses its port.
    for pair in &desired {
        if pair.existing_rx.is_some() && pair.existing_tx.is_some() {
            continue;
        }

        let port = match pair.existing_port {
            Some(port) => port,
            None => {
                let Some(dest_proxy) = proxies_by_id.get(pair.rx.proxy_id.as_str()) else {
                    error!(proxy_id = %pair.rx.proxy_id, "star interconnect: dest proxy id not found");
                    continue;
                };
                let Some(mask) = used_ports.get_mut(&pair.rx.proxy_id) else {
                    error!(proxy_id = %pair.rx.proxy_id, "star interconnect: dest proxy port mask not found");
                    continue;
                };
                match mask.allocate_first_available_port(&dest_proxy.rdma_ports_allowed) {
                    Ok(port) => port,
                    Err(err) => {
                        error!(
                            proxy_id = %pair.rx.proxy_id, err = %err,
                            "star interconnect: dest proxy rdma port err"
                        );
                        continue;
                    }
                }
            }
        };

        if pair.existing_rx.is_none() {
            add_half_bridge(cx, &pair.rx, port).await;
        }
        if pair.existing_tx.is_none() {
            add_half_bridge(cx, &pair.tx, port).await;
        }
    }

    Ok(true)
}

async fn add_half_bridge(cx: &AgentContext, half: &HalfBridge, port: u16) {
    let group_payload = match cx.groups.get(&half.group_id, true).await {
        Ok(group) => group.config,
        Err(_) => None,
    };

    let bridge = Bridge {
        proxy_id: half.proxy_id.clone(),
        group_id: half.group_id.clone(),
        config: Some(BridgeConfig {
            kind: half.kind,
            target: BridgeTargetConfig::Rdma(BridgeRdmaConfig {
                remote_ip: half.remote_ip.clone(),
                port,
            }),
            sdk: group_payload,
        }),
        status: Some(ConnectionStatus::active_now()),
        ..Bridge::default()
    };

    let id = match cx.bridges.add(bridge).await {
        Ok(id) => id,
        Err(err) => {
            error!(err = %err, ?half, "star interconnect: error adding new bridge");
            return;
        }
    };
    if let Err(err) = cx.proxies.update_link_bridge(&half.proxy_id, &id).await {
        error!(err = %err, ?half, "star interconnect: error updating proxy link bridge");
        return;
    }
    if let Err(err) = cx.groups.update_link_bridge(&half.group_id, &id).await {
        error!(err = %err, ?half, "star interconnect: error updating group link bridge");
    }
}
