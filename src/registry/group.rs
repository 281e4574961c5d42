//! Typed registry of multipoint groups.
//!
//! Two things set this registry apart: entries are keyed by the group URN
//! rather than a generated UUID, and it exposes the only external lock in
//! the core — a mutex that check-then-insert sequences hold so that two
//! racing joiners cannot create the same group twice. Every mutation posts
//! the matching group lifecycle event.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::events::{EventBus, EventParams, EventType};
use crate::model::MultipointGroup;
use crate::registry::kernel::{EntityHandler, ReadFlags, RegistryKernel};

struct GroupHandler;

impl EntityHandler for GroupHandler {
    type Item = MultipointGroup;

    fn project(&self, id: &str, item: &MultipointGroup, flags: ReadFlags) -> MultipointGroup {
        let mut out = item.clone();
        out.id = id.to_string();
        if !flags.status {
            out.status = None;
        }
        if !flags.config {
            out.config = None;
        }
        out
    }
}

/// Single-writer store of [`MultipointGroup`] entities, keyed by URN.
#[derive(Clone)]
pub struct MultipointGroupRegistry {
    kernel: RegistryKernel<MultipointGroup>,
    bus: EventBus,
    /// Held across narrow check-then-insert sequences by the `if(...)`
    /// predicates and the link-or-add action.
    pub mx: Arc<Mutex<()>>,
}

impl MultipointGroupRegistry {
    pub fn spawn(queue_capacity: usize, bus: EventBus, cancel: CancellationToken) -> Self {
        Self {
            kernel: RegistryKernel::spawn(GroupHandler, queue_capacity, cancel),
            bus,
            mx: Arc::new(Mutex::new(())),
        }
    }

    fn group_params(group_id: &str) -> EventParams {
        EventParams {
            group_id: Some(group_id.to_string()),
            ..EventParams::default()
        }
    }

    pub async fn list(
        &self,
        filter_ids: Option<Vec<String>>,
        add_status: bool,
        add_config: bool,
    ) -> Result<Vec<MultipointGroup>, AgentError> {
        self.kernel
            .read_many(filter_ids, ReadFlags { status: add_status, config: add_config })
            .await
    }

    pub async fn get(&self, id: &str, add_config: bool) -> Result<MultipointGroup, AgentError> {
        self.kernel
            .read_one(id, ReadFlags { status: true, config: add_config })
            .await
    }

    /// Adds a group under its URN (never a generated id) and announces it.
    pub async fn add(&self, group: MultipointGroup) -> Result<String, AgentError> {
        let id = group.id.clone();
        let id = self.kernel.add_one(Some(id), group).await?;
        let _ = self
            .bus
            .post_async(EventType::OnMultipointGroupAdded, Self::group_params(&id))
            .await;
        Ok(id)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AgentError> {
        self.kernel.delete_one(id).await?;
        let _ = self
            .bus
            .post_async(EventType::OnMultipointGroupDeleted, Self::group_params(id))
            .await;
        Ok(())
    }

    pub async fn update_link_conn(&self, id: &str, conn_id: &str) -> Result<(), AgentError> {
        let conn_id = conn_id.to_string();
        self.kernel
            .update_one(id, move |group| {
                if !group.conn_ids.iter().any(|v| v == &conn_id) {
                    group.conn_ids.push(conn_id);
                }
                Ok(())
            })
            .await?;
        let _ = self
            .bus
            .post_async(EventType::OnMultipointGroupUpdated, Self::group_params(id))
            .await;
        Ok(())
    }

    pub async fn update_unlink_conn(&self, id: &str, conn_id: &str) -> Result<(), AgentError> {
        let conn_id = conn_id.to_string();
        self.kernel
            .update_one(id, move |group| {
                let before = group.conn_ids.len();
                group.conn_ids.retain(|v| v != &conn_id);
                if group.conn_ids.len() == before {
                    return Err(AgentError::ResourceNotFound);
                }
                Ok(())
            })
            .await?;
        let _ = self
            .bus
            .post_async(EventType::OnMultipointGroupUpdated, Self::group_params(id))
            .await;
        Ok(())
    }

    pub async fn update_link_bridge(&self, id: &str, bridge_id: &str) -> Result<(), AgentError> {
        let bridge_id = bridge_id.to_string();
        self.kernel
            .update_one(id, move |group| {
                if !group.bridge_ids.iter().any(|v| v == &bridge_id) {
                    group.bridge_ids.push(bridge_id);
                }
                Ok(())
            })
            .await?;
        let _ = self
            .bus
            .post_async(EventType::OnMultipointGroupUpdated, Self::group_params(id))
            .await;
        Ok(())
    }

    pub async fn update_unlink_bridge(&self, id: &str, bridge_id: &str) -> Result<(), AgentError> {
        let bridge_id = bridge_id.to_string();
        self.kernel
            .update_one(id, move |group| {
                let before = group.bridge_ids.len();
                group.bridge_ids.retain(|v| v != &bridge_id);
                if group.bridge_ids.len() == before {
                    return Err(AgentError::ResourceNotFound);
                }
                Ok(())
            })
            .await?;
        let _ = self
            .bus
            .post_async(EventType::OnMultipointGroupUpdated, Self::group_params(id))
            .await;
        Ok(())
    }
}
