//! Typed registry of local connections.

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::model::Connection;
use crate::registry::kernel::{EntityHandler, ReadFlags, RegistryKernel};

struct ConnHandler;

impl EntityHandler for ConnHandler {
    type Item = Connection;

    fn project(&self, id: &str, item: &Connection, flags: ReadFlags) -> Connection {
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

/// Single-writer store of [`Connection`] entities.
#[derive(Clone)]
pub struct ConnRegistry {
    kernel: RegistryKernel<Connection>,
}

impl ConnRegistry {
    pub fn spawn(queue_capacity: usize, cancel: CancellationToken) -> Self {
        Self {
            kernel: RegistryKernel::spawn(ConnHandler, queue_capacity, cancel),
        }
    }

    pub async fn list(
        &self,
        filter_ids: Option<Vec<String>>,
        add_status: bool,
        add_config: bool,
    ) -> Result<Vec<Connection>, AgentError> {
        self.kernel
            .read_many(filter_ids, ReadFlags { status: add_status, config: add_config })
            .await
    }

    pub async fn get(&self, id: &str, add_config: bool) -> Result<Connection, AgentError> {
        self.kernel
            .read_one(id, ReadFlags { status: true, config: add_config })
            .await
    }

    pub async fn add(&self, conn: Connection) -> Result<String, AgentError> {
        self.kernel.add_one(None, conn).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), AgentError> {
        self.kernel.delete_one(id).await
    }

    /// Points the connection at its group; idempotent.
    pub async fn update_link_group(&self, id: &str, group_id: &str) -> Result<(), AgentError> {
        let group_id = group_id.to_string();
        self.kernel
            .update_one(id, move |conn| {
                conn.group_id = group_id;
                Ok(())
            })
            .await
    }

    pub async fn update_unlink_group(&self, id: &str) -> Result<(), AgentError> {
        self.update_link_group(id, "").await
    }
}
