//! # Registry kernel: generic single-writer store.
//!
//! One task per registry owns an id→entity map plus an insertion-ordered
//! id list; every read and mutation travels through a bounded request
//! queue and returns over a per-request one-shot channel. Callers never
//! touch the maps, which removes data races by construction.
//!
//! ```text
//! callers ──► [queue: 100] ──► worker task
//!                                ├─ items:       HashMap<id, T>
//!                                ├─ ordered_ids: Vec<id>
//!                                └─ handler:     projection + delete hook
//! ```
//!
//! Type-specific behavior is delegated to an [`EntityHandler`]: how to
//! project an entity for a read (deep copies, field hiding) and what side
//! effects a delete carries.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AgentError;

/// Which optional projections a read should attach.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadFlags {
    pub status: bool,
    pub config: bool,
}

impl ReadFlags {
    pub fn all() -> Self {
        Self { status: true, config: true }
    }
}

/// Type-specific half of a registry.
pub trait EntityHandler: Send + 'static {
    type Item: Clone + Send + 'static;

    /// Returns the copy of `item` a reader receives: id stamped in, status
    /// and config attached or stripped per `flags`, id lists deep-copied.
    fn project(&self, id: &str, item: &Self::Item, flags: ReadFlags) -> Self::Item;

    /// Side effects of deletion, run by the worker before removal.
    fn on_delete(&self, _item: &Self::Item) {}
}

type UpdateFn<T> = Box<dyn FnOnce(&mut T) -> Result<(), AgentError> + Send>;

enum Request<T> {
    ReadMany {
        ids: Option<Vec<String>>,
        flags: ReadFlags,
        reply: oneshot::Sender<Vec<T>>,
    },
    ReadOne {
        id: String,
        flags: ReadFlags,
        reply: oneshot::Sender<Result<T, AgentError>>,
    },
    AddOne {
        id: Option<String>,
        data: T,
        reply: oneshot::Sender<Result<String, AgentError>>,
    },
    UpdateOne {
        id: String,
        update: UpdateFn<T>,
        reply: oneshot::Sender<Result<(), AgentError>>,
    },
    DeleteOne {
        id: String,
        reply: oneshot::Sender<Result<(), AgentError>>,
    },
}

/// Handle to a registry worker. Cheap to clone.
pub struct RegistryKernel<T> {
    tx: mpsc::Sender<Request<T>>,
}

impl<T> Clone for RegistryKernel<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Clone + Send + 'static> RegistryKernel<T> {
    /// Spawns the single-writer worker and returns its handle.
    pub fn spawn<H>(handler: H, capacity: usize, cancel: CancellationToken) -> Self
    where
        H: EntityHandler<Item = T>,
    {
        let (tx, mut rx) = mpsc::channel::<Request<T>>(capacity);

        tokio::spawn(async move {
            let mut items: HashMap<String, T> = HashMap::new();
            let mut ordered_ids: Vec<String> = Vec::new();

            loop {
                let req = tokio::select! {
                    _ = cancel.cancelled() => break,
                    req = rx.recv() => match req {
                        Some(req) => req,
                        None => break,
                    },
                };

                match req {
                    Request::ReadMany { ids, flags, reply } => {
                        let ids = ids.as_deref().unwrap_or(&ordered_ids);
                        let out = ids
                            .iter()
                            .filter_map(|id| items.get(id).map(|item| handler.project(id, item, flags)))
                            .collect();
                        let _ = reply.send(out);
                    }
                    Request::ReadOne { id, flags, reply } => {
                        let out = items
                            .get(&id)
                            .map(|item| handler.project(&id, item, flags))
                            .ok_or(AgentError::ResourceNotFound);
                        let _ = reply.send(out);
                    }
                    Request::AddOne { id, data, reply } => {
                        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
                        let out = if items.contains_key(&id) {
                            Err(AgentError::IdExists(id))
                        } else {
                            items.insert(id.clone(), data);
                            ordered_ids.push(id.clone());
                            Ok(id)
                        };
                        let _ = reply.send(out);
                    }
                    Request::UpdateOne { id, update, reply } => {
                        let out = match items.get(&id) {
                            None => Err(AgentError::ResourceNotFound),
                            Some(item) => {
                                // Mutate a copy so a failed transform leaves
                                // the stored entity untouched.
                                let mut next = item.clone();
                                match update(&mut next) {
                                    Ok(()) => {
                                        items.insert(id, next);
                                        Ok(())
                                    }
                                    Err(err) => Err(err),
                                }
                            }
                        };
                        let _ = reply.send(out);
                    }
                    Request::DeleteOne { id, reply } => {
                        let out = match items.remove(&id) {
                            None => Err(AgentError::ResourceNotFound),
                            Some(item) => {
                                handler.on_delete(&item);
                                ordered_ids.retain(|v| v != &id);
                                Ok(())
                            }
                        };
                        let _ = reply.send(out);
                    }
                }
            }
        });

        Self { tx }
    }

    async fn exec<R>(
        &self,
        req: Request<T>,
        rx: oneshot::Receiver<R>,
    ) -> Result<R, AgentError> {
        self.tx.send(req).await.map_err(|_| AgentError::Cancelled)?;
        rx.await.map_err(|_| AgentError::Cancelled)
    }

    /// Lists entities; `ids: None` means all, in insertion order.
    pub async fn read_many(&self, ids: Option<Vec<String>>, flags: ReadFlags) -> Result<Vec<T>, AgentError> {
        let (tx, rx) = oneshot::channel();
        self.exec(Request::ReadMany { ids, flags, reply: tx }, rx).await
    }

    pub async fn read_one(&self, id: &str, flags: ReadFlags) -> Result<T, AgentError> {
        let (tx, rx) = oneshot::channel();
        self.exec(Request::ReadOne { id: id.to_string(), flags, reply: tx }, rx)
            .await?
    }

    /// Adds an entity; a `None` id gets a fresh UUID, a supplied id that
    /// already exists fails.
    pub async fn add_one(&self, id: Option<String>, data: T) -> Result<String, AgentError> {
        let (tx, rx) = oneshot::channel();
        self.exec(Request::AddOne { id, data, reply: tx }, rx).await?
    }

    /// Applies a transform to one entity under the single writer.
    pub async fn update_one<F>(&self, id: &str, update: F) -> Result<(), AgentError>
    where
        F: FnOnce(&mut T) -> Result<(), AgentError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.exec(
            Request::UpdateOne {
                id: id.to_string(),
                update: Box::new(update),
                reply: tx,
            },
            rx,
        )
        .await?
    }

    pub async fn delete_one(&self, id: &str) -> Result<(), AgentError> {
        let (tx, rx) = oneshot::channel();
        self.exec(Request::DeleteOne { id: id.to_string(), reply: tx }, rx)
            .await?
    }
}
