//! # Event bus: a bounded FIFO with exactly one consumer.
//!
//! Producers post typed events; the rule engine drains them strictly in
//! enqueue order. [`EventBus::post_sync`] attaches a one-shot reply channel
//! and blocks the caller (and, by the ordering contract, every later
//! event) until the handler returns or the 20 s deadline fires.
//! Asynchronous posts from within a handler are fine: they land behind
//! whatever is already queued.
//!
//! Dropping the consumer (bus shutdown) fails in-flight sync waits with a
//! cancellation error.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::error::AgentError;
use crate::events::event::{ActionCtx, Event, EventParams, EventType};

/// Posting half of the bus. Cheap to clone; all clones feed one queue.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
    sync_timeout: Duration,
}

/// Consuming half, owned by the rule engine.
pub struct EventStream {
    rx: mpsc::Receiver<Event>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl EventBus {
    /// Creates the bus with the given queue capacity and sync deadline.
    pub fn new(capacity: usize, sync_timeout: Duration) -> (EventBus, EventStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventBus { tx, sync_timeout }, EventStream { rx })
    }

    /// Enqueues an event without waiting for its handler. Blocks only while
    /// the queue is at capacity.
    pub async fn post_async(&self, event_type: EventType, params: EventParams) -> Result<(), AgentError> {
        self.tx
            .send(Event {
                event_type,
                params,
                sync_reply: None,
            })
            .await
            .map_err(|_| AgentError::Cancelled)
    }

    /// Enqueues an event and waits for the handler's final context, up to
    /// the sync deadline.
    pub async fn post_sync(&self, event_type: EventType, params: EventParams) -> Result<ActionCtx, AgentError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Event {
                event_type,
                params,
                sync_reply: Some(reply_tx),
            })
            .await
            .map_err(|_| AgentError::Cancelled)?;

        match tokio::time::timeout(self.sync_timeout, reply_rx).await {
            Ok(Ok(ctx)) => Ok(ctx),
            Ok(Err(_)) => Err(AgentError::Cancelled),
            Err(_) => Err(AgentError::Timeout(self.sync_timeout)),
        }
    }
}
