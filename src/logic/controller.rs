//! # Rule engine: the single consumer of the event bus.
//!
//! For each received event the controller walks the manifest's action
//! trees for that event type. The walk is iterative over an explicit
//! stack; after each action exactly one branch is selected:
//!
//! - `Err`      → `on_false` (the manifest's `error`, falling back to `false`)
//! - `Ok(true)` → `on_true`  (`success`, falling back to `true`)
//! - `Ok(false)`→ `on_false`
//!
//! The chain context threads through the whole walk. When several
//! manifest entries match one event, each starts from a fresh context and
//! the first entry's final context becomes the synchronous reply.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::context::AgentContext;
use crate::events::{ActionCtx, Event, EventStream};
use crate::logic::actions::ActionRegistry;
use crate::logic::manifest::{ActionNode, Manifest};

/// Interprets the manifest against incoming events.
pub struct LogicController {
    manifest: Manifest,
    actions: ActionRegistry,
}

impl LogicController {
    pub fn new(manifest: Manifest, actions: ActionRegistry) -> Self {
        Self { manifest, actions }
    }

    /// Spawns the consumer loop. It drains the bus strictly in order and
    /// answers sync posters with the first matching chain's context.
    pub fn spawn(
        self,
        cx: Arc<AgentContext>,
        mut stream: EventStream,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = stream.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                self.handle_event(&cx, event).await;
            }
        })
    }

    async fn handle_event(&self, cx: &AgentContext, event: Event) {
        info!("[EVT] {} {}", event.event_type, event.params);

        let mut first_out: Option<ActionCtx> = None;
        for entry in &self.manifest.events {
            if entry.event_type != event.event_type {
                continue;
            }
            let out = self.run_chain(cx, &event, &entry.actions).await;
            if first_out.is_none() {
                first_out = Some(out);
            }
        }

        if let Some(reply) = event.sync_reply {
            let _ = reply.send(first_out.unwrap_or_default());
        }
    }

    async fn run_chain(&self, cx: &AgentContext, event: &Event, nodes: &[ActionNode]) -> ActionCtx {
        let mut ctx = ActionCtx::default();
        let mut stack: Vec<(&[ActionNode], usize)> = vec![(nodes, 0)];

        while let Some(frame) = stack.last_mut() {
            let (nodes, index) = *frame;
            if index >= nodes.len() {
                stack.pop();
                continue;
            }
            frame.1 += 1;
            let node = &nodes[index];

            let Some(action) = self.actions.get(&node.name) else {
                continue;
            };
            info!("[ACT] {}", node.name);

            let branch = match action.perform(cx, &mut ctx, &node.modifier, &event.params).await {
                Err(err) => {
                    error!("action err ({}): {}", node.name, err);
                    &node.on_false
                }
                Ok(true) => {
                    info!("[ACT] {} (=Success/True)", node.name);
                    &node.on_true
                }
                Ok(false) => {
                    info!("[ACT] {} (=Error/False)", node.name);
                    &node.on_false
                }
            };
            if !branch.is_empty() {
                stack.push((branch, 0));
            }
        }

        ctx
    }
}
