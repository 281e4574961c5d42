//! # Agent runtime: construction, startup and shutdown.
//!
//! [`Agent::start`] builds every owner object — the four registries, the
//! event bus, the apply-config worker, the rule engine — and spawns their
//! tasks under one cancellation root. [`Agent::run`] additionally binds
//! the REST surface and blocks until a shutdown signal, then cancels the
//! root so the whole tree tears down.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::rest::run_rest_server;
use crate::config::AgentConfig;
use crate::context::AgentContext;
use crate::error::AgentError;
use crate::events::EventBus;
use crate::logic::{ActionRegistry, LogicController, Manifest, DEFAULT_MANIFEST};
use crate::mesh::{run_apply_worker, ApplyConfigQueue};
use crate::model::CommandRouter;
use crate::registry::{BridgeRegistry, ConnRegistry, MediaProxyRegistry, MultipointGroupRegistry};
use crate::telemetry::TelemetrySink;

/// The assembled control plane.
pub struct Agent {
    cfg: AgentConfig,
}

impl Agent {
    pub fn new(cfg: AgentConfig) -> Self {
        Self { cfg }
    }

    /// Builds and starts the core (registries, bus, rule engine, apply
    /// worker) without any network surface. Used by the binary and by
    /// integration tests that drive the service layer directly.
    pub fn start(cfg: AgentConfig, root: CancellationToken) -> Result<Arc<AgentContext>, AgentError> {
        let actions = ActionRegistry::builtin();
        let manifest = Manifest::parse(DEFAULT_MANIFEST, &actions)?;
        Self::start_with_manifest(cfg, root, manifest, actions)
    }

    /// Same as [`Agent::start`] with a caller-supplied manifest and action
    /// set.
    pub fn start_with_manifest(
        cfg: AgentConfig,
        root: CancellationToken,
        manifest: Manifest,
        actions: ActionRegistry,
    ) -> Result<Arc<AgentContext>, AgentError> {
        let (bus, stream) = EventBus::new(cfg.event_queue_capacity, cfg.event_timeout);
        let (apply, apply_rx) = ApplyConfigQueue::new(cfg.apply_queue_capacity);
        let router = Arc::new(CommandRouter::new());

        let cx = Arc::new(AgentContext {
            proxies: MediaProxyRegistry::spawn(cfg.registry_queue_capacity, root.child_token()),
            conns: ConnRegistry::spawn(cfg.registry_queue_capacity, root.child_token()),
            groups: MultipointGroupRegistry::spawn(
                cfg.registry_queue_capacity,
                bus.clone(),
                root.child_token(),
            ),
            bridges: BridgeRegistry::spawn(cfg.registry_queue_capacity, root.child_token()),
            bus,
            apply,
            router,
            telemetry: TelemetrySink::new(),
            root: root.clone(),
            cfg,
        });

        LogicController::new(manifest, actions).spawn(cx.clone(), stream, root.child_token());
        tokio::spawn(run_apply_worker(cx.clone(), apply_rx, root.child_token()));

        Ok(cx)
    }

    /// Runs the agent until SIGINT/SIGTERM.
    pub async fn run(self) -> Result<(), AgentError> {
        info!("mesh control plane agent started");

        let root = CancellationToken::new();
        let cx = Agent::start(self.cfg, root.clone())?;

        let rest = tokio::spawn(run_rest_server(cx.clone(), root.child_token()));

        shutdown_signal().await;
        info!("shutdown signal received");
        root.cancel();

        let _ = rest.await;
        info!("mesh control plane agent exited gracefully");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = term.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
