//! # Readiness latch for the per-proxy command stream.
//!
//! [`ReadinessLatch`] tracks whether a proxy's command stream is attached.
//! A single driver task owns the state: transitions arrive through a
//! blocking [`set`](ReadinessLatch::set), and [`not_ready`](ReadinessLatch::not_ready)
//! returns a future that resolves for as long as the latch is not ready.
//! The intended use is a `select!` arm that lets a command sender bail out
//! immediately when the stream is detached instead of queueing and timing
//! out.
//!
//! The driver exits when its cancellation token fires; a dead latch reads
//! as not ready, so senders against a torn-down proxy fail fast.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Single-consumer readiness signal, selectable while "not ready".
#[derive(Clone)]
pub struct ReadinessLatch {
    tx: mpsc::Sender<bool>,
    state: watch::Receiver<bool>,
}

impl ReadinessLatch {
    /// Creates the latch (initially not ready) and spawns its driver task.
    pub fn spawn(cancel: CancellationToken) -> Self {
        let (tx, mut rx) = mpsc::channel::<bool>(1);
        let (state_tx, state_rx) = watch::channel(false);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = rx.recv() => match next {
                        Some(ready) => {
                            let _ = state_tx.send(ready);
                        }
                        None => break,
                    },
                }
            }
        });

        Self { tx, state: state_rx }
    }

    /// Publishes a new state. Blocks until the driver has applied it, so
    /// a caller observes its own transition; a no-op once the driver has
    /// exited.
    pub async fn set(&self, ready: bool) {
        if self.tx.send(ready).await.is_ok() {
            let mut state = self.state.clone();
            let _ = state.wait_for(|current| *current == ready).await;
        }
    }

    /// Current state without waiting.
    pub fn is_ready(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves immediately while the latch is not ready (or dead); pends
    /// while it is ready. Safe to use as a `select!` arm.
    pub async fn not_ready(&self) {
        let mut state = self.state.clone();
        // Err means the driver is gone, which also counts as not ready.
        let _ = state.wait_for(|ready| !*ready).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn starts_not_ready() {
        let latch = ReadinessLatch::spawn(CancellationToken::new());
        assert!(!latch.is_ready());
        tokio::time::timeout(Duration::from_millis(100), latch.not_ready())
            .await
            .expect("not_ready should resolve while detached");
    }

    #[tokio::test]
    async fn ready_state_suppresses_the_signal() {
        let latch = ReadinessLatch::spawn(CancellationToken::new());
        latch.set(true).await;
        // Allow the driver to process the transition.
        tokio::task::yield_now().await;
        assert!(latch.is_ready());
        let res = tokio::time::timeout(Duration::from_millis(50), latch.not_ready()).await;
        assert!(res.is_err(), "not_ready must pend while ready");

        latch.set(false).await;
        tokio::time::timeout(Duration::from_millis(100), latch.not_ready())
            .await
            .expect("not_ready should fire again after detach");
    }

    #[tokio::test]
    async fn cancelled_driver_reads_as_not_ready() {
        let cancel = CancellationToken::new();
        let latch = ReadinessLatch::spawn(cancel.clone());
        latch.set(true).await;
        tokio::task::yield_now().await;
        cancel.cancel();
        tokio::task::yield_now().await;
        tokio::time::timeout(Duration::from_millis(100), latch.not_ready())
            .await
            .expect("dead latch counts as not ready");
    }
}
