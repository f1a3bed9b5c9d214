//! Poll loop and connection supervisor.
//!
//! ```text
//!              connect fails (sleep retry_interval)
//!                 ┌──────────┐
//!                 ▼          │
//!           ┌──────────────┐ │     not a replica      ┌─────────────┐
//!  start ──▶│ Disconnected │─┘   ┌──────────────────▶│ NotEligible │
//!           └──────────────┘     │                   └─────────────┘
//!             │  ▲               │
//!   connected │  │ transport     │   invariant broken ┌─────────┐
//!             ▼  │ failure       │ ┌─────────────────▶│ Aborted │
//!           ┌──────────────┐─────┘ │                  └─────────┘
//!           │   Polling    │───────┘
//!           └──────────────┘
//!             │  ▲
//!             └──┘ cycle done (sleep poll_interval)
//! ```
//!
//! Connects, cycles and sleeps all race the shutdown channel, so a
//! shutdown request ends the loop even while a call to the node hangs. The
//! session is closed on every exit route.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::monitor::{CycleOutcome, Monitor};
use crate::node::NodeIdentity;
use crate::session::{NotificationSink, ReplicaConnector, ReplicaSession};

/// Connection supervisor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Disconnected,
    Polling,
    /// The node is not a replica. Terminal.
    NotEligible,
    /// A fatal internal error stopped the run. Terminal.
    Aborted,
}

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The node is not a replica.
    NotEligible,
    /// Shutdown was requested.
    Shutdown,
    /// Batch mode finished its single cycle.
    BatchComplete,
}

/// Drives connect → poll → sleep for one monitored node.
pub struct Supervisor<C: ReplicaConnector, N: NotificationSink> {
    connector: C,
    node: NodeIdentity,
    monitor: Monitor,
    sink: N,
    poll_interval: Duration,
    retry_interval: Duration,
    state: SupervisorState,
}

impl<C: ReplicaConnector, N: NotificationSink> Supervisor<C, N> {
    pub fn new(connector: C, node: NodeIdentity, monitor: Monitor, sink: N, config: &MonitorConfig) -> Self {
        Self {
            connector,
            node,
            monitor,
            sink,
            poll_interval: config.poll_interval,
            retry_interval: config.retry_interval,
            state: SupervisorState::Disconnected,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    /// Poll until the node turns out not to be a replica, shutdown is
    /// requested, or an internal error aborts the run.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<StopReason, MonitorError> {
        let node = self.node.address();
        info!(%node, "starting replication monitor");

        let mut session: Option<C::Session> = None;
        let result = loop {
            if *shutdown.borrow() {
                break Ok(StopReason::Shutdown);
            }

            if !session.as_ref().is_some_and(|s| s.is_connected()) {
                if let Some(mut stale) = session.take() {
                    stale.close().await;
                }
                self.state = SupervisorState::Disconnected;
                info!(%node, "connecting");
                let connected = tokio::select! {
                    biased;
                    _ = shutdown_requested(&mut shutdown) => break Ok(StopReason::Shutdown),
                    connected = self.connector.connect(&self.node) => connected,
                };
                match connected {
                    Ok(s) => {
                        info!(%node, "connection established, start monitoring");
                        session = Some(s);
                    }
                    Err(e) => {
                        warn!(%node, error = %e, retry_in = ?self.retry_interval, "can't connect");
                        if !sleep_or_shutdown(self.retry_interval, &mut shutdown).await {
                            break Ok(StopReason::Shutdown);
                        }
                        continue;
                    }
                }
            }

            let Some(active) = session.as_mut() else {
                self.state = SupervisorState::Aborted;
                break Err(MonitorError::Invariant("polling without a session".to_string()));
            };
            self.state = SupervisorState::Polling;

            let outcome = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break Ok(StopReason::Shutdown),
                outcome = self.monitor.run_cycle(active, &self.sink) => outcome,
            };
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(%node, error = %e, "aborting");
                    self.state = SupervisorState::Aborted;
                    break Err(e);
                }
            };

            if outcome == CycleOutcome::NotEligible {
                info!(%node, "node is not eligible for monitoring, stopping");
                self.state = SupervisorState::NotEligible;
                break Ok(StopReason::NotEligible);
            }

            let pause = if outcome.reconnect_recommended() {
                warn!(%node, retry_in = ?self.retry_interval, "dropping connection");
                if let Some(mut broken) = session.take() {
                    broken.close().await;
                }
                self.state = SupervisorState::Disconnected;
                self.retry_interval
            } else {
                self.poll_interval
            };

            if !sleep_or_shutdown(pause, &mut shutdown).await {
                break Ok(StopReason::Shutdown);
            }
        };

        if let Some(mut open) = session.take() {
            open.close().await;
            debug!(%node, "connection closed");
        }
        if matches!(result, Ok(StopReason::Shutdown)) {
            info!(%node, "shutdown requested, monitor stopped");
            self.state = SupervisorState::Disconnected;
        }
        result
    }

    /// Batch mode: one connect, one cycle, no retries. Shutdown abandons
    /// the connect or the cycle in flight.
    pub async fn run_once(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<StopReason, MonitorError> {
        let node = self.node.address();
        let connected = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => {
                info!(%node, "shutdown requested before connecting");
                return Ok(StopReason::Shutdown);
            }
            connected = self.connector.connect(&self.node) => connected,
        };
        let mut session = connected.map_err(|source| {
            self.state = SupervisorState::Aborted;
            MonitorError::Connect {
                node: node.clone(),
                source,
            }
        })?;
        self.state = SupervisorState::Polling;

        let result = tokio::select! {
            biased;
            _ = shutdown_requested(&mut shutdown) => None,
            result = self.monitor.run_cycle(&mut session, &self.sink) => Some(result),
        };
        session.close().await;

        match result {
            None => {
                info!(%node, "shutdown requested, batch cycle abandoned");
                self.state = SupervisorState::Disconnected;
                Ok(StopReason::Shutdown)
            }
            Some(Ok(CycleOutcome::NotEligible)) => {
                self.state = SupervisorState::NotEligible;
                Ok(StopReason::NotEligible)
            }
            Some(Ok(outcome)) => {
                debug!(%node, ?outcome, "batch cycle finished");
                self.state = SupervisorState::Disconnected;
                Ok(StopReason::BatchComplete)
            }
            Some(Err(e)) => {
                self.state = SupervisorState::Aborted;
                Err(e)
            }
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Sleep for `duration` unless shutdown is requested first.
///
/// Returns `false` when the sleep was cut short by shutdown (or the
/// shutdown sender went away).
async fn sleep_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_shutdown() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(sleep_or_shutdown(Duration::from_secs(60), &mut rx).await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_interrupts_sleep() {
        let (tx, mut rx) = watch::channel(false);
        let sleeper = tokio::spawn(async move {
            sleep_or_shutdown(Duration::from_secs(3600), &mut rx).await
        });
        tx.send(true).unwrap();
        assert!(!sleeper.await.unwrap());
    }

    #[tokio::test]
    async fn already_requested_shutdown_skips_sleep() {
        let (_tx, mut rx) = watch::channel(true);
        assert!(!sleep_or_shutdown(Duration::from_secs(3600), &mut rx).await);
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(!sleep_or_shutdown(Duration::from_secs(3600), &mut rx).await);
    }
}
