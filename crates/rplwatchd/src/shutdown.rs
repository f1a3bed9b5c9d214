//! Signal handling: SIGINT, SIGTERM, SIGHUP and SIGQUIT all request shutdown.

use std::io;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Installed signal handlers.
pub struct Signals {
    #[cfg(unix)]
    interrupt: Signal,
    #[cfg(unix)]
    terminate: Signal,
    #[cfg(unix)]
    hangup: Signal,
    #[cfg(unix)]
    quit: Signal,
}

impl Signals {
    /// Install the handlers. Fails if the runtime can't register them.
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next shutdown signal and return its name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        let _ = tokio::signal::ctrl_c().await;
        "ctrl-c"
    }

    /// Flip `shutdown` to `true` on the first signal.
    pub fn forward(mut self, shutdown: watch::Sender<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let name = self.recv().await;
            info!(signal = name, "shutdown requested");
            let _ = shutdown.send(true);
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn hangup_requests_shutdown() {
        let signals = Signals::install().unwrap();
        let (tx, mut rx) = watch::channel(false);
        let forwarder = signals.forward(tx);

        let status = tokio::process::Command::new("kill")
            .args(["-HUP", &std::process::id().to_string()])
            .status()
            .await
            .unwrap();
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(*rx.borrow());
        forwarder.await.unwrap();
    }
}
