//! Background notification dispatch.
//!
//! [`MailDispatcher::dispatch`] never blocks: notifications go onto a
//! bounded queue and a worker task delivers them one at a time. When the
//! queue is full the notification is dropped with a warning.

use std::time::Duration;

use rplwatch_core::{Notification, NotificationSink};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{MailTransport, NotifyError};

/// Queueing front of the notification worker.
///
/// Dropping every dispatcher closes the queue; the worker then finishes
/// what is queued and exits.
#[derive(Debug, Clone)]
pub struct MailDispatcher {
    tx: mpsc::Sender<Notification>,
}

/// Handle on the worker task, used to wait for the queue to drain.
#[derive(Debug)]
pub struct DispatchHandle {
    worker: JoinHandle<usize>,
}

impl MailDispatcher {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn<T: MailTransport>(transport: T, capacity: usize) -> (Self, DispatchHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(deliver(transport, rx));
        (Self { tx }, DispatchHandle { worker })
    }
}

impl NotificationSink for MailDispatcher {
    fn dispatch(&self, notification: Notification) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(subject = %n.subject, "notification queue full, dropping notification");
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(subject = %n.subject, "notification worker gone, dropping notification");
            }
        }
    }
}

impl DispatchHandle {
    /// Wait for the worker to deliver what is queued.
    ///
    /// Only completes once every [`MailDispatcher`] has been dropped.
    /// Returns the number of notifications delivered over the worker's life.
    pub async fn drain(mut self, timeout: Duration) -> Result<usize, NotifyError> {
        match tokio::time::timeout(timeout, &mut self.worker).await {
            Ok(Ok(delivered)) => {
                info!(delivered, "notification queue drained");
                Ok(delivered)
            }
            Ok(Err(e)) => Err(NotifyError::Worker(e.to_string())),
            Err(_) => {
                self.worker.abort();
                Err(NotifyError::DrainTimeout(timeout))
            }
        }
    }
}

async fn deliver<T: MailTransport>(transport: T, mut rx: mpsc::Receiver<Notification>) -> usize {
    let mut delivered = 0;
    while let Some(notification) = rx.recv().await {
        match transport.send(&notification).await {
            Ok(()) => {
                delivered += 1;
                info!(subject = %notification.subject, "notification sent");
            }
            Err(e) => error!(subject = %notification.subject, error = %e, "failed to send notification"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Outbox {
        sent: Arc<Mutex<Vec<String>>>,
        fail_subject: Option<String>,
        delay: Duration,
    }

    #[async_trait]
    impl MailTransport for Outbox {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_subject.as_deref() == Some(notification.subject.as_str()) {
                return Err(NotifyError::Worker("mta unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(notification.subject.clone());
            Ok(())
        }
    }

    fn note(subject: &str) -> Notification {
        Notification {
            subject: subject.to_string(),
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn delivers_in_order_and_drains() {
        let outbox = Outbox::default();
        let (dispatcher, handle) = MailDispatcher::spawn(outbox.clone(), 8);

        dispatcher.dispatch(note("first"));
        dispatcher.dispatch(note("second"));
        drop(dispatcher);

        assert_eq!(handle.drain(Duration::from_secs(5)).await.unwrap(), 2);
        assert_eq!(*outbox.sent.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn failed_delivery_does_not_stop_the_worker() {
        let outbox = Outbox {
            fail_subject: Some("broken".to_string()),
            ..Outbox::default()
        };
        let (dispatcher, handle) = MailDispatcher::spawn(outbox.clone(), 8);

        dispatcher.dispatch(note("broken"));
        dispatcher.dispatch(note("fine"));
        drop(dispatcher);

        assert_eq!(handle.drain(Duration::from_secs(5)).await.unwrap(), 1);
        assert_eq!(*outbox.sent.lock().unwrap(), vec!["fine"]);
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_drops_instead_of_blocking() {
        let outbox = Outbox {
            delay: Duration::from_secs(30),
            ..Outbox::default()
        };
        let (dispatcher, handle) = MailDispatcher::spawn(outbox.clone(), 1);

        // The worker has not been polled yet, so the queue holds only one.
        for i in 0..5 {
            dispatcher.dispatch(note(&format!("n{i}")));
        }
        drop(dispatcher);

        assert_eq!(handle.drain(Duration::from_secs(120)).await.unwrap(), 1);
        assert_eq!(*outbox.sent.lock().unwrap(), vec!["n0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_hits_drain_timeout() {
        let outbox = Outbox {
            delay: Duration::from_secs(600),
            ..Outbox::default()
        };
        let (dispatcher, handle) = MailDispatcher::spawn(outbox, 4);
        dispatcher.dispatch(note("stuck"));
        drop(dispatcher);

        let err = handle.drain(Duration::from_secs(10)).await.unwrap_err();
        assert!(matches!(err, NotifyError::DrainTimeout(_)));
    }
}
