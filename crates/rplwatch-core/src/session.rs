//! Collaborator traits for the monitored node and the notification outlet.
//!
//! The core never talks to MySQL or a mail transport directly. Real
//! implementations live in `rplwatch-mysql` and `rplwatch-notify`; tests
//! use scripted fakes.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::node::NodeIdentity;
use crate::throttle::Notification;
use crate::types::StatusSample;

/// Opens sessions to the monitored node.
#[async_trait]
pub trait ReplicaConnector: Send + Sync {
    type Session: ReplicaSession;

    /// Establish a new session.
    async fn connect(&self, node: &NodeIdentity) -> Result<Self::Session, SessionError>;
}

/// An open session to the monitored node.
#[async_trait]
pub trait ReplicaSession: Send {
    /// Query and parse the node's replication status.
    async fn replication_status(&mut self) -> Result<StatusSample, SessionError>;

    /// Tell the apply thread to skip the one event it is stuck on.
    async fn skip_one_event(&mut self) -> Result<(), SessionError>;

    /// Restart the apply thread.
    async fn resume_apply(&mut self) -> Result<(), SessionError>;

    /// Whether the session still believes it is connected.
    fn is_connected(&self) -> bool;

    /// Close the session. Idempotent.
    async fn close(&mut self);
}

/// Non-blocking outlet for composed notifications.
///
/// `dispatch` must return without waiting on the transport; delivery
/// failures are the sink's to log.
pub trait NotificationSink: Send + Sync {
    fn dispatch(&self, notification: Notification);
}
