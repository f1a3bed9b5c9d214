//! rplwatch-notify — delivering operator notifications.
//!
//! The core hands composed [`rplwatch_core::Notification`]s to a
//! [`MailDispatcher`], which queues them for a background worker so the
//! poll loop never waits on the MTA. The worker delivers through a
//! [`MailTransport`]; [`SendmailTransport`] pipes the message into a local
//! sendmail-compatible command.

pub mod dispatcher;
pub mod error;
pub mod sendmail;

use async_trait::async_trait;
use rplwatch_core::Notification;

pub use dispatcher::{DispatchHandle, MailDispatcher};
pub use error::NotifyError;
pub use sendmail::{SendmailTransport, parse_recipients};

/// Delivers one notification.
#[async_trait]
pub trait MailTransport: Send + Sync + 'static {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}
