//! Error types for rplwatch.

use std::path::PathBuf;

use thiserror::Error;

/// Whether a failed call to the monitored node is worth a reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The node could not be reached or the connection broke.
    Transport,
    /// The node answered with an error (permission denied, bad syntax, ...).
    /// Reconnecting would just repeat it.
    Store,
}

/// Failure reported by the connection/query layer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::Transport,
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self {
            kind: SessionErrorKind::Store,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind == SessionErrorKind::Transport
    }
}

/// Invalid configuration. Always fatal, raised before polling starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed node identity: '{0}'")]
    MalformedNid(String),

    #[error("port should be a number between 0 and 65535: '{0}'")]
    InvalidPort(String),

    #[error("reminder gap must be at least 1 cycle")]
    ZeroReminderGap,

    #[error("max cycle gap must be at least 1 cycle")]
    ZeroCycleGap,

    #[error("mail transport not found: {}", .0.display())]
    MissingTransport(PathBuf),

    #[error("no mail recipients configured")]
    NoRecipients,

    #[error("unknown log level '{0}' (expected debug|info|warn|error)")]
    LogLevel(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Errors that end a monitor run.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("can't connect to {node}: {source}")]
    Connect {
        node: String,
        #[source]
        source: SessionError,
    },

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
