use std::process::ExitStatus;
use std::time::Duration;

/// Errors from notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to talk to {program}: {source}")]
    Pipe {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },

    #[error("notification queue not drained within {0:?}")]
    DrainTimeout(Duration),

    #[error("notification worker failed: {0}")]
    Worker(String),
}
