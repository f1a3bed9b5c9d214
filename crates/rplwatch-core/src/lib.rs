//! rplwatch-core — fault tracking and remediation for MySQL replicas.
//!
//! Turns raw replication status samples into classified faults, remembers
//! them across poll cycles, decides when to auto-remediate and when to
//! notify an operator. Connection, query and mail transport are injected
//! through the traits in [`session`].
//!
//! # Architecture
//!
//! ```text
//! Supervisor (connect / poll / backoff state machine)
//!   └── Monitor::run_cycle()
//!       ├── ReplicaSession::replication_status() → StatusSample
//!       ├── classify() → Vec<FaultRecord>
//!       ├── FaultLedger::update() (new / continuing / stale)
//!       ├── RemediationPolicy::remediate() (skip + resume apply faults)
//!       └── NotificationThrottle::compose() → NotificationSink::dispatch()
//! ```
//!
//! The ledger and cycle counter are owned by the poll task; nothing else
//! mutates them. Notifications leave the poll task through a non-blocking
//! sink so mail latency never delays the next poll.

pub mod classifier;
pub mod config;
pub mod error;
pub mod ledger;
pub mod monitor;
pub mod node;
pub mod remediation;
pub mod session;
pub mod supervisor;
pub mod throttle;
pub mod types;

pub use classifier::{Classification, classify};
pub use config::MonitorConfig;
pub use error::{ConfigError, MonitorError, SessionError, SessionErrorKind};
pub use ledger::{CycleCounter, FaultLedger, LedgerEntry, Observation};
pub use monitor::{CycleOutcome, CycleReport, Monitor, ReportContext};
pub use node::NodeIdentity;
pub use remediation::{RemediationOutcome, RemediationPolicy};
pub use session::{NotificationSink, ReplicaConnector, ReplicaSession};
pub use supervisor::{StopReason, Supervisor, SupervisorState};
pub use throttle::{Notification, NotificationThrottle};
pub use types::{ChannelStatus, Endpoint, FaultKind, FaultRecord, LogPosition, StatusSample};

/// Tracing target for the fault log. Events on this target carry one line
/// per new fault occurrence and are routed to their own sink.
pub const FAULT_LOG_TARGET: &str = "rplwatch::fault";
