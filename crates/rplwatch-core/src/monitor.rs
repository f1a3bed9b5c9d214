//! One poll cycle: query → classify → ledger → remediate → notify.
//!
//! The `Monitor` owns the fault ledger and the cycle counter. Cycles run
//! strictly one after another on the poll task; nothing else touches
//! either.

use tracing::{debug, error, info, warn};

use crate::FAULT_LOG_TARGET;
use crate::classifier::{Classification, classify};
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::ledger::{CycleCounter, FaultLedger, Observation};
use crate::remediation::RemediationPolicy;
use crate::session::{NotificationSink, ReplicaSession};
use crate::throttle::NotificationThrottle;
use crate::types::Endpoint;

/// Where a fault happened and where it was logged, for human-facing text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    /// The monitored replica.
    pub replica: Endpoint,
    /// Host name of the machine running the monitor.
    pub hostname: String,
    /// Where new fault occurrences are written.
    pub fault_log: String,
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    /// Faults present in this cycle's sample.
    pub faults: usize,
    /// Faults seen for the first time (or at a new position).
    pub new_faults: usize,
    pub notified: bool,
    /// A corrective call hit a transport error.
    pub reconnect: bool,
}

/// What a cycle amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The node is not a replica. Monitoring ends.
    NotEligible,
    /// The status query failed before a sample was produced. The cycle
    /// counter and ledger are untouched.
    QueryFailed { reconnect: bool },
    /// A sample was processed.
    Polled(CycleReport),
}

impl CycleOutcome {
    pub fn reconnect_recommended(&self) -> bool {
        match self {
            CycleOutcome::NotEligible => false,
            CycleOutcome::QueryFailed { reconnect } => *reconnect,
            CycleOutcome::Polled(report) => report.reconnect,
        }
    }
}

/// Fault-tracking state plus the policies applied to it each cycle.
#[derive(Debug)]
pub struct Monitor {
    ledger: FaultLedger,
    counter: CycleCounter,
    policy: RemediationPolicy,
    throttle: NotificationThrottle,
    context: ReportContext,
}

impl Monitor {
    pub fn new(config: &MonitorConfig, context: ReportContext) -> Self {
        Self {
            ledger: FaultLedger::new(config.max_cycle_gap),
            counter: CycleCounter::new(),
            policy: RemediationPolicy::new(config.auto_skip),
            throttle: NotificationThrottle::new(config.reminder_gap, config.auto_skip),
            context,
        }
    }

    pub fn ledger(&self) -> &FaultLedger {
        &self.ledger
    }

    pub fn cycle(&self) -> u64 {
        self.counter.current()
    }

    pub fn context(&self) -> &ReportContext {
        &self.context
    }

    /// Run one cycle against an open session.
    ///
    /// Only internal invariant violations are returned as errors; node
    /// failures are folded into the outcome.
    pub async fn run_cycle<S, N>(&mut self, session: &mut S, sink: &N) -> Result<CycleOutcome, MonitorError>
    where
        S: ReplicaSession + ?Sized,
        N: NotificationSink + ?Sized,
    {
        let sample = match session.replication_status().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, transport = e.is_transport(), "replication status query failed");
                return Ok(CycleOutcome::QueryFailed {
                    reconnect: e.is_transport(),
                });
            }
        };

        let faults = match classify(&sample) {
            Classification::NotEligible => {
                error!(replica = %self.context.replica, "can't find replica status on this instance");
                return Ok(CycleOutcome::NotEligible);
            }
            Classification::Faults(faults) => faults,
        };

        let cycle = self.counter.advance();
        debug!(cycle, faults = faults.len(), "replication status sampled");

        let fault_count = faults.len();
        let mut new_faults = 0;
        for record in faults {
            let line = record.to_string();
            let kind = record.kind;
            if self.ledger.update(record, cycle)? == Observation::New {
                new_faults += 1;
                info!(target: FAULT_LOG_TARGET, "{line}");
                info!(%kind, cycle, fault = %line, "found replication fault");
            }
        }

        let mut reconnect = false;
        for kind in self.ledger.fresh_kinds(cycle) {
            let Some(entry) = self.ledger.get_mut(kind) else {
                return Err(MonitorError::Invariant(format!(
                    "fresh {kind} entry vanished in cycle {cycle}"
                )));
            };
            let outcome = self.policy.remediate(session, entry, &self.context).await;
            debug!(%kind, cycle, ?outcome, "remediation decided");
            reconnect |= outcome.reconnect_recommended();
        }

        let upstream = sample.upstream.resolve_loopback(&self.context.replica.host);
        let notification = self
            .throttle
            .compose(&self.ledger, cycle, &upstream, &self.context);
        let notified = notification.is_some();
        if let Some(notification) = notification {
            debug!(cycle, subject = %notification.subject, "dispatching notification");
            sink.dispatch(notification);
        }

        Ok(CycleOutcome::Polled(CycleReport {
            cycle,
            faults: fault_count,
            new_faults,
            notified,
            reconnect,
        }))
    }
}
