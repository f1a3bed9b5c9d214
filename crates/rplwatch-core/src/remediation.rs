//! What to do about a fresh fault.
//!
//! Apply faults can be skipped past: the offending event is skipped and
//! the apply thread restarted, in that order. IO faults are left alone;
//! they clear when the upstream becomes reachable or need an operator.

use tracing::{info, warn};

use crate::ledger::LedgerEntry;
use crate::monitor::ReportContext;
use crate::session::ReplicaSession;
use crate::types::FaultKind;

/// Result of one remediation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationOutcome {
    /// Skip and resume both went through.
    Remediated,
    /// Auto-skip is disabled; nothing attempted.
    Disabled,
    /// The fault kind is never remediated automatically.
    ManualOnly,
    /// A corrective call failed. `reconnect` is set for transport failures.
    Failed { reconnect: bool },
}

impl RemediationOutcome {
    pub fn reconnect_recommended(&self) -> bool {
        matches!(self, RemediationOutcome::Failed { reconnect: true })
    }
}

/// Bounded auto-remediation policy.
#[derive(Debug, Clone, Copy)]
pub struct RemediationPolicy {
    auto_skip: bool,
}

impl RemediationPolicy {
    pub fn new(auto_skip: bool) -> Self {
        Self { auto_skip }
    }

    pub fn auto_skip(&self) -> bool {
        self.auto_skip
    }

    /// Act on one fresh ledger entry, recording the outcome in it.
    pub async fn remediate<S>(
        &self,
        session: &mut S,
        entry: &mut LedgerEntry,
        context: &ReportContext,
    ) -> RemediationOutcome
    where
        S: ReplicaSession + ?Sized,
    {
        match entry.kind() {
            FaultKind::Io => {
                if entry.repeat_count() == 0 {
                    warn!(position = %entry.record().position, "IO fault can only be resolved manually or by itself");
                }
                entry.set_remediation(format!(
                    "{} can only be resolved manually or by itself once the upstream is reachable. \
                     This fault was logged to {} on {}.",
                    FaultKind::Io,
                    context.fault_log,
                    context.hostname
                ));
                RemediationOutcome::ManualOnly
            }
            FaultKind::Apply if !self.auto_skip => RemediationOutcome::Disabled,
            FaultKind::Apply => self.skip_and_resume(session, entry).await,
        }
    }

    async fn skip_and_resume<S>(&self, session: &mut S, entry: &mut LedgerEntry) -> RemediationOutcome
    where
        S: ReplicaSession + ?Sized,
    {
        let position = entry.record().position.clone();
        info!(%position, code = entry.record().code, "skipping apply fault");

        if let Err(e) = session.skip_one_event().await {
            let message = format!("trying to skip error but: {e}");
            warn!(%position, error = %e, transport = e.is_transport(), "skip failed");
            entry.set_remediation(message);
            return RemediationOutcome::Failed {
                reconnect: e.is_transport(),
            };
        }

        if let Err(e) = session.resume_apply().await {
            let message = format!("trying to restart apply thread but: {e}, will retry later");
            warn!(%position, error = %e, transport = e.is_transport(), "resume failed");
            entry.set_remediation(message);
            return RemediationOutcome::Failed {
                reconnect: e.is_transport(),
            };
        }

        entry.clear_remediation();
        info!(%position, "apply fault skipped, apply thread resumed");
        RemediationOutcome::Remediated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;
    use crate::ledger::FaultLedger;
    use crate::types::{Endpoint, FaultRecord, LogPosition, StatusSample};
    use async_trait::async_trait;

    /// Session that records corrective calls and fails on request.
    #[derive(Debug, Default)]
    struct RecordingSession {
        calls: Vec<&'static str>,
        skip_error: Option<SessionError>,
        resume_error: Option<SessionError>,
    }

    #[async_trait]
    impl ReplicaSession for RecordingSession {
        async fn replication_status(&mut self) -> Result<StatusSample, SessionError> {
            Ok(StatusSample::not_replica())
        }

        async fn skip_one_event(&mut self) -> Result<(), SessionError> {
            self.calls.push("skip");
            match self.skip_error.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn resume_apply(&mut self) -> Result<(), SessionError> {
            self.calls.push("resume");
            match self.resume_error.take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn close(&mut self) {}
    }

    fn context() -> ReportContext {
        ReportContext {
            replica: Endpoint::new("db-7", 3306),
            hostname: "monitor-1".to_string(),
            fault_log: "/var/log/rplwatch/faults.log".to_string(),
        }
    }

    fn ledger_with(kind: FaultKind) -> FaultLedger {
        let mut ledger = FaultLedger::default();
        ledger
            .update(
                FaultRecord::new(kind, 1062, "Duplicate entry", LogPosition::new("log.000007", 4821)),
                1,
            )
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn apply_fault_is_skipped_then_resumed() {
        let mut session = RecordingSession::default();
        let mut ledger = ledger_with(FaultKind::Apply);
        let entry = ledger.get_mut(FaultKind::Apply).unwrap();

        let outcome = RemediationPolicy::new(true)
            .remediate(&mut session, entry, &context())
            .await;

        assert_eq!(outcome, RemediationOutcome::Remediated);
        assert_eq!(session.calls, vec!["skip", "resume"]);
        assert!(entry.remediation().is_none());
    }

    #[tokio::test]
    async fn io_fault_is_never_remediated() {
        for auto_skip in [true, false] {
            let mut session = RecordingSession::default();
            let mut ledger = ledger_with(FaultKind::Io);
            let entry = ledger.get_mut(FaultKind::Io).unwrap();

            let outcome = RemediationPolicy::new(auto_skip)
                .remediate(&mut session, entry, &context())
                .await;

            assert_eq!(outcome, RemediationOutcome::ManualOnly);
            assert!(session.calls.is_empty());
            let message = entry.remediation().unwrap();
            assert!(message.contains("resolved manually"));
            assert!(message.contains("/var/log/rplwatch/faults.log"));
            assert!(message.contains("monitor-1"));
        }
    }

    #[tokio::test]
    async fn disabled_auto_skip_does_nothing() {
        let mut session = RecordingSession::default();
        let mut ledger = ledger_with(FaultKind::Apply);
        let entry = ledger.get_mut(FaultKind::Apply).unwrap();

        let outcome = RemediationPolicy::new(false)
            .remediate(&mut session, entry, &context())
            .await;

        assert_eq!(outcome, RemediationOutcome::Disabled);
        assert!(session.calls.is_empty());
        assert!(entry.remediation().is_none());
    }

    #[tokio::test]
    async fn store_error_on_skip_records_message_without_reconnect() {
        let mut session = RecordingSession {
            skip_error: Some(SessionError::store("Access denied; you need the SUPER privilege")),
            ..Default::default()
        };
        let mut ledger = ledger_with(FaultKind::Apply);
        let entry = ledger.get_mut(FaultKind::Apply).unwrap();

        let outcome = RemediationPolicy::new(true)
            .remediate(&mut session, entry, &context())
            .await;

        assert_eq!(outcome, RemediationOutcome::Failed { reconnect: false });
        assert!(!outcome.reconnect_recommended());
        // Resume is not attempted after a failed skip.
        assert_eq!(session.calls, vec!["skip"]);
        assert_eq!(
            entry.remediation(),
            Some("trying to skip error but: Access denied; you need the SUPER privilege")
        );
    }

    #[tokio::test]
    async fn transport_error_on_resume_recommends_reconnect() {
        let mut session = RecordingSession {
            resume_error: Some(SessionError::transport("broken pipe")),
            ..Default::default()
        };
        let mut ledger = ledger_with(FaultKind::Apply);
        let entry = ledger.get_mut(FaultKind::Apply).unwrap();

        let outcome = RemediationPolicy::new(true)
            .remediate(&mut session, entry, &context())
            .await;

        assert!(outcome.reconnect_recommended());
        assert_eq!(session.calls, vec!["skip", "resume"]);
        assert!(entry.remediation().unwrap().contains("broken pipe"));
    }
}
