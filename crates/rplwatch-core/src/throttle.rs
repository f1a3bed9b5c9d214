//! Decides which fresh faults are worth a mail
//! this cycle and batches them into one message.
//!
//! A fault notifies on its first sighting and then once every
//! `reminder_gap` cycles while it persists:
//!
//! ```text
//! repeat_count: 0  1  2  3  4  5  6 ...   (reminder_gap = 3)
//! notify:       ✓  ·  ·  ✓  ·  ·  ✓
//! ```

use std::num::NonZeroU64;

use tracing::debug;

use crate::ledger::{FaultLedger, LedgerEntry};
use crate::monitor::ReportContext;
use crate::types::Endpoint;

/// A composed operator notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Per-kind reminder throttle.
#[derive(Debug, Clone, Copy)]
pub struct NotificationThrottle {
    reminder_gap: NonZeroU64,
    auto_skip: bool,
}

impl NotificationThrottle {
    pub fn new(reminder_gap: NonZeroU64, auto_skip: bool) -> Self {
        Self {
            reminder_gap,
            auto_skip,
        }
    }

    /// Whether `entry` is due for a notification.
    pub fn is_due(&self, entry: &LedgerEntry) -> bool {
        entry.repeat_count() % self.reminder_gap.get() == 0
    }

    /// Compose one notification covering every fresh, due entry of `cycle`.
    ///
    /// Returns `None` when nothing is due.
    pub fn compose(
        &self,
        ledger: &FaultLedger,
        cycle: u64,
        upstream: &Endpoint,
        context: &ReportContext,
    ) -> Option<Notification> {
        let mut sections = String::new();
        for entry in ledger.fresh_entries(cycle) {
            if !self.is_due(entry) {
                debug!(kind = %entry.kind(), repeat_count = entry.repeat_count(), "notification throttled");
                continue;
            }
            sections.push_str(&self.section(entry, context));
        }

        if sections.is_empty() {
            return None;
        }

        let mut body = format!(
            "Error detected on MySQL replication chain {upstream} -> {}\n",
            context.replica
        );
        body.push_str(&sections);
        body.push_str("\n-- \nRegards,\nrplwatch\nDO NOT REPLY DIRECTLY TO THIS EMAIL\n");

        Some(Notification {
            subject: format!("MySQL replication error on [{}]", context.replica),
            body,
        })
    }

    fn section(&self, entry: &LedgerEntry, context: &ReportContext) -> String {
        let outcome = match entry.remediation() {
            Some(status) => status.to_string(),
            None if self.auto_skip => format!(
                "Note: this error was skipped and logged to {} on {}.",
                context.fault_log, context.hostname
            ),
            None => format!(
                "WARNING: this error was logged to {} on {}, but is still blocking \
                 the replication, manual override is required.",
                context.fault_log, context.hostname
            ),
        };
        format!("\n{}:\n  - WARNING: {}\n  - {outcome}\n", entry.kind(), entry.record())
    }
}
