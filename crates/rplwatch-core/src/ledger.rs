//! Fault ledger: per-kind memory of the latest fault occurrence.
//!
//! Each poll cycle the ledger is told which faults were observed. It
//! decides whether an observation is a **new** occurrence (first sighting,
//! a different stall position, or a gap in observation) or a
//! **continuation** of the fault already on record, and counts how many
//! consecutive cycles a continuation has persisted. Kinds that were not
//! observed this cycle are left alone and become **stale**: their
//! `last_seen` falls behind the cycle counter.

use std::collections::BTreeMap;
use std::num::NonZeroU64;

use tracing::debug;

use crate::error::MonitorError;
use crate::types::{FaultKind, FaultRecord};

/// Monotonic count of successfully parsed replica samples.
///
/// Connection failures, query failures and not-a-replica samples never
/// advance it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleCounter(u64);

impl CycleCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Start the next cycle and return its number (first cycle is 1).
    pub fn advance(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    pub fn current(&self) -> u64 {
        self.0
    }
}

/// How the ledger interpreted an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    New,
    Continuing,
}

/// Ledger state for one fault kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    last_seen: u64,
    record: FaultRecord,
    repeat_count: u64,
    remediation: Option<String>,
}

impl LedgerEntry {
    fn new(record: FaultRecord, cycle: u64) -> Self {
        Self {
            last_seen: cycle,
            record,
            repeat_count: 0,
            remediation: None,
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.record.kind
    }

    pub fn record(&self) -> &FaultRecord {
        &self.record
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// Consecutive cycles this exact fault persisted after its first sighting.
    pub fn repeat_count(&self) -> u64 {
        self.repeat_count
    }

    /// Outcome of the latest remediation attempt, if it needs reporting.
    pub fn remediation(&self) -> Option<&str> {
        self.remediation.as_deref()
    }

    pub fn set_remediation(&mut self, message: impl Into<String>) {
        self.remediation = Some(message.into());
    }

    pub fn clear_remediation(&mut self) {
        self.remediation = None;
    }

    pub fn is_fresh(&self, cycle: u64) -> bool {
        self.last_seen == cycle
    }
}

/// Per-kind fault memory, owned by the poll task.
#[derive(Debug, Clone)]
pub struct FaultLedger {
    entries: BTreeMap<FaultKind, LedgerEntry>,
    /// Observations further apart than this are never continuations.
    max_gap: u64,
}

impl Default for FaultLedger {
    fn default() -> Self {
        Self::new(NonZeroU64::MIN)
    }
}

impl FaultLedger {
    pub fn new(max_gap: NonZeroU64) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_gap: max_gap.get(),
        }
    }

    /// Record that `record` was observed in `cycle`.
    ///
    /// Each kind may be updated at most once per cycle, with cycles in
    /// increasing order; anything else is an invariant violation.
    pub fn update(&mut self, record: FaultRecord, cycle: u64) -> Result<Observation, MonitorError> {
        let kind = record.kind;
        let Some(entry) = self.entries.get_mut(&kind) else {
            debug!(%kind, cycle, position = %record.position, "first occurrence of fault kind");
            self.entries.insert(kind, LedgerEntry::new(record, cycle));
            return Ok(Observation::New);
        };

        if cycle <= entry.last_seen {
            return Err(MonitorError::Invariant(format!(
                "{kind} updated for cycle {cycle} after cycle {}",
                entry.last_seen
            )));
        }

        let gap = cycle - entry.last_seen;
        let observation = if gap > self.max_gap || record.position != entry.record.position {
            debug!(
                %kind,
                cycle,
                gap,
                previous = %entry.record.position,
                position = %record.position,
                "new fault occurrence"
            );
            entry.record = record;
            entry.repeat_count = 0;
            entry.remediation = None;
            Observation::New
        } else {
            entry.repeat_count += 1;
            debug!(%kind, cycle, repeat_count = entry.repeat_count, "fault persists");
            Observation::Continuing
        };

        entry.last_seen = cycle;
        Ok(observation)
    }

    /// Whether `kind` was observed in `cycle` (as opposed to carried over).
    pub fn is_fresh(&self, kind: FaultKind, cycle: u64) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|entry| entry.is_fresh(cycle))
    }

    pub fn get(&self, kind: FaultKind) -> Option<&LedgerEntry> {
        self.entries.get(&kind)
    }

    pub fn get_mut(&mut self, kind: FaultKind) -> Option<&mut LedgerEntry> {
        self.entries.get_mut(&kind)
    }

    /// Kinds observed in `cycle`, in `FaultKind` order.
    pub fn fresh_kinds(&self, cycle: u64) -> Vec<FaultKind> {
        self.fresh_entries(cycle).map(LedgerEntry::kind).collect()
    }

    /// Entries observed in `cycle`, in `FaultKind` order.
    pub fn fresh_entries(&self, cycle: u64) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.values().filter(move |entry| entry.is_fresh(cycle))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogPosition;

    fn apply_at(offset: u64) -> FaultRecord {
        FaultRecord::new(
            FaultKind::Apply,
            1062,
            "Duplicate entry",
            LogPosition::new("log.000007", offset),
        )
    }

    fn io_at(offset: u64) -> FaultRecord {
        FaultRecord::new(
            FaultKind::Io,
            2003,
            "error connecting to master",
            LogPosition::new("log.000009", offset),
        )
    }

    #[test]
    fn counter_starts_at_zero_and_advances() {
        let mut counter = CycleCounter::new();
        assert_eq!(counter.current(), 0);
        assert_eq!(counter.advance(), 1);
        assert_eq!(counter.advance(), 2);
        assert_eq!(counter.current(), 2);
    }

    #[test]
    fn first_observation_creates_entry() {
        let mut ledger = FaultLedger::default();
        assert!(ledger.is_empty());

        let obs = ledger.update(apply_at(4821), 1).unwrap();
        assert_eq!(obs, Observation::New);

        let entry = ledger.get(FaultKind::Apply).unwrap();
        assert_eq!(entry.repeat_count(), 0);
        assert_eq!(entry.last_seen(), 1);
        assert!(entry.remediation().is_none());
        assert!(ledger.is_fresh(FaultKind::Apply, 1));
    }

    #[test]
    fn repeat_count_increments_on_consecutive_cycles() {
        let mut ledger = FaultLedger::default();
        for cycle in 1..=5 {
            ledger.update(apply_at(4821), cycle).unwrap();
            assert_eq!(
                ledger.get(FaultKind::Apply).unwrap().repeat_count(),
                cycle - 1
            );
        }
    }

    #[test]
    fn position_change_resets_repeat_count() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 1).unwrap();
        ledger.update(apply_at(4821), 2).unwrap();
        assert_eq!(ledger.get(FaultKind::Apply).unwrap().repeat_count(), 1);

        let obs = ledger.update(apply_at(5100), 3).unwrap();
        assert_eq!(obs, Observation::New);
        let entry = ledger.get(FaultKind::Apply).unwrap();
        assert_eq!(entry.repeat_count(), 0);
        assert_eq!(entry.record().position.offset, 5100);
    }

    #[test]
    fn log_file_change_is_a_new_position() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 1).unwrap();
        let moved = FaultRecord::new(
            FaultKind::Apply,
            1062,
            "Duplicate entry",
            LogPosition::new("log.000008", 4821),
        );
        assert_eq!(ledger.update(moved, 2).unwrap(), Observation::New);
    }

    #[test]
    fn message_change_alone_is_a_continuation() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 1).unwrap();
        let reworded = FaultRecord::new(
            FaultKind::Apply,
            1062,
            "Duplicate entry (retry 2)",
            LogPosition::new("log.000007", 4821),
        );
        assert_eq!(ledger.update(reworded, 2).unwrap(), Observation::Continuing);
        // Identity fields stay as first recorded.
        assert_eq!(
            ledger.get(FaultKind::Apply).unwrap().record().message,
            "Duplicate entry"
        );
    }

    #[test]
    fn absent_kind_goes_stale() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 1).unwrap();
        ledger.update(io_at(4), 1).unwrap();

        // Cycle 2 only sees the IO fault.
        ledger.update(io_at(4), 2).unwrap();

        let apply = ledger.get(FaultKind::Apply).unwrap();
        assert_eq!(apply.last_seen(), 1);
        assert!(!ledger.is_fresh(FaultKind::Apply, 2));
        assert!(ledger.is_fresh(FaultKind::Io, 2));
        assert_eq!(ledger.fresh_kinds(2), vec![FaultKind::Io]);
    }

    #[test]
    fn gap_in_observation_starts_new_occurrence() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 1).unwrap();
        ledger.update(apply_at(4821), 2).unwrap();
        // Not seen in cycle 3; same position again in cycle 4.
        let obs = ledger.update(apply_at(4821), 4).unwrap();
        assert_eq!(obs, Observation::New);
        assert_eq!(ledger.get(FaultKind::Apply).unwrap().repeat_count(), 0);
    }

    #[test]
    fn wider_gap_tolerance_bridges_missed_cycles() {
        let mut ledger = FaultLedger::new(NonZeroU64::new(2).unwrap());
        ledger.update(apply_at(4821), 1).unwrap();
        assert_eq!(
            ledger.update(apply_at(4821), 3).unwrap(),
            Observation::Continuing
        );
        assert_eq!(ledger.get(FaultKind::Apply).unwrap().repeat_count(), 1);
        assert_eq!(ledger.update(apply_at(4821), 6).unwrap(), Observation::New);
    }

    #[test]
    fn new_occurrence_clears_remediation_message() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 1).unwrap();
        ledger
            .get_mut(FaultKind::Apply)
            .unwrap()
            .set_remediation("trying to skip error but: access denied");

        ledger.update(apply_at(4821), 2).unwrap();
        assert!(ledger.get(FaultKind::Apply).unwrap().remediation().is_some());

        ledger.update(apply_at(6000), 3).unwrap();
        assert!(ledger.get(FaultKind::Apply).unwrap().remediation().is_none());
    }

    #[test]
    fn double_update_in_one_cycle_is_an_invariant_violation() {
        let mut ledger = FaultLedger::default();
        ledger.update(apply_at(4821), 3).unwrap();
        assert!(matches!(
            ledger.update(apply_at(4821), 3),
            Err(MonitorError::Invariant(_))
        ));
        assert!(matches!(
            ledger.update(apply_at(4821), 2),
            Err(MonitorError::Invariant(_))
        ));
        // The entry is untouched by the rejected updates.
        assert_eq!(ledger.get(FaultKind::Apply).unwrap().repeat_count(), 0);
    }
}
