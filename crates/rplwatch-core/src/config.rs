//! Policy knobs for the poll loop, ledger, remediation and throttle.

use std::num::NonZeroU64;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_REMINDER_GAP: NonZeroU64 = match NonZeroU64::new(480) {
    Some(gap) => gap,
    None => panic!("reminder gap must be non-zero"),
};

/// Monitor policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Sleep between two polls on a healthy connection (default: 60s).
    pub poll_interval: Duration,
    /// Sleep before reconnecting after a connection failure (default: 60s).
    pub retry_interval: Duration,
    /// Skip the offending event on apply faults and resume (default: true).
    pub auto_skip: bool,
    /// Re-notify every `reminder_gap` cycles while a fault persists
    /// (default: 480).
    pub reminder_gap: NonZeroU64,
    /// Largest distance in cycles between two observations of the same
    /// fault that still counts as a continuation (default: 1).
    pub max_cycle_gap: NonZeroU64,
    /// Connect, poll once and stop.
    pub batch: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            retry_interval: Duration::from_secs(60),
            auto_skip: true,
            reminder_gap: DEFAULT_REMINDER_GAP,
            max_cycle_gap: NonZeroU64::MIN,
            batch: false,
        }
    }
}

impl MonitorConfig {
    /// Builder method: set the reminder gap, rejecting zero.
    pub fn with_reminder_gap(self, gap: u64) -> Result<Self, ConfigError> {
        let reminder_gap = NonZeroU64::new(gap).ok_or(ConfigError::ZeroReminderGap)?;
        Ok(Self {
            reminder_gap,
            ..self
        })
    }

    /// Builder method: set the continuation window, rejecting zero.
    pub fn with_max_cycle_gap(self, gap: u64) -> Result<Self, ConfigError> {
        let max_cycle_gap = NonZeroU64::new(gap).ok_or(ConfigError::ZeroCycleGap)?;
        Ok(Self {
            max_cycle_gap,
            ..self
        })
    }
}
