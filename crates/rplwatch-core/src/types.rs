//! Domain types: status samples, fault records and log positions.

use std::fmt;

// ── Positions ──────────────────────────────────────────────────────

/// A point in the upstream's change stream (binary log file + offset).
///
/// The position is the identity of a stall point: two faults at the same
/// position are the same fault, whatever their message says.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LogPosition {
    pub file: String,
    pub offset: u64,
}

impl LogPosition {
    pub fn new(file: impl Into<String>, offset: u64) -> Self {
        Self {
            file: file.into(),
            offset,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.file, self.offset)
    }
}

// ── Status sample ──────────────────────────────────────────────────

/// Error state of one replication channel as reported by the node.
///
/// A `code` of zero means the channel is healthy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelStatus {
    pub code: u32,
    pub message: String,
    pub position: LogPosition,
}

impl ChannelStatus {
    /// A healthy channel sitting at `position`.
    pub fn healthy(position: LogPosition) -> Self {
        Self {
            code: 0,
            message: String::new(),
            position,
        }
    }

    pub fn failing(code: u32, message: impl Into<String>, position: LogPosition) -> Self {
        Self {
            code,
            message: message.into(),
            position,
        }
    }

    pub fn is_failing(&self) -> bool {
        self.code != 0
    }
}

/// Host and port of a MySQL node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A loopback upstream is only meaningful relative to the replica, so
    /// it is reported under the replica's own host name.
    pub fn resolve_loopback(&self, replica_host: &str) -> Endpoint {
        if self.host == "127.0.0.1" || self.host == "::1" || self.host == "localhost" {
            Endpoint::new(replica_host, self.port)
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One poll's view of the replica's health. Built fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSample {
    /// Whether the node is configured as a replica at all.
    pub is_replica: bool,
    pub upstream: Endpoint,
    /// Fetching change-stream data from the upstream.
    pub io: ChannelStatus,
    /// Replaying already-fetched change-stream entries.
    pub apply: ChannelStatus,
}

impl StatusSample {
    /// Sample for a node that reported no replica status.
    pub fn not_replica() -> Self {
        Self::default()
    }

    pub fn replica(upstream: Endpoint, io: ChannelStatus, apply: ChannelStatus) -> Self {
        Self {
            is_replica: true,
            upstream,
            io,
            apply,
        }
    }
}

// ── Faults ─────────────────────────────────────────────────────────

/// Closed set of replication fault kinds.
///
/// Ordering is significant: it fixes the order faults are processed and
/// listed in notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FaultKind {
    /// The replica cannot fetch new change-stream data from its upstream.
    Io,
    /// The replica cannot replay a change-stream entry it already fetched.
    Apply,
}

impl FaultKind {
    pub const ALL: [FaultKind; 2] = [FaultKind::Io, FaultKind::Apply];

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Io => "IO_ERROR",
            FaultKind::Apply => "SQL_ERROR",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of a single replication fault.
#[derive(Debug, Clone)]
pub struct FaultRecord {
    pub kind: FaultKind,
    pub code: u32,
    pub message: String,
    pub position: LogPosition,
}

impl FaultRecord {
    pub fn new(kind: FaultKind, code: u32, message: impl Into<String>, position: LogPosition) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            position,
        }
    }
}

/// Records are equal when they are the same kind stalled at the same
/// position. Message text does not take part.
impl PartialEq for FaultRecord {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.position == other.position
    }
}

impl Eq for FaultRecord {}

impl fmt::Display for FaultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] #{}: {}", self.position, self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_compare_by_position_not_message() {
        let pos = LogPosition::new("log.000007", 4821);
        let a = FaultRecord::new(FaultKind::Apply, 1062, "Duplicate entry '1'", pos.clone());
        let b = FaultRecord::new(FaultKind::Apply, 1062, "Duplicate entry '2'", pos);
        assert_eq!(a, b);

        let c = FaultRecord::new(
            FaultKind::Apply,
            1062,
            "Duplicate entry '1'",
            LogPosition::new("log.000007", 5000),
        );
        assert_ne!(a, c);
    }

    #[test]
    fn records_of_different_kinds_differ() {
        let pos = LogPosition::new("log.000001", 4);
        let io = FaultRecord::new(FaultKind::Io, 2003, "x", pos.clone());
        let apply = FaultRecord::new(FaultKind::Apply, 2003, "x", pos);
        assert_ne!(io, apply);
    }

    #[test]
    fn record_display_matches_fault_log_format() {
        let rec = FaultRecord::new(
            FaultKind::Apply,
            1062,
            "Duplicate entry '7' for key 'PRIMARY'",
            LogPosition::new("log.000007", 4821),
        );
        assert_eq!(
            rec.to_string(),
            "[log.000007 4821] #1062: Duplicate entry '7' for key 'PRIMARY'"
        );
    }

    #[test]
    fn loopback_upstream_takes_replica_host() {
        let up = Endpoint::new("127.0.0.1", 3307);
        assert_eq!(up.resolve_loopback("db-7"), Endpoint::new("db-7", 3307));

        let remote = Endpoint::new("db-1", 3306);
        assert_eq!(remote.resolve_loopback("db-7"), remote);
    }

    #[test]
    fn kinds_order_io_first() {
        let mut kinds = vec![FaultKind::Apply, FaultKind::Io];
        kinds.sort();
        assert_eq!(kinds, FaultKind::ALL.to_vec());
    }
}
