//! Status sample in, fault records out.

use crate::types::{ChannelStatus, FaultKind, FaultRecord, StatusSample};

/// Result of classifying one status sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// The node is not a replica; there is nothing to monitor.
    NotEligible,
    /// Faults present in the sample, at most one per kind, `Io` first.
    Faults(Vec<FaultRecord>),
}

/// Derive fault records from a sample. Pure.
pub fn classify(sample: &StatusSample) -> Classification {
    if !sample.is_replica {
        return Classification::NotEligible;
    }

    let faults = FaultKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let channel = match kind {
                FaultKind::Io => &sample.io,
                FaultKind::Apply => &sample.apply,
            };
            record_for(kind, channel)
        })
        .collect();

    Classification::Faults(faults)
}

fn record_for(kind: FaultKind, channel: &ChannelStatus) -> Option<FaultRecord> {
    channel.is_failing().then(|| {
        FaultRecord::new(
            kind,
            channel.code,
            channel.message.clone(),
            channel.position.clone(),
        )
    })
}
