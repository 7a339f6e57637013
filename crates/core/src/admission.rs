//! Admission outcomes for submitted items.

use serde::{Deserialize, Serialize};

/// Why an item was not admitted into its group buffer.
///
/// Rejections are expected traffic (retransmissions, late arrivals), not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Position is below the watermark: already released
    Stale,
    /// An item with the same position is already buffered
    Duplicate,
    /// Position lies beyond the total advertised by the last inserted item
    ExceedsAdvertisedTotal,
    /// Position lies outside the item's own declared total
    OutOfRange,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RejectReason::Stale => "stale",
            RejectReason::Duplicate => "duplicate",
            RejectReason::ExceedsAdvertisedTotal => "exceeds_advertised_total",
            RejectReason::OutOfRange => "out_of_range",
        };
        f.write_str(s)
    }
}

/// Result of the admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Admission {
    Accepted,
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted)
    }
}
