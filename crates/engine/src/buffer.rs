//! Group buffer — the ordered, duplicate-free store for one correlation key.
//!
//! The buffer keeps a watermark (`next_position`, the lowest position not yet
//! released) next to a `BTreeMap` keyed by position. Every buffered item has a
//! position at or above the watermark; released items leave the map.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use resequencer_core::{Admission, CorrelationKey, RejectReason, ReleasePolicy, SequencedItem};

/// Buffered state of one sequence.
#[derive(Debug)]
pub struct GroupBuffer {
    correlation_key: CorrelationKey,
    /// Lowest position not yet released.
    next_position: u64,
    items: BTreeMap<u64, SequencedItem>,
    /// `total` declared by the most recently inserted item.
    last_inserted_total: Option<u64>,
    complete: bool,
    retired: bool,
    created_at: Instant,
    last_activity: Instant,
}

impl GroupBuffer {
    /// Open an empty buffer with nothing released.
    pub fn new(correlation_key: CorrelationKey) -> Self {
        let now = Instant::now();
        Self {
            correlation_key,
            next_position: 0,
            items: BTreeMap::new(),
            last_inserted_total: None,
            complete: false,
            retired: false,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn correlation_key(&self) -> &CorrelationKey {
        &self.correlation_key
    }

    /// Decide whether `item` may enter the buffer. Pure: the caller inserts.
    pub fn can_admit(&self, item: &SequencedItem) -> Admission {
        if item.position < self.next_position {
            return Admission::Rejected(RejectReason::Stale);
        }
        if self.items.contains_key(&item.position) {
            return Admission::Rejected(RejectReason::Duplicate);
        }
        let exceeds_advertised = !self.items.is_empty()
            && self
                .last_inserted_total
                .is_some_and(|total| item.position >= total);
        if exceeds_advertised {
            return Admission::Rejected(RejectReason::ExceedsAdvertisedTotal);
        }
        if item.position >= item.total {
            return Admission::Rejected(RejectReason::OutOfRange);
        }
        Admission::Accepted
    }

    /// Store an admitted item.
    pub fn insert(&mut self, item: SequencedItem) {
        debug_assert!(self.can_admit(&item).is_accepted());
        self.last_inserted_total = Some(item.total);
        self.last_activity = Instant::now();
        self.items.insert(item.position, item);
    }

    /// Whether the buffered items form the whole remaining sequence: one
    /// unbroken run starting at the watermark and ending at its terminal position.
    pub fn is_complete(&self) -> bool {
        let (Some((&first, _)), Some((&last, last_item))) =
            (self.items.first_key_value(), self.items.last_key_value())
        else {
            return false;
        };
        first == self.next_position
            && last_item.is_terminal()
            && last - first == self.items.len() as u64 - 1
    }

    /// Re-evaluate completion; once set, the flag stays set.
    pub fn refresh_completion(&mut self) -> bool {
        if !self.complete && self.is_complete() {
            self.complete = true;
        }
        self.complete
    }

    /// Whether the full sequence has been observed at some point.
    pub fn complete(&self) -> bool {
        self.complete
    }

    /// Move the contiguous run following the watermark out of the buffer.
    ///
    /// Under `CompleteOnly` nothing moves until the group is complete.
    pub fn release(&mut self, policy: ReleasePolicy) -> Vec<SequencedItem> {
        if policy == ReleasePolicy::CompleteOnly && !self.complete {
            return Vec::new();
        }

        let mut run = Vec::new();
        while let Some(entry) = self.items.first_entry() {
            if *entry.key() != self.next_position {
                break;
            }
            run.push(entry.remove());
            self.next_position += 1;
        }
        run
    }

    /// Remove every buffered item, ascending. The watermark is left untouched.
    pub fn drain(&mut self) -> Vec<SequencedItem> {
        std::mem::take(&mut self.items).into_values().collect()
    }

    pub fn mark_retired(&mut self) {
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Highest position released so far, if any.
    pub fn watermark(&self) -> Option<u64> {
        self.next_position.checked_sub(1)
    }

    pub fn next_position(&self) -> u64 {
        self.next_position
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Buffered positions, ascending.
    pub fn positions(&self) -> Vec<u64> {
        self.items.keys().copied().collect()
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// Time since the last accepted item.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}
