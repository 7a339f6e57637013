//! Dispatcher and destination resolver traits — the downstream boundary.
//!
//! The engine computes released runs; everything about where they go and how
//! they get there lives behind these traits. Implementations live in the
//! `resequencer-dispatch` crate (or in the embedding application).

use tracing::warn;

use crate::error::DispatchError;
use crate::item::{CorrelationKey, Destination, ReleasedRun, SequencedItem};

/// Receives released runs and hands them to the transport.
///
/// The engine calls `dispatch` while it still holds the per-key lock, so that
/// runs of one correlation key are handed off in release order. Implementations
/// must therefore only enqueue (never block or await downstream work).
///
/// Implementations must not call back into the engine for the same correlation
/// key (`submit`, `expire`) from inside `dispatch` or `discard`: the per-key
/// lock is not re-entrant and the call would deadlock.
pub trait Dispatcher: Send + Sync {
    /// Hand off one run. Items are in strictly ascending position order.
    fn dispatch(&self, run: ReleasedRun) -> Result<(), DispatchError>;

    /// Receive items dropped when a group expired without being released.
    fn discard(
        &self,
        correlation_key: &CorrelationKey,
        items: Vec<SequencedItem>,
    ) -> Result<(), DispatchError> {
        warn!(
            correlation_key = %correlation_key,
            count = items.len(),
            "Discarding buffered items of expired group"
        );
        Ok(())
    }
}

/// Picks the destination of a released run from its first item.
///
/// Must not have side effects on buffer state; it is called under the per-key lock.
pub trait DestinationResolver: Send + Sync {
    fn resolve(&self, first: &SequencedItem) -> Destination;
}

/// Closures work as resolvers.
impl<F> DestinationResolver for F
where
    F: Fn(&SequencedItem) -> Destination + Send + Sync,
{
    fn resolve(&self, first: &SequencedItem) -> Destination {
        self(first)
    }
}
