//! Reassembly engine — one group buffer per correlation key.
//!
//! Flow for every submission:
//! 1. Look up (or open) the group buffer for the item's key
//! 2. Admission check; rejected items end here with an empty result
//! 3. Insert, re-evaluate completion, release the run after the watermark
//! 4. Resolve the run's destination from its first item and hand it off
//! 5. Retire the group once its terminal position has been released
//!
//! Steps 2–5 run under the group's mutex. The key → group map is a `DashMap`,
//! so different keys only contend on a shard lock while the buffer handle is
//! cloned out. A group mutex is never acquired while a shard guard is held.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use resequencer_core::{
    Admission, CorrelationKey, Destination, DestinationResolver, Dispatcher, EventBus,
    RejectReason, ReleasePolicy, ReleasedRun, ResequencerEvent, RetireCause, SequencedItem,
    TimeoutAction,
};
use tracing::{debug, info, warn};

use crate::buffer::GroupBuffer;
use crate::stats::{EngineStats, StatsSnapshot};

type GroupSlot = Arc<Mutex<GroupBuffer>>;

/// Outcome of one submission.
#[derive(Debug, Clone)]
pub struct ReleaseResult {
    /// Whether the item entered its group buffer
    pub admission: Admission,

    /// The run released by this submission, already handed to the dispatcher
    pub run: Option<ReleasedRun>,

    /// Whether this submission retired the group
    pub retired: bool,
}

impl ReleaseResult {
    fn rejected(reason: RejectReason) -> Self {
        Self {
            admission: Admission::Rejected(reason),
            run: None,
            retired: false,
        }
    }

    fn held() -> Self {
        Self {
            admission: Admission::Accepted,
            run: None,
            retired: false,
        }
    }

    /// Released items in ascending order (empty when nothing was released).
    pub fn items(&self) -> &[SequencedItem] {
        self.run.as_ref().map(|run| &run.items[..]).unwrap_or(&[])
    }

    pub fn positions(&self) -> Vec<u64> {
        self.items().iter().map(|item| item.position).collect()
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.run.as_ref().map(|run| &run.destination)
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

/// A group removed by the lifecycle owner before it completed.
#[derive(Debug, Clone)]
pub struct ExpiredGroup {
    pub correlation_key: CorrelationKey,

    /// Items still buffered at expiry
    pub leftover: usize,

    /// Time since the last accepted item
    pub idle_for: Duration,

    pub action: TimeoutAction,

    /// The final run handed to the dispatcher under `TimeoutAction::Flush`
    pub flushed: Option<ReleasedRun>,
}

/// Read-only view of one open group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub correlation_key: CorrelationKey,
    pub watermark: Option<u64>,
    pub buffered: Vec<u64>,
    pub complete: bool,
}

/// The reassembly engine.
///
/// Thread-safe: share it behind an `Arc` and call [`Resequencer::submit`] from
/// any number of producers.
pub struct Resequencer {
    groups: DashMap<CorrelationKey, GroupSlot>,
    policy: ReleasePolicy,
    resolver: Arc<dyn DestinationResolver>,
    dispatcher: Arc<dyn Dispatcher>,
    events: Option<Arc<EventBus>>,
    stats: EngineStats,
}

impl Resequencer {
    pub fn new(
        policy: ReleasePolicy,
        resolver: Arc<dyn DestinationResolver>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            groups: DashMap::new(),
            policy,
            resolver,
            dispatcher,
            events: None,
            stats: EngineStats::default(),
        }
    }

    /// Publish rejections, releases and retirements on `events`.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    /// Submit one item and release whatever it unblocks.
    pub fn submit(&self, item: SequencedItem) -> ReleaseResult {
        self.stats.record_submitted();
        loop {
            let slot = self.slot(&item.correlation_key);
            let mut group = slot.lock();
            if group.is_retired() {
                // Retired between lookup and lock; it is no longer in the map.
                drop(group);
                continue;
            }
            return self.submit_locked(&slot, &mut group, item);
        }
    }

    fn slot(&self, key: &CorrelationKey) -> GroupSlot {
        if let Some(existing) = self.groups.get(key) {
            return existing.value().clone();
        }
        self.groups
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(correlation_key = %key, "Opened group");
                Arc::new(Mutex::new(GroupBuffer::new(key.clone())))
            })
            .value()
            .clone()
    }

    fn submit_locked(
        &self,
        slot: &GroupSlot,
        group: &mut GroupBuffer,
        item: SequencedItem,
    ) -> ReleaseResult {
        if let Admission::Rejected(reason) = group.can_admit(&item) {
            self.stats.record_rejected();
            debug!(
                correlation_key = %item.correlation_key,
                position = item.position,
                total = item.total,
                reason = %reason,
                "Rejected item"
            );
            self.publish(ResequencerEvent::ItemRejected {
                correlation_key: item.correlation_key,
                position: item.position,
                reason,
                timestamp: Utc::now(),
            });
            if group.is_empty() && group.watermark().is_none() {
                // Never held an item; drop it without a retirement.
                group.mark_retired();
                let key = group.correlation_key().clone();
                self.groups
                    .remove_if(&key, |_, current| Arc::ptr_eq(current, slot));
            }
            return ReleaseResult::rejected(reason);
        }

        group.insert(item);
        self.stats.record_accepted();
        group.refresh_completion();

        let released = group.release(self.policy);
        let Some(first) = released.first() else {
            return ReleaseResult::held();
        };
        let retired = released.last().is_some_and(SequencedItem::is_terminal);

        let destination = self.resolver.resolve(first);
        let run = ReleasedRun::new(group.correlation_key().clone(), destination, released);
        self.hand_off(run.clone());

        if retired {
            self.stats.record_completed();
            let leftover = self.retire(slot, group, RetireCause::Completed);
            if !leftover.is_empty() {
                self.discard(group.correlation_key(), leftover);
            }
        }

        ReleaseResult {
            admission: Admission::Accepted,
            run: Some(run),
            retired,
        }
    }

    /// Hand a run to the dispatcher. Failures are counted, never propagated.
    fn hand_off(&self, run: ReleasedRun) {
        let (Some(first), Some(last)) = (run.first(), run.last()) else {
            return;
        };
        let (first_position, last_position) = (first.position, last.position);
        self.stats.record_run(run.len());
        debug!(
            correlation_key = %run.correlation_key,
            destination = %run.destination,
            run_id = %run.run_id,
            first_position,
            last_position,
            count = run.len(),
            "Released run"
        );
        self.publish(ResequencerEvent::RunReleased {
            correlation_key: run.correlation_key.clone(),
            destination: run.destination.clone(),
            first_position,
            last_position,
            count: run.len(),
            timestamp: Utc::now(),
        });

        let destination = run.destination.clone();
        if let Err(e) = self.dispatcher.dispatch(run) {
            self.stats.record_dispatch_failure();
            warn!(destination = %destination, error = %e, "Failed to dispatch released run");
        }
    }

    fn discard(&self, key: &CorrelationKey, items: Vec<SequencedItem>) {
        self.stats.record_discarded(items.len());
        if let Err(e) = self.dispatcher.discard(key, items) {
            self.stats.record_dispatch_failure();
            warn!(correlation_key = %key, error = %e, "Failed to discard items");
        }
    }

    /// Mark the group retired and drop it from the map. Returns leftover items.
    ///
    /// Only removes the map entry if it still points at this buffer, so a
    /// fresh group opened for the same key is never touched.
    fn retire(
        &self,
        slot: &GroupSlot,
        group: &mut GroupBuffer,
        cause: RetireCause,
    ) -> Vec<SequencedItem> {
        group.mark_retired();
        let leftover = group.drain();
        let key = group.correlation_key().clone();
        self.groups
            .remove_if(&key, |_, current| Arc::ptr_eq(current, slot));

        info!(
            correlation_key = %key,
            cause = ?cause,
            leftover = leftover.len(),
            "Retired group"
        );
        self.publish(ResequencerEvent::GroupRetired {
            correlation_key: key,
            cause,
            leftover: leftover.len(),
            timestamp: Utc::now(),
        });
        leftover
    }

    /// Expire one group regardless of activity.
    ///
    /// Idempotent: an absent or already-retired key yields `None`.
    pub fn expire(&self, key: &CorrelationKey, action: TimeoutAction) -> Option<ExpiredGroup> {
        let slot = self.groups.get(key).map(|entry| entry.value().clone())?;
        let mut group = slot.lock();
        if group.is_retired() {
            return None;
        }
        Some(self.expire_locked(&slot, &mut group, action, Instant::now()))
    }

    /// Expire every group idle for at least `timeout`.
    pub fn expire_idle(&self, timeout: Duration, action: TimeoutAction) -> Vec<ExpiredGroup> {
        self.expire_idle_at(Instant::now(), timeout, action)
    }

    /// Like [`Resequencer::expire_idle`] with an explicit clock reading.
    pub fn expire_idle_at(
        &self,
        now: Instant,
        timeout: Duration,
        action: TimeoutAction,
    ) -> Vec<ExpiredGroup> {
        self.expire_matching(now, action, |group| group.idle_for(now) >= timeout)
    }

    /// Expire every open group (shutdown).
    pub fn expire_all(&self, action: TimeoutAction) -> Vec<ExpiredGroup> {
        self.expire_matching(Instant::now(), action, |_| true)
    }

    fn expire_matching<F>(&self, now: Instant, action: TimeoutAction, predicate: F) -> Vec<ExpiredGroup>
    where
        F: Fn(&GroupBuffer) -> bool,
    {
        let candidates: Vec<GroupSlot> = self
            .groups
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut expired = Vec::new();
        for slot in candidates {
            let mut group = slot.lock();
            if group.is_retired() || !predicate(&group) {
                continue;
            }
            expired.push(self.expire_locked(&slot, &mut group, action, now));
        }
        expired
    }

    fn expire_locked(
        &self,
        slot: &GroupSlot,
        group: &mut GroupBuffer,
        action: TimeoutAction,
        now: Instant,
    ) -> ExpiredGroup {
        let idle_for = group.idle_for(now);
        self.stats.record_expired();
        let leftover = self.retire(slot, group, RetireCause::Expired);
        let key = group.correlation_key().clone();
        let count = leftover.len();

        let flushed = match (action, leftover.first()) {
            (_, None) => None,
            (TimeoutAction::Flush, Some(first)) => {
                let destination = self.resolver.resolve(first);
                let run = ReleasedRun::new(key.clone(), destination, leftover);
                self.hand_off(run.clone());
                Some(run)
            }
            (TimeoutAction::Discard, Some(_)) => {
                self.discard(&key, leftover);
                None
            }
        };

        ExpiredGroup {
            correlation_key: key,
            leftover: count,
            idle_for,
            action,
            flushed,
        }
    }

    /// Number of open groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.groups.contains_key(key)
    }

    /// Inspect an open group.
    pub fn snapshot(&self, key: &CorrelationKey) -> Option<GroupSnapshot> {
        let slot = self.groups.get(key).map(|entry| entry.value().clone())?;
        let group = slot.lock();
        Some(GroupSnapshot {
            correlation_key: group.correlation_key().clone(),
            watermark: group.watermark(),
            buffered: group.positions(),
            complete: group.complete(),
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    fn publish(&self, event: ResequencerEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
