//! End-to-end integration tests for the resequencer.
//!
//! These tests wire the engine to the dispatch registry, reply-to routing,
//! the event bus and the group reaper the same way `reseq run` does.

use std::sync::Arc;
use std::time::Duration;

use resequencer_config::ResequencerConfig;
use resequencer_core::{
    Admission, EventBus, RejectReason, ReleasePolicy, ReleasedRun, ResequencerEvent, RetireCause,
    SequencedItem, TimeoutAction,
};
use resequencer_dispatch::{DispatchRegistry, ReplyToResolver};
use resequencer_engine::Resequencer;
use resequencer_lifecycle::GroupReaper;
use tokio::sync::mpsc::UnboundedReceiver;

// ── Harness ──────────────────────────────────────────────────────────────

struct Pipeline {
    engine: Arc<Resequencer>,
    output: UnboundedReceiver<ReleasedRun>,
    billing: UnboundedReceiver<ReleasedRun>,
    dead_letter: UnboundedReceiver<ReleasedRun>,
    events: Arc<EventBus>,
}

fn pipeline(config: &ResequencerConfig) -> Pipeline {
    let mut registry = DispatchRegistry::new();
    let output = registry.register(config.default_destination());
    let billing = registry.register("billing");
    let dead_letter = registry.register("dead-letter");
    registry.discard_to("dead-letter");

    let events = Arc::new(EventBus::new(config.events.capacity));
    let engine = Resequencer::new(
        config.release_policy,
        Arc::new(ReplyToResolver::from_config(config)),
        Arc::new(registry),
    )
    .with_events(events.clone());

    Pipeline {
        engine: Arc::new(engine),
        output,
        billing,
        dead_letter,
        events,
    }
}

fn drain(rx: &mut UnboundedReceiver<ReleasedRun>) -> Vec<Vec<u64>> {
    let mut runs = Vec::new();
    while let Ok(run) = rx.try_recv() {
        runs.push(run.positions());
    }
    runs
}

fn item(key: &str, position: u64, total: u64) -> SequencedItem {
    SequencedItem::new(key, position, total)
}

// ── Release ordering ─────────────────────────────────────────────────────

#[test]
fn scrambled_sequence_releases_in_order() {
    let mut p = pipeline(&ResequencerConfig::default());

    for pos in [1, 3, 2] {
        let result = p.engine.submit(item("A", pos, 4));
        assert!(result.admission.is_accepted());
        assert!(result.is_empty());
    }
    let result = p.engine.submit(item("A", 0, 4));
    assert_eq!(result.positions(), vec![0, 1, 2, 3]);
    assert!(result.retired);

    assert_eq!(drain(&mut p.output), vec![vec![0, 1, 2, 3]]);
    assert_eq!(p.engine.group_count(), 0);
}

#[test]
fn partial_runs_follow_each_closed_gap() {
    let mut p = pipeline(&ResequencerConfig::default());

    p.engine.submit(item("A", 0, 5));
    p.engine.submit(item("A", 2, 5));
    p.engine.submit(item("A", 1, 5));
    p.engine.submit(item("A", 4, 5));
    p.engine.submit(item("A", 3, 5));

    assert_eq!(drain(&mut p.output), vec![vec![0], vec![1, 2], vec![3, 4]]);
}

#[test]
fn complete_only_withholds_until_sequence_is_whole() {
    let config = ResequencerConfig {
        release_policy: ReleasePolicy::CompleteOnly,
        ..Default::default()
    };
    let mut p = pipeline(&config);

    p.engine.submit(item("A", 0, 3));
    p.engine.submit(item("A", 1, 3));
    assert!(drain(&mut p.output).is_empty());

    p.engine.submit(item("A", 2, 3));
    assert_eq!(drain(&mut p.output), vec![vec![0, 1, 2]]);
}

#[test]
fn interleaved_keys_are_independent() {
    let mut p = pipeline(&ResequencerConfig::default());

    p.engine.submit(item("A", 1, 2));
    p.engine.submit(item("B", 0, 2));
    p.engine.submit(item("A", 0, 2));
    p.engine.submit(item("B", 1, 2));

    let runs: Vec<(String, Vec<u64>)> = std::iter::from_fn(|| p.output.try_recv().ok())
        .map(|run| (run.correlation_key.to_string(), run.positions()))
        .collect();
    assert_eq!(
        runs,
        vec![
            ("B".to_string(), vec![0]),
            ("A".to_string(), vec![0, 1]),
            ("B".to_string(), vec![1]),
        ]
    );
}

// ── Admission ────────────────────────────────────────────────────────────

#[test]
fn rejections_surface_on_results_and_events() {
    let p = pipeline(&ResequencerConfig::default());
    let mut events = p.events.subscribe();

    p.engine.submit(item("A", 0, 4));
    p.engine.submit(item("A", 2, 4));

    let stale = p.engine.submit(item("A", 0, 4));
    assert_eq!(stale.admission, Admission::Rejected(RejectReason::Stale));

    let dup = p.engine.submit(item("A", 2, 4));
    assert_eq!(dup.admission, Admission::Rejected(RejectReason::Duplicate));

    let beyond = p.engine.submit(item("A", 7, 9));
    assert_eq!(
        beyond.admission,
        Admission::Rejected(RejectReason::ExceedsAdvertisedTotal)
    );

    let mut reasons = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ResequencerEvent::ItemRejected { reason, .. } = event.as_ref() {
            reasons.push(*reason);
        }
    }
    assert_eq!(
        reasons,
        vec![
            RejectReason::Stale,
            RejectReason::Duplicate,
            RejectReason::ExceedsAdvertisedTotal
        ]
    );
    assert_eq!(p.engine.stats().rejected, 3);
}

// ── Routing ──────────────────────────────────────────────────────────────

#[test]
fn reply_to_of_first_item_picks_destination() {
    let mut p = pipeline(&ResequencerConfig::default());

    p.engine.submit(item("A", 1, 2).with_reply_to("audit"));
    p.engine.submit(item("A", 0, 2).with_reply_to("billing"));

    assert_eq!(drain(&mut p.billing), vec![vec![0, 1]]);
    assert!(drain(&mut p.output).is_empty());
}

#[test]
fn default_destination_comes_from_config() {
    let mut config = ResequencerConfig::default();
    config
        .apply_overrides(|key| (key == "RESEQ_DEFAULT_DESTINATION").then(|| "billing".into()))
        .unwrap();
    let mut p = pipeline(&config);

    p.engine.submit(item("A", 0, 1));
    assert_eq!(drain(&mut p.billing), vec![vec![0]]);
}

// ── Lifecycle ────────────────────────────────────────────────────────────

#[test]
fn reaper_discards_stuck_group_to_dead_letter() {
    let mut p = pipeline(&ResequencerConfig::default());
    let mut events = p.events.subscribe();

    p.engine.submit(item("A", 0, 4));
    p.engine.submit(item("A", 2, 4));

    let reaper = GroupReaper::new(
        p.engine.clone(),
        Duration::from_secs(30),
        Duration::from_secs(1),
        TimeoutAction::Discard,
    );
    let expired = reaper.sweep_at(std::time::Instant::now() + Duration::from_secs(60));

    assert_eq!(expired.len(), 1);
    assert_eq!(drain(&mut p.output), vec![vec![0]]);
    assert_eq!(drain(&mut p.dead_letter), vec![vec![2]]);

    let retired = std::iter::from_fn(|| events.try_recv().ok()).any(|e| {
        matches!(
            e.as_ref(),
            ResequencerEvent::GroupRetired {
                cause: RetireCause::Expired,
                leftover: 1,
                ..
            }
        )
    });
    assert!(retired);
}

#[tokio::test]
async fn background_reaper_flushes_idle_group() {
    let config = ResequencerConfig::default();
    let mut p = pipeline(&config);
    p.engine.submit(item("A", 1, 3));

    let reaper = GroupReaper::new(
        p.engine.clone(),
        Duration::from_millis(20),
        Duration::from_millis(5),
        TimeoutAction::Flush,
    );
    let (mut reports, handle) = reaper.start();

    let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
        .await
        .expect("idle group should expire")
        .unwrap();
    handle.abort();

    assert_eq!(report.correlation_key.as_str(), "A");
    assert_eq!(report.flushed.map(|r| r.positions()), Some(vec![1]));
    assert_eq!(drain(&mut p.output), vec![vec![1]]);
}

#[test]
fn key_is_reusable_after_completion() {
    let mut p = pipeline(&ResequencerConfig::default());

    p.engine.submit(item("A", 0, 1));
    let again = p.engine.submit(item("A", 0, 1));
    assert!(again.admission.is_accepted());

    assert_eq!(drain(&mut p.output), vec![vec![0], vec![0]]);
    assert_eq!(p.engine.stats().groups_completed, 2);
}

// ── Config ───────────────────────────────────────────────────────────────

#[test]
fn config_file_drives_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
release_policy = "complete_only"
default_destination = "billing"

[lifecycle]
group_timeout_ms = 500
reap_interval_ms = 50
on_timeout = "flush"
"#,
    )
    .unwrap();

    let config = ResequencerConfig::load_from(&path).unwrap();
    assert_eq!(config.release_policy, ReleasePolicy::CompleteOnly);
    assert_eq!(config.lifecycle.on_timeout, TimeoutAction::Flush);

    let mut p = pipeline(&config);
    p.engine.submit(item("A", 1, 2));
    assert!(drain(&mut p.billing).is_empty());
    p.engine.submit(item("A", 0, 2));
    assert_eq!(drain(&mut p.billing), vec![vec![0, 1]]);
}
