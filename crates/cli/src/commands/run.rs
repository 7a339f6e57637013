//! `reseq run` — reorder a JSON-lines item stream.
//!
//! Each input line is one [`SequencedItem`]. Released runs are written to
//! stdout as JSON lines in the order the engine hands them off. A background
//! reaper expires groups that go idle; at end of input every group still
//! buffered is expired too.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use resequencer_config::ResequencerConfig;
use resequencer_core::{EventBus, ReleasePolicy, ReleasedRun, SequencedItem, TimeoutAction};
use resequencer_dispatch::{DispatchRegistry, ReplyToResolver};
use resequencer_engine::{Resequencer, StatsSnapshot};
use resequencer_lifecycle::GroupReaper;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

pub struct RunOptions {
    pub input: Option<PathBuf>,
    pub policy: Option<ReleasePolicy>,
    pub flush_on_exit: bool,
    pub events: bool,
}

pub async fn run(
    config: ResequencerConfig,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let stats = match &options.input {
        Some(path) => {
            let file = tokio::fs::File::open(path).await?;
            process(&config, &options, BufReader::new(file), tokio::io::stdout()).await?
        }
        None => {
            process(
                &config,
                &options,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?
        }
    };

    info!(
        submitted = stats.submitted,
        accepted = stats.accepted,
        rejected = stats.rejected,
        runs = stats.runs_released,
        released = stats.items_released,
        completed = stats.groups_completed,
        expired = stats.groups_expired,
        discarded = stats.items_discarded,
        dispatch_failures = stats.dispatch_failures,
        "Input exhausted"
    );
    Ok(())
}

/// Drive the engine from `reader` and write every released run to `writer`.
///
/// Returns once input is exhausted, leftovers are expired and every run has
/// been written.
pub async fn process<R, W>(
    config: &ResequencerConfig,
    options: &RunOptions,
    reader: R,
    writer: W,
) -> io::Result<StatsSnapshot>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let policy = options.policy.unwrap_or(config.release_policy);

    let mut registry = DispatchRegistry::new();
    let released = registry.register_fallback();
    if let Some(discard) = config.discard_destination() {
        registry.discard_to(discard);
    }

    let events = Arc::new(EventBus::new(config.events.capacity));
    let echo = options
        .events
        .then(|| tokio::spawn(echo_events(events.subscribe())));

    let engine = Arc::new(
        Resequencer::new(
            policy,
            Arc::new(ReplyToResolver::from_config(config)),
            Arc::new(registry),
        )
        .with_events(events),
    );
    info!(policy = %policy, "Resequencer started");

    let printer = tokio::spawn(print_runs(released, writer));

    let reaper = GroupReaper::from_config(engine.clone(), &config.lifecycle);
    let (mut expiries, reaper_handle) = reaper.start();
    drop(reaper);
    let expiry_log = tokio::spawn(async move {
        while let Some(expired) = expiries.recv().await {
            debug!(correlation_key = %expired.correlation_key, "Reaper report received");
        }
    });

    let mut lines = reader.lines();
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match SequencedItem::from_json_line(&line) {
            Ok(item) => {
                engine.submit(item);
            }
            Err(e) => warn!(line = line_no, error = %e, "Skipping malformed item"),
        }
    }

    let action = if options.flush_on_exit {
        TimeoutAction::Flush
    } else {
        config.lifecycle.on_timeout
    };
    let leftovers = engine.expire_all(action);
    if !leftovers.is_empty() {
        info!(
            groups = leftovers.len(),
            action = %action,
            "Expired unfinished groups at end of input"
        );
    }

    // The reaper task holds an engine handle; wait for it to go away so the
    // dispatch queues close once we drop ours.
    reaper_handle.abort();
    let _ = reaper_handle.await;
    let _ = expiry_log.await;

    let stats = engine.stats();
    drop(engine);

    printer.await.map_err(io::Error::other)??;
    if let Some(echo) = echo {
        let _ = echo.await;
    }
    Ok(stats)
}

async fn print_runs<W>(
    mut runs: mpsc::UnboundedReceiver<ReleasedRun>,
    mut writer: W,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(run) = runs.recv().await {
        let mut line = serde_json::to_vec(&run).map_err(io::Error::other)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
    }
    writer.flush().await
}

async fn echo_events(mut rx: broadcast::Receiver<Arc<resequencer_core::ResequencerEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => match serde_json::to_string(event.as_ref()) {
                Ok(json) => eprintln!("{json}"),
                Err(e) => warn!(error = %e, "Failed to serialize event"),
            },
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Event echo fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
