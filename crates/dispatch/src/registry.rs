//! Dispatch registry — routes released runs to per-destination queues.
//!
//! Each registered destination owns an unbounded tokio channel. Handing a run
//! off is a non-blocking `send`, so the engine can call it under its per-key
//! lock; consumers drain the receivers at their own pace.

use std::collections::HashMap;

use resequencer_core::{
    CorrelationKey, Destination, DispatchError, Dispatcher, ReleasedRun, SequencedItem,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type RunSender = mpsc::UnboundedSender<ReleasedRun>;

/// Central registry holding all destination routes.
pub struct DispatchRegistry {
    routes: HashMap<Destination, RunSender>,
    fallback: Option<RunSender>,
    discard_to: Option<Destination>,
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: None,
            discard_to: None,
        }
    }

    /// Register a destination and get the receiving end of its queue.
    ///
    /// Registering the same destination again replaces the previous route.
    pub fn register(
        &mut self,
        destination: impl Into<Destination>,
    ) -> mpsc::UnboundedReceiver<ReleasedRun> {
        let destination = destination.into();
        let (tx, rx) = mpsc::unbounded_channel();
        info!(destination = %destination, "Registered destination");
        self.routes.insert(destination, tx);
        rx
    }

    /// Catch runs for destinations nobody registered.
    pub fn register_fallback(&mut self) -> mpsc::UnboundedReceiver<ReleasedRun> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.fallback = Some(tx);
        rx
    }

    /// Deliver items of expired groups to `destination` instead of dropping them.
    pub fn discard_to(&mut self, destination: impl Into<Destination>) {
        self.discard_to = Some(destination.into());
    }

    /// List all registered destinations.
    pub fn list(&self) -> Vec<Destination> {
        self.routes.keys().cloned().collect()
    }

    /// Number of registered destinations.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn route(&self, destination: &Destination) -> Option<&RunSender> {
        self.routes.get(destination).or(self.fallback.as_ref())
    }
}

impl Dispatcher for DispatchRegistry {
    fn dispatch(&self, run: ReleasedRun) -> Result<(), DispatchError> {
        let destination = run.destination.clone();
        let sender = self
            .route(&destination)
            .ok_or_else(|| DispatchError::UnknownDestination(destination.clone()))?;

        debug!(destination = %destination, run_id = %run.run_id, count = run.len(), "Dispatching run");
        sender
            .send(run)
            .map_err(|_| DispatchError::Closed { destination })
    }

    fn discard(
        &self,
        correlation_key: &CorrelationKey,
        items: Vec<SequencedItem>,
    ) -> Result<(), DispatchError> {
        let Some(destination) = &self.discard_to else {
            warn!(
                correlation_key = %correlation_key,
                count = items.len(),
                "No discard destination, dropping items"
            );
            return Ok(());
        };
        let run = ReleasedRun::new(correlation_key.clone(), destination.clone(), items);
        self.dispatch(run)
    }
}
