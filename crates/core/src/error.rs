//! Error types for the resequencer domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Rejected items are not errors; these cover the boundaries around the engine.

use thiserror::Error;

use crate::item::Destination;

/// The top-level error type for resequencer operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Dispatch errors ---
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("No route for destination: {0}")]
    UnknownDestination(Destination),

    #[error("Destination {destination} is closed")]
    Closed { destination: Destination },

    #[error("Delivery to {destination} failed: {reason}")]
    DeliveryFailed {
        destination: Destination,
        reason: String,
    },
}
