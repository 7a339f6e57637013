//! # Resequencer Core
//!
//! Domain types, boundary traits, and error definitions for the resequencer.
//! This crate defines the model every other crate in the workspace builds on:
//! sequenced items, released runs, release/timeout policies, and the
//! dispatcher/resolver seams the engine hands its output to.
//!
//! ## Indexing convention
//!
//! Positions are 0-based and `total` counts the items of a sequence, so a
//! sequence of `total` items occupies positions `0..total` and ends at
//! `total - 1`.

pub mod admission;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod item;
pub mod policy;

// Re-export key types at crate root for ergonomics
pub use admission::{Admission, RejectReason};
pub use dispatch::{DestinationResolver, Dispatcher};
pub use error::{DispatchError, Error, Result};
pub use event::{EventBus, ResequencerEvent, RetireCause};
pub use item::{CorrelationKey, Destination, ReleasedRun, SequencedItem};
pub use policy::{ReleasePolicy, TimeoutAction};
