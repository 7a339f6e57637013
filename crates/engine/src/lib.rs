//! Sequence reassembly engine.
//!
//! Buffers items per correlation key and releases them strictly in position
//! order, either as soon as each gap closes ([`ReleasePolicy::Partial`]) or only
//! once the whole sequence is present ([`ReleasePolicy::CompleteOnly`]).
//!
//! - [`GroupBuffer`] — admission, completion detection and run release for one key
//! - [`Resequencer`] — the concurrent key → buffer map, dispatch handoff, retirement
//!
//! [`ReleasePolicy::Partial`]: resequencer_core::ReleasePolicy::Partial
//! [`ReleasePolicy::CompleteOnly`]: resequencer_core::ReleasePolicy::CompleteOnly

pub mod buffer;
pub mod engine;
pub mod stats;

pub use buffer::GroupBuffer;
pub use engine::{ExpiredGroup, GroupSnapshot, ReleaseResult, Resequencer};
pub use stats::{EngineStats, StatsSnapshot};
