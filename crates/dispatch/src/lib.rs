//! Dispatch implementations for the resequencer.
//!
//! The engine hands every released run to a [`Dispatcher`]; this crate provides
//! the in-process one and the resolvers that pick destinations.
//!
//! - **Registry** — routes runs to per-destination queues, with optional
//!   fallback and discard routes
//! - **Resolvers** — reply-to with a default, or one static destination
//!
//! [`Dispatcher`]: resequencer_core::Dispatcher

pub mod registry;
pub mod resolver;

pub use registry::DispatchRegistry;
pub use resolver::{ReplyToResolver, StaticResolver};
