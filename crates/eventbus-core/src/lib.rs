//! Eventbus Core - Store-agnostic publish/subscribe
//!
//! This crate provides the transport-independent part of the event bus:
//! - Event: handler registry plus the background dispatch loop
//! - Handler: the capability invoked once per delivered payload
//! - Store: the contract every transport (in-process, Redis, ...) satisfies
//! - Error: typed failures for registration, subscription and publishing
//!
//! ## Flow
//!
//! ```text
//! Event::publish ──► Store::publish ──► (transport) ──► PayloadStream
//!                                                          │
//!                                          dispatch loop ◄─┘
//!                                                │ snapshot registry
//!                              ┌─────────────────┼─────────────────┐
//!                              ▼                 ▼                 ▼
//!                         spawn(h1)         spawn(h2)         spawn(hN)
//! ```
//!
//! Publishing never calls local handlers directly. Delivery always takes the
//! round trip through the store, so every process sharing a remote store sees
//! the same semantics.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod handler;
pub mod store;

pub use error::{Error, Result, StoreError};
pub use event::Event;
pub use handler::{handler_fn, Handler, HandlerFn, SharedHandler};
pub use store::{PayloadStream, Store};

/// Re-exported so callers can build the construction-time cancellation token
/// without a direct `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
