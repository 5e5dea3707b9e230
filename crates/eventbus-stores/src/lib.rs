//! Eventbus Stores - transports for the event bus
//!
//! Two [`Store`](eventbus_core::Store) implementations:
//! - [`MemoryStore`]: in-process broadcast, one buffered channel per subscription
//! - [`RedisStore`]: Redis pub/sub on a named channel, JSON on the wire
//!
//! Each module also exposes a `new_event` shortcut that builds the store and
//! binds an [`Event`](eventbus_core::Event) to it in one call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
