//! In-process broadcast store
//!
//! Every call to `subscribe` gets its own bounded channel, keyed by a random
//! id. `publish` copies the payload into every live channel. When the
//! subscription's token is cancelled, a cleanup task removes the channel and
//! the stream closes. Copies still waiting for room in a full buffer are
//! dropped at the same moment, so nothing reaches the stream after
//! cancellation except what was already buffered.
//!
//! The store is cheap to clone; clones share the subscription table, so
//! several buses bound to clones of one store all see every payload.

use async_trait::async_trait;
use eventbus_core::{Event, PayloadStream, Result, Store, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Default per-subscription buffer
pub const DEFAULT_BUFFER: usize = 64;

/// Live subscription: its channel plus the token that ends it
struct Subscription<P> {
    tx: mpsc::Sender<P>,
    cancel: CancellationToken,
}

impl<P> Clone for Subscription<P> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

type Subscriptions<P> = Arc<RwLock<HashMap<Uuid, Subscription<P>>>>;

/// In-memory broadcast store
pub struct MemoryStore<P> {
    buffer: usize,
    subscriptions: Subscriptions<P>,
}

impl<P> Clone for MemoryStore<P> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer,
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl<P> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl<P> std::fmt::Debug for MemoryStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("buffer", &self.buffer)
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl<P> MemoryStore<P> {
    /// Create a store whose subscriptions buffer up to `buffer` payloads
    ///
    /// The minimum buffer is 1 (clamped).
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Per-subscription buffer size
    #[must_use]
    pub fn buffer(&self) -> usize {
        self.buffer
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl<P> Store<P> for MemoryStore<P>
where
    P: Clone + Send + 'static,
{
    async fn publish(&self, payload: P) -> std::result::Result<(), StoreError> {
        let targets: Vec<Subscription<P>> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for Subscription { tx, cancel } in targets {
            match tx.try_send(payload.clone()) {
                Ok(()) => {}
                // Full buffer: wait for room off the caller's path, giving up
                // when the subscription is cancelled.
                Err(mpsc::error::TrySendError::Full(payload)) => {
                    tokio::spawn(async move {
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => {}
                            _ = tx.send(payload) => {}
                        }
                    });
                }
                // Receiver gone; cleanup removes the slot on cancellation.
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        Ok(())
    }

    async fn subscribe(&self, cancel: CancellationToken) -> std::result::Result<PayloadStream<P>, StoreError> {
        let (tx, rx) = mpsc::channel(self.buffer);

        let id = {
            let mut subscriptions = self
                .subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let mut id = Uuid::new_v4();
            while subscriptions.contains_key(&id) {
                id = Uuid::new_v4();
            }
            subscriptions.insert(
                id,
                Subscription {
                    tx,
                    cancel: cancel.clone(),
                },
            );
            id
        };
        debug!(subscription_id = %id, "Memory subscription opened");

        let subscriptions = Arc::clone(&self.subscriptions);
        tokio::spawn(async move {
            cancel.cancelled().await;
            subscriptions
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            debug!(subscription_id = %id, "Memory subscription closed");
        });

        Ok(rx)
    }
}

/// Build an in-memory bus with a fresh store
///
/// # Errors
///
/// Never fails in practice; the signature matches the other transports.
pub async fn new_event<P>(cancel: CancellationToken, buffer: usize) -> Result<Event<P>>
where
    P: Clone + Send + 'static,
{
    Event::new(cancel, MemoryStore::new(buffer)).await
}

#[cfg(test)]
mod tests;
