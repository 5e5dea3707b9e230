//! Store contract
//!
//! A [`Store`] is the transport behind an [`Event`](crate::Event). It has two
//! jobs: accept published payloads, and hand out subscriptions that yield
//! those payloads back.
//!
//! ## Contract
//!
//! - `subscribe` is called once per Event, at construction. Each call yields
//!   an independent stream.
//! - The stream is closed by the store when the token passed to `subscribe`
//!   is cancelled. Transport resources are released no later than that.
//! - `publish` may run concurrently with other `publish` calls and with the
//!   stream being drained.
//! - Delivery strength is store-defined; the bus assumes only "eventually
//!   delivered if the store is healthy".

use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Stream of payloads produced by [`Store::subscribe`].
///
/// Closed (returns `None` from `recv`) once the subscription ends.
pub type PayloadStream<P> = mpsc::Receiver<P>;

/// Transport abstraction for the event bus
#[async_trait]
pub trait Store<P>: Send + Sync + 'static
where
    P: Send + 'static,
{
    /// Hand a payload to the transport
    async fn publish(&self, payload: P) -> Result<(), StoreError>;

    /// Open a subscription scoped to `cancel`
    ///
    /// The returned stream must be closed once `cancel` fires.
    async fn subscribe(&self, cancel: CancellationToken) -> Result<PayloadStream<P>, StoreError>;
}

#[async_trait]
impl<P, S> Store<P> for Arc<S>
where
    P: Send + 'static,
    S: Store<P> + ?Sized,
{
    async fn publish(&self, payload: P) -> Result<(), StoreError> {
        (**self).publish(payload).await
    }

    async fn subscribe(&self, cancel: CancellationToken) -> Result<PayloadStream<P>, StoreError> {
        (**self).subscribe(cancel).await
    }
}
