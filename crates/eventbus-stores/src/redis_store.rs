//! Redis-backed store
//!
//! Payloads are JSON-encoded and sent with `PUBLISH` to a single named
//! channel. Each subscription opens its own pub/sub connection and forwards
//! decoded messages into the returned stream.
//!
//! # Delivery
//!
//! Redis pub/sub is at-most-once: subscribers that are not connected when a
//! message is published never see it. Messages that fail to decode are logged
//! and skipped.
//!
//! # Resources
//!
//! The pub/sub connection lives inside the forwarding task and is dropped on
//! every exit path (cancellation, broker disconnect, receiver gone), which
//! also closes the stream.

use async_trait::async_trait;
use eventbus_core::{Event, PayloadStream, Result, Store, StoreError};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio::sync::{mpsc, OnceCell};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Default capacity of the stream between the pub/sub connection and the bus
pub const DEFAULT_BUFFER: usize = 64;

/// Redis pub/sub store for one channel
pub struct RedisStore<P> {
    client: redis::Client,
    channel: String,
    buffer: usize,
    /// Shared connection for `PUBLISH`, opened on first use
    publisher: OnceCell<redis::aio::MultiplexedConnection>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> std::fmt::Debug for RedisStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("channel", &self.channel)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl<P> RedisStore<P> {
    /// Create a store on `channel` using an existing client
    #[must_use]
    pub fn new(client: redis::Client, channel: impl Into<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
            buffer: DEFAULT_BUFFER,
            publisher: OnceCell::new(),
            _payload: PhantomData,
        }
    }

    /// Create a store from a Redis URL
    ///
    /// # Errors
    ///
    /// Returns error if the Redis URL is invalid
    pub fn open(redis_url: &str, channel: impl Into<String>) -> std::result::Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Transport(format!("invalid Redis URL: {}", e)))?;
        Ok(Self::new(client, channel))
    }

    /// Set the stream capacity used by subscriptions (minimum 1)
    #[must_use]
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Channel name this store publishes to and subscribes on
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn publisher(&self) -> std::result::Result<redis::aio::MultiplexedConnection, StoreError> {
        self.publisher
            .get_or_try_init(|| async {
                self.client
                    .get_multiplexed_async_connection()
                    .await
                    .map_err(|e| StoreError::Transport(format!("Redis connection failed: {}", e)))
            })
            .await
            .cloned()
    }
}

fn encode<P: Serialize>(payload: &P) -> std::result::Result<Vec<u8>, StoreError> {
    serde_json::to_vec(payload).map_err(|e| StoreError::Encoding(e.to_string()))
}

fn decode<P: DeserializeOwned>(bytes: &[u8]) -> std::result::Result<P, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Encoding(e.to_string()))
}

#[async_trait]
impl<P> Store<P> for RedisStore<P>
where
    P: Serialize + DeserializeOwned + Send + 'static,
{
    async fn publish(&self, payload: P) -> std::result::Result<(), StoreError> {
        let bytes = encode(&payload)?;
        let mut conn = self.publisher().await?;

        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&self.channel)
            .arg(bytes)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Transport(format!("Redis PUBLISH failed: {}", e)))?;

        debug!(channel = %self.channel, receivers, "Published payload");
        Ok(())
    }

    async fn subscribe(&self, cancel: CancellationToken) -> std::result::Result<PayloadStream<P>, StoreError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| StoreError::Transport(format!("Redis pub/sub connection failed: {}", e)))?;

        pubsub
            .subscribe(&self.channel)
            .await
            .map_err(|e| StoreError::Transport(format!("Redis SUBSCRIBE failed: {}", e)))?;
        debug!(channel = %self.channel, "Subscribed to Redis channel");

        let (tx, rx) = mpsc::channel(self.buffer);
        let channel = self.channel.clone();

        tokio::spawn(async move {
            let forward = async {
                let mut messages = std::pin::pin!(pubsub.on_message());
                while let Some(msg) = messages.next().await {
                    match decode::<P>(msg.get_payload_bytes()) {
                        Ok(payload) => {
                            if tx.send(payload).await.is_err() {
                                debug!(channel = %channel, "Subscriber dropped, stopping forwarder");
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(channel = %channel, error = %e, "Dropping undecodable Redis message");
                        }
                    }
                }
                error!(channel = %channel, "Redis subscription ended unexpectedly");
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(channel = %channel, "Redis subscription cancelled");
                }
                _ = forward => {}
            }
            // pubsub and tx drop here, closing the stream
        });

        Ok(rx)
    }
}

/// Build a bus on the Redis `channel`
///
/// # Errors
///
/// Returns [`eventbus_core::Error::Subscription`] if the pub/sub connection
/// cannot be established.
pub async fn new_event<P>(
    cancel: CancellationToken,
    client: redis::Client,
    channel: impl Into<String>,
) -> Result<Event<P>>
where
    P: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    Event::new(cancel, RedisStore::new(client, channel)).await
}
