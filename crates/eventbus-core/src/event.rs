//! Event - the bus binding one Store to a registry of handlers
//!
//! Construction subscribes to the store and spawns a single dispatch loop.
//! The loop drains the subscription stream and, for every payload, fans it
//! out to a snapshot of the registry, one spawned task per handler.
//!
//! ## Rules
//!
//! - The registry lock is held only to mutate or snapshot the map, never
//!   across an `.await` or a spawn.
//! - Fan-out is launch-and-forget: the loop never waits for a handler.
//! - Handler panics are caught and logged; they never stop the loop.
//! - The loop exits when the stream closes or the construction token is
//!   cancelled, whichever is observed first. Nothing is delivered after that.

use crate::error::{Error, Result};
use crate::handler::{Handler, SharedHandler};
use crate::store::{PayloadStream, Store};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Publish/subscribe bus over a single [`Store`]
///
/// Cloning is cheap; every clone shares the same registry and store.
pub struct Event<P>
where
    P: Send + 'static,
{
    inner: Arc<Inner<P>>,
}

struct Inner<P>
where
    P: Send + 'static,
{
    store: Arc<dyn Store<P>>,
    handlers: RwLock<HashMap<String, SharedHandler<P>>>,
    closed: AtomicBool,
}

impl<P> Clone for Event<P>
where
    P: Send + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> std::fmt::Debug for Event<P>
where
    P: Send + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("handlers", &self.handler_ids())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<P> Event<P>
where
    P: Clone + Send + 'static,
{
    /// Bind a new bus to `store`
    ///
    /// Subscribes immediately. The subscription (and with it the dispatch
    /// loop) lives until `cancel` fires or the store closes the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Subscription`] if the store cannot subscribe. No
    /// background task is started in that case.
    pub async fn new<S>(cancel: CancellationToken, store: S) -> Result<Self>
    where
        S: Store<P>,
    {
        let store: Arc<dyn Store<P>> = Arc::new(store);
        let stream = store
            .subscribe(cancel.clone())
            .await
            .map_err(Error::Subscription)?;

        let inner = Arc::new(Inner {
            store,
            handlers: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });

        tokio::spawn(dispatch_loop(Arc::clone(&inner), stream, cancel));
        debug!("Event bus subscribed, dispatch loop started");

        Ok(Self { inner })
    }

    /// Register `handler` under `id`
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyHandlerId`] if `id` is empty
    /// - [`Error::DuplicateHandlerId`] if `id` is taken; the existing handler
    ///   stays registered
    pub fn register_handler<H>(&self, id: impl Into<String>, handler: H) -> Result<()>
    where
        H: Handler<P>,
    {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::EmptyHandlerId);
        }

        let mut handlers = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if handlers.contains_key(&id) {
            return Err(Error::DuplicateHandlerId(id));
        }

        debug!(handler_id = %id, "Handler registered");
        handlers.insert(id, Arc::new(handler));
        Ok(())
    }

    /// Remove the handler registered under `id`
    ///
    /// Absent ids are ignored. Invocations already spawned for the handler
    /// keep running. Returns whether a handler was removed.
    pub fn unregister_handler(&self, id: &str) -> bool {
        let removed = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();

        if removed {
            debug!(handler_id = %id, "Handler unregistered");
        }
        removed
    }

    /// Hand `payload` to the bound store
    ///
    /// Local handlers are not called here; they receive the payload when the
    /// store delivers it back through the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Publish`] wrapping whatever the store reported.
    pub async fn publish(&self, payload: P) -> Result<()> {
        self.inner
            .store
            .publish(payload)
            .await
            .map_err(Error::Publish)
    }
}

impl<P> Event<P>
where
    P: Send + 'static,
{
    /// Number of registered handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.read_handlers(|handlers| handlers.len())
    }

    /// Registered handler ids, sorted
    #[must_use]
    pub fn handler_ids(&self) -> Vec<String> {
        let mut ids = self.read_handlers(|handlers| handlers.keys().cloned().collect::<Vec<_>>());
        ids.sort();
        ids
    }

    /// Whether `id` is currently registered
    #[must_use]
    pub fn contains_handler(&self, id: &str) -> bool {
        self.read_handlers(|handlers| handlers.contains_key(id))
    }

    /// Whether the dispatch loop has stopped
    ///
    /// Once true, no payload will ever be delivered by this bus again.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn read_handlers<T>(&self, f: impl FnOnce(&HashMap<String, SharedHandler<P>>) -> T) -> T {
        let handlers = self
            .inner
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&handlers)
    }
}

impl<P> Inner<P>
where
    P: Send + 'static,
{
    fn snapshot(&self) -> Vec<(String, SharedHandler<P>)> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, handler)| (id.clone(), Arc::clone(handler)))
            .collect()
    }
}

async fn dispatch_loop<P>(
    inner: Arc<Inner<P>>,
    mut stream: PayloadStream<P>,
    cancel: CancellationToken,
) where
    P: Clone + Send + 'static,
{
    loop {
        let payload = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Event bus cancelled, dispatch loop exiting");
                break;
            }
            next = stream.recv() => match next {
                Some(payload) => payload,
                None => {
                    debug!("Subscription stream closed, dispatch loop exiting");
                    break;
                }
            },
        };

        let snapshot = inner.snapshot();
        trace!(handlers = snapshot.len(), "Fanning out payload");

        for (id, handler) in snapshot {
            let payload = payload.clone();
            tokio::spawn(async move {
                let invocation = AssertUnwindSafe(handler.handle(payload)).catch_unwind();
                if let Err(panic) = invocation.await {
                    warn!(
                        handler_id = %id,
                        panic = %panic_message(panic.as_ref()),
                        "Handler panicked"
                    );
                }
            });
        }
    }

    drop(stream);
    inner.closed.store(true, Ordering::SeqCst);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
