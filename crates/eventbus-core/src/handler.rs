//! Handler capability
//!
//! A [`Handler`] receives every payload the bus delivers while it is
//! registered. Handlers have no way to report failure back to the bus; a
//! handler that can fail is expected to log or forward its own errors.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Callback invoked once per delivered payload
///
/// Each invocation runs on its own spawned task, so a handler may take as long
/// as it likes without delaying other handlers or later payloads.
#[async_trait]
pub trait Handler<P>: Send + Sync + 'static
where
    P: Send + 'static,
{
    /// Process one payload
    async fn handle(&self, payload: P);
}

/// Shared handle stored in the registry
pub type SharedHandler<P> = Arc<dyn Handler<P>>;

/// Adapter turning an async closure into a [`Handler`]
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Wrap a closure
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> std::fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[async_trait]
impl<P, F, Fut> Handler<P> for HandlerFn<F>
where
    P: Send + 'static,
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, payload: P) {
        (self.f)(payload).await;
    }
}

/// Build a shareable handler from an async closure
///
/// ```ignore
/// bus.register_handler("printer", handler_fn(|msg: String| async move {
///     println!("{msg}");
/// }))?;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_handler_fn_invokes_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler = handler_fn(move |n: usize| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(n, Ordering::SeqCst);
            }
        });

        handler.handle(2).await;
        handler.handle(3).await;
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_handler_fn_as_trait_object() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let shared: SharedHandler<String> = Arc::new(handler_fn(move |_: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }));

        shared.handle("x".to_string()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
