
use super::*;
use eventbus_core::handler_fn;
use std::sync::Mutex;
use std::time::Duration;

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[test]
fn test_buffer_is_clamped() {
    let store = MemoryStore::<String>::new(0);
    assert_eq!(store.buffer(), 1);
    assert_eq!(MemoryStore::<String>::default().buffer(), DEFAULT_BUFFER);
}

#[tokio::test]
async fn test_publish_without_subscribers() {
    let store = MemoryStore::<u32>::new(4);
    tokio_test::assert_ok!(store.publish(1).await);
    assert_eq!(store.subscription_count(), 0);
}

#[tokio::test]
async fn test_subscribe_receives_published_payloads() {
    let store = MemoryStore::new(4);
    let cancel = CancellationToken::new();
    let mut rx = store.subscribe(cancel.clone()).await.unwrap();
    assert_eq!(store.subscription_count(), 1);

    store.publish("a".to_string()).await.unwrap();
    store.publish("b".to_string()).await.unwrap();

    assert_eq!(rx.recv().await.as_deref(), Some("a"));
    assert_eq!(rx.recv().await.as_deref(), Some("b"));
    cancel.cancel();
}

#[tokio::test]
async fn test_each_subscription_gets_a_copy() {
    let store = MemoryStore::new(4);
    let cancel = CancellationToken::new();
    let mut first = store.subscribe(cancel.clone()).await.unwrap();
    let mut second = store.subscribe(cancel.clone()).await.unwrap();
    assert_eq!(store.subscription_count(), 2);

    store.publish(7u64).await.unwrap();

    assert_eq!(first.recv().await, Some(7));
    assert_eq!(second.recv().await, Some(7));
    cancel.cancel();
}

#[tokio::test]
async fn test_cancellation_closes_stream_and_frees_slot() {
    let store = MemoryStore::<String>::new(4);
    let cancel = CancellationToken::new();
    let mut rx = store.subscribe(cancel.clone()).await.unwrap();

    cancel.cancel();

    let closed = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert!(closed.is_none());
    assert_eq!(store.subscription_count(), 0);

    // Publishing after teardown reaches nobody and still succeeds.
    store.publish("late".to_string()).await.unwrap();
}

#[tokio::test]
async fn test_cancelling_one_subscription_keeps_others() {
    let store = MemoryStore::new(4);
    let keep = CancellationToken::new();
    let drop_token = CancellationToken::new();
    let mut kept = store.subscribe(keep.clone()).await.unwrap();
    let _dropped = store.subscribe(drop_token.clone()).await.unwrap();

    drop_token.cancel();
    wait_until(|| store.subscription_count() == 1).await;

    store.publish(1u8).await.unwrap();
    assert_eq!(kept.recv().await, Some(1));
    keep.cancel();
}

#[tokio::test]
async fn test_full_buffer_does_not_block_publisher() {
    let store = MemoryStore::new(1);
    let cancel = CancellationToken::new();
    let mut rx = store.subscribe(cancel.clone()).await.unwrap();

    let publishing = async {
        for n in 0..10u32 {
            store.publish(n).await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(1), publishing)
        .await
        .expect("publish blocked on a full buffer");

    let mut got = Vec::new();
    for _ in 0..10 {
        got.push(rx.recv().await.unwrap());
    }
    got.sort_unstable();
    assert_eq!(got, (0..10).collect::<Vec<_>>());
    cancel.cancel();
}

#[tokio::test]
async fn test_cancellation_discards_pending_overflow() {
    let store = MemoryStore::new(1);
    let cancel = CancellationToken::new();
    let mut rx = store.subscribe(cancel.clone()).await.unwrap();

    // One payload fills the buffer, the other three wait for room.
    for n in 0..4u32 {
        tokio_test::assert_ok!(store.publish(n).await);
    }

    cancel.cancel();
    wait_until(|| store.subscription_count() == 0).await;

    let mut got = Vec::new();
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(n) = rx.recv().await {
            got.push(n);
        }
    })
    .await;

    assert!(drained.is_ok(), "stream stayed open after cancellation");
    assert_eq!(got, vec![0]);
}

#[tokio::test]
async fn test_new_event_round_trip() {
    let cancel = CancellationToken::new();
    let bus = new_event::<String>(cancel.clone(), 8).await.unwrap();

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    bus.register_handler(
        "sink",
        handler_fn(move |payload: String| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(payload);
            }
        }),
    )
    .unwrap();

    bus.publish("hello".to_string()).await.unwrap();
    wait_until(|| received.lock().unwrap().len() == 1).await;
    assert_eq!(*received.lock().unwrap(), vec!["hello".to_string()]);

    cancel.cancel();
    wait_until(|| bus.is_closed()).await;
}

#[tokio::test]
async fn test_buses_sharing_a_store_all_deliver() {
    let store = MemoryStore::<String>::new(8);
    let cancel = CancellationToken::new();
    let first = Event::new(cancel.clone(), store.clone()).await.unwrap();
    let second = Event::new(cancel.clone(), store.clone()).await.unwrap();
    assert_eq!(store.subscription_count(), 2);

    let hits = Arc::new(Mutex::new(Vec::new()));
    for (name, bus) in [("first", &first), ("second", &second)] {
        let hits = Arc::clone(&hits);
        bus.register_handler(
            name,
            handler_fn(move |payload: String| {
                let hits = Arc::clone(&hits);
                async move {
                    hits.lock().unwrap().push(format!("{name}:{payload}"));
                }
            }),
        )
        .unwrap();
    }

    first.publish("ping".to_string()).await.unwrap();
    wait_until(|| hits.lock().unwrap().len() == 2).await;

    let mut got = hits.lock().unwrap().clone();
    got.sort();
    assert_eq!(got, vec!["first:ping", "second:ping"]);

    cancel.cancel();
    wait_until(|| store.subscription_count() == 0).await;
}
