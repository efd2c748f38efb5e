use bounded_relay::queue::{BoundedQueue, QueueStats};
use bounded_relay::QueueError;
use futures_util::StreamExt;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_test::task::spawn;
use tokio_test::{assert_pending, assert_ready, assert_ready_ok};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_bounded_queue_basic() {
    let queue = BoundedQueue::bounded(2).unwrap();

    queue.add(1).await.unwrap();
    queue.add(2).await.unwrap();
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.try_add(3), Err(QueueError::Full));

    assert_eq!(queue.try_withdraw().await, Ok(Some(1)));
    assert_eq!(queue.try_withdraw().await, Ok(Some(2)));
    assert!(queue.is_empty());

    // Room again after withdrawing
    queue.add(3).await.unwrap();
    assert_eq!(queue.try_withdraw().await, Ok(Some(3)));
}

#[test]
fn test_zero_capacity_rejected() {
    let result = BoundedQueue::<u32>::bounded(0);
    assert_eq!(result.unwrap_err(), QueueError::InvalidCapacity(0));
}

#[tokio::test]
async fn test_capacity_one_preserves_order() {
    let queue = BoundedQueue::bounded(1).unwrap();

    let producer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            for item in [1, 2, 3] {
                queue.add(item).await.unwrap();
            }
            queue.complete_adding();
        })
    };

    let consumer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(item) = queue.try_withdraw().await.unwrap() {
                seen.push(item);
            }
            seen
        })
    };

    producer.await.unwrap();
    let seen = consumer.await.unwrap();
    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_complete_with_no_items_ends_immediately() {
    let queue = BoundedQueue::<i32>::bounded(4).unwrap();
    assert!(queue.complete_adding());

    let mut withdraw = spawn(queue.try_withdraw());
    assert_eq!(assert_ready!(withdraw.poll()), Ok(None));
}

#[tokio::test]
async fn test_add_after_completion_is_rejected() {
    let queue = BoundedQueue::bounded(5).unwrap();
    queue.add(1).await.unwrap();
    queue.add(2).await.unwrap();
    queue.complete_adding();

    let before = queue.stats();

    assert_eq!(queue.add(3).await, Err(QueueError::AddingCompleted));
    assert_eq!(queue.try_add(4), Err(QueueError::AddingCompleted));

    // State unchanged by the rejected adds
    assert_eq!(queue.stats(), before);
    assert_eq!(queue.metrics().rejected_adds, 2);

    // Existing items are still delivered, then end of stream
    assert_eq!(queue.try_withdraw().await, Ok(Some(1)));
    assert_eq!(queue.try_withdraw().await, Ok(Some(2)));
    assert_eq!(queue.try_withdraw().await, Ok(None));
}

#[tokio::test]
async fn test_complete_adding_is_one_shot() {
    let queue = BoundedQueue::<u8>::bounded(1).unwrap();
    assert!(!queue.is_completed());

    assert!(queue.complete_adding());
    assert!(!queue.complete_adding());
    assert!(!queue.complete_adding());
    assert!(queue.is_completed());
}

#[tokio::test]
async fn test_add_suspends_while_full() {
    let queue = BoundedQueue::bounded(1).unwrap();
    queue.add("first").await.unwrap();

    let mut blocked = spawn(queue.add("second"));
    assert_pending!(blocked.poll());
    assert_pending!(blocked.poll());
    assert_eq!(queue.len(), 1);

    assert_eq!(queue.try_withdraw().await, Ok(Some("first")));
    assert!(blocked.is_woken());
    assert_ready_ok!(blocked.poll());

    assert_eq!(queue.try_withdraw_now(), Some("second"));
    assert!(queue.metrics().add_waits >= 1);
}

#[tokio::test]
async fn test_withdraw_suspends_while_empty() {
    let queue = BoundedQueue::bounded(3).unwrap();

    let mut blocked = spawn(queue.try_withdraw());
    assert_pending!(blocked.poll());

    queue.add(42).await.unwrap();
    assert!(blocked.is_woken());
    assert_eq!(assert_ready!(blocked.poll()), Ok(Some(42)));
}

#[tokio::test]
async fn test_completion_releases_blocked_withdrawers() {
    let queue = BoundedQueue::<u32>::bounded(2).unwrap();

    let mut first = spawn(queue.try_withdraw());
    let mut second = spawn(queue.try_withdraw());
    assert_pending!(first.poll());
    assert_pending!(second.poll());

    queue.complete_adding();

    assert!(first.is_woken());
    assert!(second.is_woken());
    assert_eq!(assert_ready!(first.poll()), Ok(None));
    assert_eq!(assert_ready!(second.poll()), Ok(None));
}

#[tokio::test]
async fn test_completion_releases_blocked_adders() {
    let queue = BoundedQueue::bounded(1).unwrap();
    queue.add(1).await.unwrap();

    let mut blocked = spawn(queue.add(2));
    assert_pending!(blocked.poll());

    queue.complete_adding();

    assert!(blocked.is_woken());
    assert_eq!(assert_ready!(blocked.poll()), Err(QueueError::AddingCompleted));

    // The rejected item never entered the queue
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.stats().produced, 1);
}

#[tokio::test]
async fn test_cancellation_releases_waiters() {
    let token = CancellationToken::new();
    let queue = BoundedQueue::with_cancellation(1, token.clone()).unwrap();
    queue.add(1).await.unwrap();

    let mut adder = spawn(queue.add(2));
    assert_pending!(adder.poll());

    let empty = BoundedQueue::<u32>::with_cancellation(1, token.child_token()).unwrap();
    let mut withdrawer = spawn(empty.try_withdraw());
    assert_pending!(withdrawer.poll());

    token.cancel();

    assert!(adder.is_woken());
    assert!(withdrawer.is_woken());
    assert_eq!(assert_ready!(adder.poll()), Err(QueueError::Cancelled));
    assert_eq!(assert_ready!(withdrawer.poll()), Err(QueueError::Cancelled));

    // Cancellation does not discard queued items
    assert_eq!(queue.len(), 1);
    assert!(queue.is_cancelled());
    assert_eq!(queue.try_withdraw().await, Err(QueueError::Cancelled));
    assert_eq!(queue.try_withdraw_now(), Some(1));
}

#[tokio::test]
async fn test_queue_cancel_method() {
    let queue = BoundedQueue::<u32>::bounded(2).unwrap();
    let mut blocked = spawn(queue.try_withdraw());
    assert_pending!(blocked.poll());

    queue.cancel();

    assert_eq!(assert_ready!(blocked.poll()), Err(QueueError::Cancelled));
    assert!(queue.cancellation_token().is_cancelled());
    assert_eq!(queue.metrics().cancellations, 1);
}

#[tokio::test]
async fn test_consuming_stream() {
    let queue = BoundedQueue::bounded(3).unwrap();
    queue.add("hello").await.unwrap();
    queue.add("world").await.unwrap();
    queue.complete_adding();

    let items: Vec<_> = queue.consuming_stream().collect().await;
    assert_eq!(items, vec!["hello", "world"]);
}

#[tokio::test]
async fn test_consuming_stream_follows_producer() {
    let queue = BoundedQueue::bounded(2).unwrap();

    let producer = {
        let queue = queue.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                queue.add(i).await.unwrap();
            }
            queue.complete_adding();
        })
    };

    let items: Vec<_> = timeout(Duration::from_secs(5), queue.consuming_stream().collect())
        .await
        .expect("stream should end after completion");
    producer.await.unwrap();

    assert_eq!(items, (0..50).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_drain_frees_room() {
    let queue = BoundedQueue::bounded(3).unwrap();
    for i in 0..3 {
        queue.add(i).await.unwrap();
    }

    let mut blocked = spawn(queue.add(99));
    assert_pending!(blocked.poll());

    let drained = queue.drain();
    assert_eq!(drained, vec![0, 1, 2]);
    assert!(blocked.is_woken());
    assert_ready_ok!(blocked.poll());

    let stats = queue.stats();
    assert_eq!(stats.length, 1);
    assert_eq!(stats.produced, 4);
    assert_eq!(stats.consumed, 3);
}

#[tokio::test]
async fn test_queue_stats() {
    let queue = BoundedQueue::bounded(10).unwrap();

    queue.add(1).await.unwrap();
    queue.add(2).await.unwrap();

    let stats = queue.stats();
    assert_eq!(
        stats,
        QueueStats {
            length: 2,
            capacity: 10,
            utilization: 0.2,
            produced: 2,
            consumed: 0,
            is_completed: false,
        }
    );
    assert_eq!(stats.to_string(), "Queue(2/10, 20.0%, produced 2, consumed 0)");

    queue.complete_adding();
    assert!(queue.stats().to_string().ends_with(", completed)"));
}

#[tokio::test]
async fn test_queue_utilities() {
    let queue = BoundedQueue::bounded(10).unwrap();
    assert!(!queue.is_nearly_full(0.8));

    for i in 0..8 {
        queue.add(i).await.unwrap();
    }

    assert!(queue.is_nearly_full(0.7));
    assert_eq!(queue.available_capacity(), 2);
    assert_eq!(queue.len_fast(), 8);
    assert_eq!(queue.capacity(), 10);

    let debug = format!("{:?}", queue);
    assert!(debug.contains("capacity: 10"));
    assert!(debug.contains("length: 8"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_length_never_exceeds_capacity() {
    let capacity = 4;
    let queue = BoundedQueue::bounded(capacity).unwrap();
    let done = Arc::new(AtomicBool::new(false));
    let violations = Arc::new(AtomicUsize::new(0));

    let monitor = {
        let queue = queue.clone();
        let done = done.clone();
        let violations = violations.clone();
        tokio::spawn(async move {
            while !done.load(Ordering::SeqCst) {
                if queue.len() > capacity {
                    violations.fetch_add(1, Ordering::SeqCst);
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let queue = queue.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    queue.add(p * 1000 + i).await.unwrap();
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..3)
        .map(|_| {
            let queue = queue.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                while let Some(item) = queue.try_withdraw().await.unwrap() {
                    seen.push(item);
                }
                seen
            })
        })
        .collect();

    for producer in producers {
        producer.await.unwrap();
    }
    queue.complete_adding();

    let mut all = HashSet::new();
    for consumer in consumers {
        for item in timeout(Duration::from_secs(10), consumer).await.unwrap().unwrap() {
            assert!(all.insert(item), "Item {} was delivered twice", item);
        }
    }

    done.store(true, Ordering::SeqCst);
    monitor.await.unwrap();

    assert_eq!(all.len(), 800);
    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert!(queue.metrics().peak_len <= capacity);
    assert!(queue.is_empty());
}
