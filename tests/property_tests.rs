use bounded_relay::BoundedQueue;
use quickcheck::{QuickCheck, TestResult};
use std::collections::HashMap;

/// Run `counts.len()` producers (producer `p` adds `counts[p]` tagged items)
/// against `consumers` consumers and return what each consumer received
fn run_round(capacity: usize, counts: &[usize], consumers: usize) -> Vec<Vec<(usize, usize)>> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();

    rt.block_on(async {
        let queue = BoundedQueue::bounded(capacity).unwrap();

        let producers: Vec<_> = counts
            .iter()
            .copied()
            .enumerate()
            .map(|(p, count)| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for i in 0..count {
                        queue.add((p, i)).await.unwrap();
                    }
                })
            })
            .collect();

        let consumer_handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    let mut received = Vec::new();
                    while let Some(item) = queue.try_withdraw().await.unwrap() {
                        assert!(queue.len() <= capacity);
                        received.push(item);
                    }
                    received
                })
            })
            .collect();

        for producer in producers {
            producer.await.unwrap();
        }
        queue.complete_adding();

        let mut all = Vec::new();
        for handle in consumer_handles {
            all.push(handle.await.unwrap());
        }
        assert!(queue.is_empty());
        all
    })
}

fn conservation_and_order(capacity: u8, counts: Vec<u8>, consumers: u8) -> TestResult {
    if counts.is_empty() {
        return TestResult::discard();
    }

    let capacity = capacity as usize % 8 + 1;
    let consumers = consumers as usize % 4 + 1;
    let counts: Vec<usize> = counts.iter().take(6).map(|&c| c as usize % 40).collect();

    let received = run_round(capacity, &counts, consumers);

    // Conservation: produced and consumed multisets are equal
    let mut consumed: Vec<(usize, usize)> = received.iter().flatten().copied().collect();
    consumed.sort_unstable();
    let mut produced: Vec<(usize, usize)> = counts
        .iter()
        .enumerate()
        .flat_map(|(p, &count)| (0..count).map(move |i| (p, i)))
        .collect();
    produced.sort_unstable();
    if consumed != produced {
        return TestResult::failed();
    }

    // Each consumer sees any single producer's items in increasing order
    for items in &received {
        let mut last: HashMap<usize, usize> = HashMap::new();
        for &(p, i) in items {
            if let Some(&prev) = last.get(&p) {
                if prev >= i {
                    return TestResult::failed();
                }
            }
            last.insert(p, i);
        }
    }

    TestResult::passed()
}

#[test]
fn prop_conservation_and_per_producer_order() {
    QuickCheck::new()
        .tests(40)
        .quickcheck(conservation_and_order as fn(u8, Vec<u8>, u8) -> TestResult);
}

#[test]
fn test_single_consumer_receives_exact_sequences() {
    let received = run_round(2, &[30, 0, 17], 1);
    assert_eq!(received.len(), 1);

    let mut per_producer: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(p, i) in &received[0] {
        per_producer.entry(p).or_default().push(i);
    }

    assert_eq!(per_producer[&0], (0..30).collect::<Vec<_>>());
    assert!(!per_producer.contains_key(&1));
    assert_eq!(per_producer[&2], (0..17).collect::<Vec<_>>());
}
