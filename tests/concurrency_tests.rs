//! # Concurrency Tests
//!
//! Rotation accounting, single client construction and the dispatch bound
//! under real contention.

mod common;

use common::{ScriptedClient, SharedClientFactory};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::{Duration, Instant},
};
use tutor_gateway::{ClientCache, Credential, CredentialRotator, DispatchBridge, RotationStrategy};

#[test]
fn test_round_robin_accounting_under_contention() {
    let rotator = Arc::new(CredentialRotator::new(
        ["k1", "k2", "k3", "k4"],
        RotationStrategy::RoundRobin,
        Duration::from_secs(60),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let rotator = rotator.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    assert!(rotator.next_credential().is_some());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = rotator.stats();
    assert_eq!(stats.total_selections, 2000);
    assert_eq!(stats.keys.iter().map(|k| k.usage_count).sum::<u64>(), 2000);
    for key in &stats.keys {
        assert_eq!(key.usage_count, 500, "key {}", key.key_id);
    }
}

#[test]
fn test_lru_accounting_under_contention() {
    for _ in 0..5 {
        let rotator = Arc::new(CredentialRotator::new(
            ["k1", "k2", "k3"],
            RotationStrategy::LeastRecentlyUsed,
            Duration::from_secs(60),
        ));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rotator = rotator.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..300 {
                        rotator.next_credential().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // LRU over a fully available pool is a strict cycle, so 2400 picks
        // split evenly no matter how the threads interleave.
        let stats = rotator.stats();
        assert_eq!(stats.total_selections, 2400);
        let counts: Vec<u64> = stats.keys.iter().map(|k| k.usage_count).collect();
        assert_eq!(counts, vec![800, 800, 800]);
    }
}

#[test]
fn test_client_constructed_once_under_racing_first_use() {
    let factory = SharedClientFactory::slow(ScriptedClient::replying("ok"), Duration::from_millis(50));
    let cache = Arc::new(ClientCache::new(factory.clone()));
    let barrier = Arc::new(Barrier::new(32));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let credential = Credential::new("shared-secret");
                barrier.wait();
                cache.get_or_create(&credential).unwrap()
            })
        })
        .collect();
    let clients: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(factory.constructions.load(Ordering::SeqCst), 1);
    assert_eq!(cache.constructions(), 1);
    assert_eq!(cache.len(), 1);
    assert!(clients.iter().all(|c| Arc::ptr_eq(c, &clients[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispatch_never_exceeds_pool_bound() {
    let bridge = DispatchBridge::new(4);
    let active = Arc::new(AtomicUsize::new(0));
    let observed_max = Arc::new(AtomicUsize::new(0));

    let jobs: Vec<_> = (0..32)
        .map(|i| {
            let bridge = bridge.clone();
            let active = active.clone();
            let observed_max = observed_max.clone();
            tokio::spawn(async move {
                bridge
                    .run(move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        observed_max.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(i)
                    })
                    .await
            })
        })
        .collect();

    let mut results = Vec::new();
    for job in futures::future::join_all(jobs).await {
        results.push(job.unwrap().unwrap());
    }
    results.sort_unstable();

    assert_eq!(results, (0..32).collect::<Vec<_>>());
    assert!(observed_max.load(Ordering::SeqCst) <= 4);
    let stats = bridge.stats();
    assert!(stats.peak_in_flight <= 4);
    assert!(stats.peak_in_flight >= 1);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.completed, 32);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(flavor = "current_thread")]
async fn test_blocking_call_does_not_stall_the_runtime() {
    let bridge = DispatchBridge::new(1);
    let started = Instant::now();

    let slow = bridge.run(|| {
        thread::sleep(Duration::from_millis(300));
        Ok("done")
    });
    let timer = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        started.elapsed()
    };

    let (slow_result, timer_elapsed) = tokio::join!(slow, timer);

    assert_eq!(slow_result.unwrap(), "done");
    assert!(timer_elapsed < Duration::from_millis(250), "timer took {:?}", timer_elapsed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_service_calls_share_one_client_per_key() {
    let client = ScriptedClient::replying("ok");
    let service = Arc::new(common::service_with_document(client.clone()));

    let calls: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let message = tutor_gateway::schemas::ChatMessage {
                    message: format!("question {}", i),
                };
                service.chat(common::SESSION, &message).await
            })
        })
        .collect();
    for call in futures::future::join_all(calls).await {
        call.unwrap().unwrap();
    }

    assert_eq!(client.calls(), 16);
    assert_eq!(service.client_cache().len(), 2);
    assert_eq!(service.get_history(common::SESSION).history.len(), 16);
    assert_eq!(service.rotation_status().stats.total_selections, 16);
}
