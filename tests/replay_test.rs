use std::sync::{Arc, Barrier};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use gallery_gate::replay::ReplayGuard;

#[test]
fn test_concurrent_presentations_accept_exactly_once() {
    let guard = Arc::new(ReplayGuard::new(1024));
    let barrier = Arc::new(Barrier::new(10));

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let guard = guard.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                guard.record_once("shared-jti", Duration::from_secs(60))
            })
        })
        .collect();

    let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| **r).count(), 1);
    assert_eq!(results.iter().filter(|r| !**r).count(), 9);
    assert_eq!(guard.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_accept_exactly_once() {
    let guard = Arc::new(ReplayGuard::new(1024));

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let guard = guard.clone();
            tokio::spawn(async move { guard.record_once("task-jti", Duration::from_secs(60)) })
        })
        .collect();

    let mut accepted = 0;
    for t in tasks {
        if t.await.unwrap() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}

#[test]
fn test_distinct_ids_independent() {
    let guard = ReplayGuard::new(1024);
    for i in 0..100 {
        assert!(guard.record_once(&format!("jti-{}", i), Duration::from_secs(60)));
    }
    assert_eq!(guard.len(), 100);
}

#[tokio::test]
async fn test_sweeper_evicts_and_stops() {
    let guard = Arc::new(ReplayGuard::new(1024));
    guard.record_once("old-1", Duration::from_millis(10));
    guard.record_once("old-2", Duration::from_millis(10));
    guard.record_once("live", Duration::from_secs(60));

    let cancel = CancellationToken::new();
    let handle = guard.spawn_sweeper(Duration::from_millis(20), cancel.clone());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(guard.len(), 1);
    assert!(!guard.record_once("live", Duration::from_secs(60)));

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper did not stop")
        .unwrap();
}
