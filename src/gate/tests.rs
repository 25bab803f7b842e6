//! Unit tests for the mutation gate.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn target() -> TargetId {
    TargetId::new("fr-par-1/vm-1").expect("valid identity")
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sections_never_overlap(target: TargetId) {
    let registry = LockRegistry::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let task_registry = registry.clone();
        let task_target = target.clone();
        let task_inside = Arc::clone(&inside);
        let task_peak = Arc::clone(&peak);
        let task_runs = Arc::clone(&runs);
        tasks.push(tokio::spawn(async move {
            let ctx = OperationContext::new();
            task_registry
                .with_exclusive_access(&task_target, &ctx, || async {
                    let now = task_inside.fetch_add(1, Ordering::SeqCst) + 1;
                    task_peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    tokio::task::yield_now().await;
                    task_inside.fetch_sub(1, Ordering::SeqCst);
                    task_runs.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .expect("gate acquired");
        }));
    }
    for task in tasks {
        task.await.expect("task joined");
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(runs.load(Ordering::SeqCst), 16);
    assert!(!registry.is_locked(&target));
}

#[rstest]
fn distinct_targets_do_not_contend(target: TargetId) {
    let registry = LockRegistry::new();
    let other = TargetId::new("fr-par-1/vm-2").expect("valid identity");

    let held = registry.try_acquire(&target).expect("first target free");
    assert!(registry.is_locked(&target));
    assert!(!registry.is_locked(&other));

    let second = registry.try_acquire(&other);
    assert!(second.is_some());
    assert!(registry.try_acquire(&target).is_none());

    drop(held);
    assert!(!registry.is_locked(&target));
    assert_eq!(registry.len(), 1);
}

#[test]
fn released_identities_leave_the_table() {
    let registry = LockRegistry::new();
    for index in 0..1000 {
        let id = TargetId::new(format!("fr-par-1/vm-{index}")).expect("valid identity");
        let guard = registry.try_acquire(&id).expect("free");
        assert_eq!(registry.len(), 1);
        drop(guard);
    }
    assert!(registry.is_empty());
}

#[rstest]
#[tokio::test]
async fn entry_survives_while_a_waiter_is_queued(target: TargetId) {
    let registry = LockRegistry::new();
    let held = registry.try_acquire(&target).expect("free");
    let waiter_registry = registry.clone();
    let waiter_target = target.clone();
    let waiter = tokio::spawn(async move {
        let ctx = OperationContext::new();
        let guard = waiter_registry
            .acquire(&waiter_target, &ctx)
            .await
            .expect("gate acquired");
        waiter_registry.is_locked(guard.target())
    });
    tokio::task::yield_now().await;

    drop(held);
    assert!(waiter.await.expect("task joined"));
    assert!(registry.is_empty());
}

#[rstest]
fn separate_registries_are_independent(target: TargetId) {
    let first = LockRegistry::new();
    let second = LockRegistry::new();
    let _held = first.try_acquire(&target).expect("free");
    assert!(second.try_acquire(&target).is_some());
    assert!(!second.is_locked(&target));
    assert!(first.is_locked(&target));
}

#[rstest]
#[tokio::test]
async fn acquire_is_interrupted_by_cancellation(target: TargetId) {
    let registry = LockRegistry::new();
    let _held = registry.try_acquire(&target).expect("free");
    let ctx = OperationContext::new();
    ctx.cancel();
    let result = registry.acquire(&target, &ctx).await;
    assert!(matches!(result, Err(Interrupted::Cancelled)));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn acquire_gives_up_at_the_deadline(target: TargetId) {
    let registry = LockRegistry::new();
    let _held = registry.try_acquire(&target).expect("free");
    let ctx = OperationContext::with_timeout(Duration::from_secs(30));
    let result = registry.acquire(&target, &ctx).await;
    assert!(matches!(result, Err(Interrupted::DeadlineExceeded)));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn abandoned_waiter_does_not_pin_the_entry(target: TargetId) {
    let registry = LockRegistry::new();
    let held = registry.try_acquire(&target).expect("free");
    let ctx = OperationContext::with_timeout(Duration::from_secs(1));
    let result = registry.acquire(&target, &ctx).await;
    assert!(result.is_err());
    assert_eq!(registry.len(), 1);

    drop(held);
    assert!(registry.is_empty());
}

#[rstest]
#[tokio::test]
async fn gate_is_released_when_the_operation_panics(target: TargetId) {
    let registry = LockRegistry::new();
    let task_registry = registry.clone();
    let task_target = target.clone();
    let joined = tokio::spawn(async move {
        let ctx = OperationContext::new();
        let _unused: Result<(), Interrupted> = task_registry
            .with_exclusive_access(&task_target, &ctx, || async {
                panic!("mutation blew up");
            })
            .await;
    })
    .await;

    assert!(joined.is_err(), "task should have panicked");
    assert!(!registry.is_locked(&target));
    assert!(registry.try_acquire(&target).is_some());
}
