//! Integration tests for core-async on the Tokio runtime.

use core_async::scheduler::{Fired, Scheduler, TokioScheduler};
use core_async::{sync, task, time};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_uses_tokio_clock() {
    let start = time::now();
    time::sleep(time::Duration::from_millis(250)).await;
    assert!(time::now() - start >= time::Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_sleep_until_deadline() {
    let deadline = time::now() + time::Duration::from_millis(1500);
    time::sleep_until(deadline).await;
    assert!(time::now() >= deadline);
}

#[tokio::test]
async fn test_cancellation_token() {
    let token = sync::CancellationToken::new();
    let child = token.clone();

    let waiter = task::spawn(async move {
        child.cancelled().await;
        "stopped"
    });

    token.cancel();
    assert_eq!(waiter.await.unwrap(), "stopped");
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_posts_onto_queue_in_deadline_order() {
    let (tx, mut rx) = sync::mpsc::unbounded_channel();
    let scheduler: Arc<dyn Scheduler<&'static str>> =
        Arc::new(TokioScheduler::new(move |fired: Fired<&'static str>| {
            let _ = tx.send(fired);
        }));

    scheduler.schedule(time::Duration::from_millis(1500), "endpoint");
    scheduler.schedule(time::Duration::from_millis(250), "tick");

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.payload, "tick");
    assert_eq!(second.payload, "endpoint");
    assert!(scheduler.acknowledge(first.id));
    assert!(scheduler.acknowledge(second.id));
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_in_flight_cancel_is_rejected_on_acknowledge() {
    let (tx, mut rx) = sync::mpsc::unbounded_channel();
    let scheduler = TokioScheduler::new(move |fired: Fired<()>| {
        let _ = tx.send(fired);
    });

    let id = scheduler.schedule(time::Duration::from_millis(10), ());
    let fired = rx.recv().await.unwrap();

    // The queue owner processes a command that cancels the timer before it
    // gets around to the fired value.
    assert!(scheduler.cancel(id));
    assert!(!scheduler.acknowledge(fired.id));
}
