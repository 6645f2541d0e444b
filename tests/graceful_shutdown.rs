//! Worker pool shutdown against the in-process broker. No database needed.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use jeanpay::jobs::{
    Queue, QueueConfig, TaskMessage, TaskType,
    broker::{Broker, MemoryBroker, TaskState},
    payloads::MarkAllReadRequest,
    registry::HandlerRegistry,
    server::JobServer,
    task::TaskOptions,
};

fn config(concurrency: usize, shutdown_timeout: Duration) -> QueueConfig {
    QueueConfig {
        concurrency,
        poll_interval: Duration::from_millis(10),
        shutdown_timeout,
        ..QueueConfig::default()
    }
}

fn task() -> TaskMessage {
    TaskMessage::new(
        TaskType::NotificationMarkAllRead,
        serde_json::json!({ "user_id": Uuid::nil() }),
        &TaskOptions {
            queue: Some(Queue::Default),
            timeout: Some(Duration::from_secs(30)),
            ..TaskOptions::default()
        },
    )
}

/// Handler that records starts and finishes and takes `work` to run.
fn slow_registry(
    work: Duration,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.handle(move |_: MarkAllReadRequest| {
        let started = started.clone();
        let finished = finished.clone();
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(work).await;
            finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    registry
}

async fn wait_for(counter: &AtomicUsize, target: usize) {
    for _ in 0..500 {
        if counter.load(Ordering::SeqCst) >= target {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("counter stuck at {}", counter.load(Ordering::SeqCst));
}

#[tokio::test]
async fn in_flight_tasks_finish_and_the_rest_stay_queued() {
    let broker = Arc::new(MemoryBroker::new());
    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(broker.enqueue(task()).await.unwrap());
    }

    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let registry = slow_registry(Duration::from_millis(300), started.clone(), finished.clone());
    let server = JobServer::new(broker.clone(), registry, config(3, Duration::from_secs(5)));

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server.run(shutdown.clone()));

    wait_for(&started, 3).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert_eq!(finished.load(Ordering::SeqCst), 3);

    let stats = broker.stats(Queue::Default).await.unwrap();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.pending, 7);
    assert_eq!(stats.active, 0);

    // Completed tasks are dropped from the broker; only the counter remains.
    let gone = ids.iter().filter(|id| broker.task_state(**id).is_none()).count();
    assert_eq!(gone, 3);
}

#[tokio::test]
async fn tasks_outliving_the_drain_window_are_requeued() {
    let broker = Arc::new(MemoryBroker::new());
    let id = broker.enqueue(task()).await.unwrap();

    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let registry = slow_registry(Duration::from_secs(10), started.clone(), finished.clone());
    let server = JobServer::new(broker.clone(), registry, config(1, Duration::from_millis(100)));

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(server.run(shutdown.clone()));

    wait_for(&started, 1).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("server stops within the drain window")
        .unwrap();

    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(broker.task_state(id), Some(TaskState::Pending));

    // A fresh server picks the task up again.
    let dequeued = broker
        .dequeue(Queue::Default, Duration::from_secs(60))
        .await
        .unwrap()
        .map(|task| task.id);
    assert_eq!(dequeued, Some(id));
}
