//! Task storage.
//!
//! The [`Broker`] trait is the seam between the worker pool and where tasks
//! live. [`PgBroker`] keeps them in the `job_tasks` table so pending work
//! survives a restart; [`MemoryBroker`] keeps them in process memory.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::task::TaskMessage;
use super::{BrokerError, Queue};

/// Lifecycle of a stored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Scheduled,
    Active,
    Retry,
    Archived,
    Completed,
}

/// Snapshot of one queue, as reported by the inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue: Queue,
    pub active: i64,
    pub pending: i64,
    pub scheduled: i64,
    pub retry: i64,
    pub archived: i64,
    /// Tasks finished successfully since the queue was last purged.
    pub completed: i64,
    /// Attempts finished, successful or not.
    pub processed: i64,
    /// Attempts that returned an error.
    pub failed: i64,
    pub paused: bool,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn enqueue(&self, task: TaskMessage) -> Result<Uuid, BrokerError>;

    /// Claim the oldest ready task of an unpaused queue and mark it active.
    /// The claim expires after `lease` unless the task is settled first.
    async fn dequeue(&self, queue: Queue, lease: Duration)
    -> Result<Option<TaskMessage>, BrokerError>;

    async fn complete(&self, task: &TaskMessage) -> Result<(), BrokerError>;

    /// Record a failed attempt and schedule the next one.
    async fn retry(
        &self,
        task: &TaskMessage,
        process_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), BrokerError>;

    /// Record a final failure; the task is kept for inspection until
    /// [`Broker::purge_finished`] drops it.
    async fn archive(&self, task: &TaskMessage, error: &str) -> Result<(), BrokerError>;

    /// Put an active task back to pending (forced shutdown).
    async fn requeue(&self, task_id: Uuid) -> Result<(), BrokerError>;

    /// Return tasks whose lease expired to pending. Returns how many.
    async fn recover_expired(&self) -> Result<u64, BrokerError>;

    async fn stats(&self, queue: Queue) -> Result<QueueStats, BrokerError>;

    async fn set_paused(&self, queue: Queue, paused: bool) -> Result<(), BrokerError>;

    /// Drop every non-active task of a queue and reset its counters.
    async fn delete_queue(&self, queue: Queue) -> Result<u64, BrokerError>;

    /// Drop settled tasks that finished more than `age` ago. Returns how many.
    async fn purge_finished(&self, age: Duration) -> Result<u64, BrokerError>;
}

#[derive(Debug)]
struct StoredTask {
    task: TaskMessage,
    state: TaskState,
    lease_expires_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: HashMap<Uuid, StoredTask>,
    paused: HashSet<Queue>,
    processed: HashMap<Queue, i64>,
    failed: HashMap<Queue, i64>,
    completed: HashMap<Queue, i64>,
}

/// In-process broker.
///
/// Completed tasks are dropped on the spot and only counted; archived tasks
/// stay until [`Broker::purge_finished`].
#[derive(Debug, Default)]
pub struct MemoryBroker {
    state: Mutex<MemoryState>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// State of a task, for tests and the inspector. `None` once the task
    /// has completed or been purged.
    pub fn task_state(&self, id: Uuid) -> Option<TaskState> {
        self.lock().tasks.get(&id).map(|t| t.state)
    }
}

fn lease_deadline(lease: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::hours(1))
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn enqueue(&self, task: TaskMessage) -> Result<Uuid, BrokerError> {
        let id = task.id;
        let state = if task.process_at > Utc::now() {
            TaskState::Scheduled
        } else {
            TaskState::Pending
        };
        self.lock().tasks.insert(
            id,
            StoredTask {
                task,
                state,
                lease_expires_at: None,
                finished_at: None,
            },
        );
        Ok(id)
    }

    async fn dequeue(
        &self,
        queue: Queue,
        lease: Duration,
    ) -> Result<Option<TaskMessage>, BrokerError> {
        let mut state = self.lock();
        if state.paused.contains(&queue) {
            return Ok(None);
        }
        let now = Utc::now();
        let next = state
            .tasks
            .values()
            .filter(|t| t.task.queue == queue)
            .filter(|t| {
                matches!(
                    t.state,
                    TaskState::Pending | TaskState::Scheduled | TaskState::Retry
                )
            })
            .filter(|t| t.task.process_at <= now)
            .min_by_key(|t| (t.task.process_at, t.task.enqueued_at))
            .map(|t| t.task.id);

        Ok(next.and_then(|id| {
            state.tasks.get_mut(&id).map(|stored| {
                stored.state = TaskState::Active;
                stored.lease_expires_at = Some(lease_deadline(lease));
                stored.task.clone()
            })
        }))
    }

    async fn complete(&self, task: &TaskMessage) -> Result<(), BrokerError> {
        let mut state = self.lock();
        state.tasks.remove(&task.id);
        *state.processed.entry(task.queue).or_default() += 1;
        *state.completed.entry(task.queue).or_default() += 1;
        Ok(())
    }

    async fn retry(
        &self,
        task: &TaskMessage,
        process_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if let Some(stored) = state.tasks.get_mut(&task.id) {
            stored.state = TaskState::Retry;
            stored.lease_expires_at = None;
            stored.task.retried += 1;
            stored.task.process_at = process_at;
            stored.task.last_error = Some(error.to_string());
        }
        *state.processed.entry(task.queue).or_default() += 1;
        *state.failed.entry(task.queue).or_default() += 1;
        Ok(())
    }

    async fn archive(&self, task: &TaskMessage, error: &str) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if let Some(stored) = state.tasks.get_mut(&task.id) {
            stored.state = TaskState::Archived;
            stored.lease_expires_at = None;
            stored.finished_at = Some(Utc::now());
            stored.task.last_error = Some(error.to_string());
        }
        *state.processed.entry(task.queue).or_default() += 1;
        *state.failed.entry(task.queue).or_default() += 1;
        Ok(())
    }

    async fn requeue(&self, task_id: Uuid) -> Result<(), BrokerError> {
        if let Some(stored) = self.lock().tasks.get_mut(&task_id) {
            if stored.state == TaskState::Active {
                stored.state = TaskState::Pending;
                stored.lease_expires_at = None;
            }
        }
        Ok(())
    }

    async fn recover_expired(&self) -> Result<u64, BrokerError> {
        let now = Utc::now();
        let mut recovered = 0;
        for stored in self.lock().tasks.values_mut() {
            if stored.state == TaskState::Active
                && stored.lease_expires_at.is_some_and(|deadline| deadline < now)
            {
                stored.state = TaskState::Pending;
                stored.lease_expires_at = None;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn stats(&self, queue: Queue) -> Result<QueueStats, BrokerError> {
        let state = self.lock();
        let now = Utc::now();
        let mut stats = QueueStats {
            queue,
            active: 0,
            pending: 0,
            scheduled: 0,
            retry: 0,
            archived: 0,
            completed: state.completed.get(&queue).copied().unwrap_or(0),
            processed: state.processed.get(&queue).copied().unwrap_or(0),
            failed: state.failed.get(&queue).copied().unwrap_or(0),
            paused: state.paused.contains(&queue),
            timestamp: now,
        };
        for stored in state.tasks.values().filter(|t| t.task.queue == queue) {
            match stored.state {
                TaskState::Active => stats.active += 1,
                TaskState::Scheduled if stored.task.process_at > now => stats.scheduled += 1,
                TaskState::Pending | TaskState::Scheduled => stats.pending += 1,
                TaskState::Retry => stats.retry += 1,
                TaskState::Archived => stats.archived += 1,
                TaskState::Completed => {}
            }
        }
        Ok(stats)
    }

    async fn set_paused(&self, queue: Queue, paused: bool) -> Result<(), BrokerError> {
        let mut state = self.lock();
        if paused {
            state.paused.insert(queue);
        } else {
            state.paused.remove(&queue);
        }
        Ok(())
    }

    async fn delete_queue(&self, queue: Queue) -> Result<u64, BrokerError> {
        let mut state = self.lock();
        let before = state.tasks.len();
        state
            .tasks
            .retain(|_, t| t.task.queue != queue || t.state == TaskState::Active);
        state.processed.remove(&queue);
        state.failed.remove(&queue);
        state.completed.remove(&queue);
        Ok((before - state.tasks.len()) as u64)
    }

    async fn purge_finished(&self, age: Duration) -> Result<u64, BrokerError> {
        let Some(cutoff) = chrono::Duration::from_std(age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let mut state = self.lock();
        let before = state.tasks.len();
        state
            .tasks
            .retain(|_, t| !t.finished_at.is_some_and(|at| at <= cutoff));
        Ok((before - state.tasks.len()) as u64)
    }
}

/// Durable broker over the `job_tasks` and `job_queues` tables.
///
/// Workers claim rows with `FOR UPDATE SKIP LOCKED`, so several processes can
/// share the table. A claimed row carries a lease; rows of a crashed worker
/// become pending again once the lease runs out.
#[derive(Debug, Clone)]
pub struct PgBroker {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    queue: String,
    task_type: String,
    payload: serde_json::Value,
    retried: i32,
    max_retry: i32,
    timeout_secs: i64,
    process_at: DateTime<Utc>,
    enqueued_at: DateTime<Utc>,
    last_error: Option<String>,
}

impl TryFrom<TaskRow> for TaskMessage {
    type Error = BrokerError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(TaskMessage {
            id: row.id,
            queue: row.queue.parse()?,
            task_type: row.task_type,
            payload: row.payload,
            retried: u32::try_from(row.retried).unwrap_or(0),
            max_retry: u32::try_from(row.max_retry).unwrap_or(0),
            timeout: Duration::from_secs(u64::try_from(row.timeout_secs).unwrap_or(0)),
            process_at: row.process_at,
            enqueued_at: row.enqueued_at,
            last_error: row.last_error,
        })
    }
}

impl PgBroker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn bump_counters(&self, queue: Queue, failed: bool) -> Result<(), BrokerError> {
        sqlx::query(
            r#"
            INSERT INTO job_queues (name, processed, failed, completed)
            VALUES ($1, 1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET processed = job_queues.processed + 1,
                failed = job_queues.failed + EXCLUDED.failed,
                completed = job_queues.completed + EXCLUDED.completed
            "#,
        )
        .bind(queue.as_str())
        .bind(if failed { 1i64 } else { 0i64 })
        .bind(if failed { 0i64 } else { 1i64 })
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Broker for PgBroker {
    async fn enqueue(&self, task: TaskMessage) -> Result<Uuid, BrokerError> {
        let state = if task.process_at > Utc::now() {
            TaskState::Scheduled
        } else {
            TaskState::Pending
        };
        sqlx::query(
            r#"
            INSERT INTO job_tasks (
                id, queue, task_type, payload, state, retried, max_retry,
                timeout_secs, process_at, enqueued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(task.id)
        .bind(task.queue.as_str())
        .bind(&task.task_type)
        .bind(&task.payload)
        .bind(state)
        .bind(task.retried as i32)
        .bind(task.max_retry as i32)
        .bind(task.timeout.as_secs() as i64)
        .bind(task.process_at)
        .bind(task.enqueued_at)
        .execute(&self.pool)
        .await?;
        Ok(task.id)
    }

    async fn dequeue(
        &self,
        queue: Queue,
        lease: Duration,
    ) -> Result<Option<TaskMessage>, BrokerError> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE job_tasks
            SET state = 'active',
                lease_expires_at = NOW() + make_interval(secs => $2)
            WHERE id = (
                SELECT id FROM job_tasks
                WHERE queue = $1
                  AND state IN ('pending', 'scheduled', 'retry')
                  AND process_at <= NOW()
                  AND NOT EXISTS (
                      SELECT 1 FROM job_queues q WHERE q.name = $1 AND q.paused
                  )
                ORDER BY process_at, enqueued_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, queue, task_type, payload, retried, max_retry,
                      timeout_secs, process_at, enqueued_at, last_error
            "#,
        )
        .bind(queue.as_str())
        .bind(lease.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TaskMessage::try_from).transpose()
    }

    async fn complete(&self, task: &TaskMessage) -> Result<(), BrokerError> {
        sqlx::query(
            "UPDATE job_tasks SET state = 'completed', finished_at = NOW(), lease_expires_at = NULL WHERE id = $1",
        )
        .bind(task.id)
        .execute(&self.pool)
        .await?;
        self.bump_counters(task.queue, false).await
    }

    async fn retry(
        &self,
        task: &TaskMessage,
        process_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), BrokerError> {
        sqlx::query(
            r#"
            UPDATE job_tasks
            SET state = 'retry', retried = retried + 1, process_at = $2,
                last_error = $3, lease_expires_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(process_at)
        .bind(error)
        .execute(&self.pool)
        .await?;
        self.bump_counters(task.queue, true).await
    }

    async fn archive(&self, task: &TaskMessage, error: &str) -> Result<(), BrokerError> {
        sqlx::query(
            "UPDATE job_tasks SET state = 'archived', last_error = $2, finished_at = NOW(), lease_expires_at = NULL WHERE id = $1",
        )
        .bind(task.id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        self.bump_counters(task.queue, true).await
    }

    async fn requeue(&self, task_id: Uuid) -> Result<(), BrokerError> {
        sqlx::query(
            "UPDATE job_tasks SET state = 'pending', lease_expires_at = NULL WHERE id = $1 AND state = 'active'",
        )
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recover_expired(&self) -> Result<u64, BrokerError> {
        let result = sqlx::query(
            "UPDATE job_tasks SET state = 'pending', lease_expires_at = NULL WHERE state = 'active' AND lease_expires_at < NOW()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, queue: Queue) -> Result<QueueStats, BrokerError> {
        let counts: Vec<(TaskState, bool, i64)> = sqlx::query_as(
            r#"
            SELECT state, process_at > NOW() AS future, COUNT(*)
            FROM job_tasks
            WHERE queue = $1
            GROUP BY state, future
            "#,
        )
        .bind(queue.as_str())
        .fetch_all(&self.pool)
        .await?;

        let (processed, failed, completed, paused): (i64, i64, i64, bool) = sqlx::query_as(
            "SELECT processed, failed, completed, paused FROM job_queues WHERE name = $1",
        )
        .bind(queue.as_str())
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or((0, 0, 0, false));

        let mut stats = QueueStats {
            queue,
            active: 0,
            pending: 0,
            scheduled: 0,
            retry: 0,
            archived: 0,
            completed,
            processed,
            failed,
            paused,
            timestamp: Utc::now(),
        };
        for (state, future, count) in counts {
            match state {
                TaskState::Active => stats.active += count,
                TaskState::Scheduled if future => stats.scheduled += count,
                TaskState::Pending | TaskState::Scheduled => stats.pending += count,
                TaskState::Retry => stats.retry += count,
                TaskState::Archived => stats.archived += count,
                TaskState::Completed => {}
            }
        }
        Ok(stats)
    }

    async fn set_paused(&self, queue: Queue, paused: bool) -> Result<(), BrokerError> {
        sqlx::query(
            r#"
            INSERT INTO job_queues (name, paused) VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET paused = EXCLUDED.paused
            "#,
        )
        .bind(queue.as_str())
        .bind(paused)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_queue(&self, queue: Queue) -> Result<u64, BrokerError> {
        let mut tx = self.pool.begin().await?;
        let deleted = sqlx::query("DELETE FROM job_tasks WHERE queue = $1 AND state <> 'active'")
            .bind(queue.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("UPDATE job_queues SET processed = 0, failed = 0, completed = 0 WHERE name = $1")
            .bind(queue.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn purge_finished(&self, age: Duration) -> Result<u64, BrokerError> {
        let result = sqlx::query(
            r#"
            DELETE FROM job_tasks
            WHERE state IN ('completed', 'archived')
              AND finished_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(age.as_secs_f64())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::task::{TaskOptions, TaskType};

    fn task(queue: Queue) -> TaskMessage {
        TaskMessage::new(
            TaskType::ActivityLog,
            serde_json::json!({}),
            &TaskOptions {
                queue: Some(queue),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn dequeue_is_fifo_within_a_queue() {
        let broker = MemoryBroker::new();
        let first = broker.enqueue(task(Queue::Default)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = broker.enqueue(task(Queue::Default)).await.unwrap();

        let lease = Duration::from_secs(60);
        let a = broker.dequeue(Queue::Default, lease).await.unwrap().unwrap();
        let b = broker.dequeue(Queue::Default, lease).await.unwrap().unwrap();
        assert_eq!((a.id, b.id), (first, second));
        assert!(broker.dequeue(Queue::Default, lease).await.unwrap().is_none());
        assert!(broker.dequeue(Queue::Low, lease).await.unwrap().is_none());
        assert_eq!(broker.task_state(first), Some(TaskState::Active));
    }

    #[tokio::test]
    async fn scheduled_tasks_wait_for_their_time() {
        let broker = MemoryBroker::new();
        let mut later = task(Queue::Default);
        later.process_at = Utc::now() + chrono::Duration::hours(1);
        broker.enqueue(later).await.unwrap();

        assert!(
            broker
                .dequeue(Queue::Default, Duration::from_secs(1))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(broker.stats(Queue::Default).await.unwrap().scheduled, 1);
    }

    #[tokio::test]
    async fn paused_queue_is_skipped() {
        let broker = MemoryBroker::new();
        broker.enqueue(task(Queue::High)).await.unwrap();
        broker.set_paused(Queue::High, true).await.unwrap();
        let lease = Duration::from_secs(1);
        assert!(broker.dequeue(Queue::High, lease).await.unwrap().is_none());
        assert!(broker.stats(Queue::High).await.unwrap().paused);

        broker.set_paused(Queue::High, false).await.unwrap();
        assert!(broker.dequeue(Queue::High, lease).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn settle_updates_counters() {
        let broker = MemoryBroker::new();
        broker.enqueue(task(Queue::Low)).await.unwrap();
        broker.enqueue(task(Queue::Low)).await.unwrap();
        let lease = Duration::from_secs(60);

        let a = broker.dequeue(Queue::Low, lease).await.unwrap().unwrap();
        broker.complete(&a).await.unwrap();
        let b = broker.dequeue(Queue::Low, lease).await.unwrap().unwrap();
        broker
            .retry(&b, Utc::now() + chrono::Duration::minutes(5), "boom")
            .await
            .unwrap();

        let stats = broker.stats(Queue::Low).await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(broker.task_state(a.id), None);
        assert_eq!(stats.retry, 1);
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn expired_leases_are_recovered() {
        let broker = MemoryBroker::new();
        let id = broker.enqueue(task(Queue::Default)).await.unwrap();
        broker
            .dequeue(Queue::Default, Duration::from_millis(0))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(broker.recover_expired().await.unwrap(), 1);
        assert_eq!(broker.task_state(id), Some(TaskState::Pending));
    }

    #[tokio::test]
    async fn completed_tasks_are_not_retained() {
        let broker = MemoryBroker::new();
        let lease = Duration::from_secs(60);
        for _ in 0..1000 {
            broker.enqueue(task(Queue::Default)).await.unwrap();
            let claimed = broker.dequeue(Queue::Default, lease).await.unwrap().unwrap();
            broker.complete(&claimed).await.unwrap();
        }

        assert!(broker.lock().tasks.is_empty());
        let stats = broker.stats(Queue::Default).await.unwrap();
        assert_eq!((stats.completed, stats.processed), (1000, 1000));
    }

    #[tokio::test]
    async fn purge_drops_old_archived_tasks_only() {
        let broker = MemoryBroker::new();
        let lease = Duration::from_secs(60);
        let dead = broker.enqueue(task(Queue::Low)).await.unwrap();
        let claimed = broker.dequeue(Queue::Low, lease).await.unwrap().unwrap();
        broker.archive(&claimed, "gone").await.unwrap();
        let waiting = broker.enqueue(task(Queue::Low)).await.unwrap();

        assert_eq!(broker.purge_finished(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(broker.task_state(dead), Some(TaskState::Archived));

        assert_eq!(broker.purge_finished(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(broker.task_state(dead), None);
        assert_eq!(broker.task_state(waiting), Some(TaskState::Pending));
    }

    #[tokio::test]
    async fn delete_queue_keeps_active_tasks() {
        let broker = MemoryBroker::new();
        broker.enqueue(task(Queue::Default)).await.unwrap();
        broker.enqueue(task(Queue::Default)).await.unwrap();
        broker.enqueue(task(Queue::Low)).await.unwrap();
        broker
            .dequeue(Queue::Default, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(broker.delete_queue(Queue::Default).await.unwrap(), 1);
        let stats = broker.stats(Queue::Default).await.unwrap();
        assert_eq!((stats.active, stats.pending), (1, 0));
        assert_eq!(broker.stats(Queue::Low).await.unwrap().pending, 1);
    }
}
