//! Durable work queue (`enqueue`/`dequeue`/`ack`/`nack`/`lease_extend`),
//! backed by a plain table in the same Postgres database as the relational
//! store rather than a separate broker, keeping the external dependency
//! surface to a single system.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::DbError;

#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub task_kind: String,
    pub payload: Value,
    pub attempts: i32,
}

pub struct Queue<'a> {
    pool: &'a PgPool,
}

impl<'a> Queue<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Enqueues a task. If `dedup_key` is set and a queued/leased task with
    /// the same key already exists, the enqueue is silently skipped so an
    /// overlapping tick does not double-enqueue.
    pub async fn enqueue(
        &self,
        task_kind: &str,
        payload: Value,
        dedup_key: Option<&str>,
    ) -> Result<Uuid, DbError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO task_queue (id, task_kind, payload, dedup_key)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (dedup_key) DO NOTHING"#,
        )
        .bind(id)
        .bind(task_kind)
        .bind(&payload)
        .bind(dedup_key)
        .execute(self.pool)
        .await?;
        Ok(id)
    }

    /// Claims the oldest available task using `SELECT ... FOR UPDATE SKIP LOCKED`,
    /// so concurrent workers never observe the same row.
    pub async fn dequeue(&self, lease_seconds: i64) -> Result<Option<Task>, DbError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"SELECT id, task_kind, payload, attempts FROM task_queue
               WHERE status = 'queued' AND available_at <= now()
               ORDER BY available_at
               FOR UPDATE SKIP LOCKED
               LIMIT 1"#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let id: Uuid = row.try_get("id")?;
        let lease_expires_at = Utc::now() + Duration::seconds(lease_seconds);
        sqlx::query(
            "UPDATE task_queue SET status = 'leased', lease_expires_at = $2, attempts = attempts + 1 WHERE id = $1",
        )
        .bind(id)
        .bind(lease_expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Some(Task {
            id,
            task_kind: row.try_get("task_kind")?,
            payload: row.try_get("payload")?,
            attempts: row.try_get::<i32, _>("attempts")? + 1,
        }))
    }

    pub async fn ack(&self, task_id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE task_queue SET status = 'done' WHERE id = $1")
            .bind(task_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Re-queues after a failure, becoming available again after `delay_seconds`
    /// (the exponential backoff interval chosen by the caller).
    pub async fn nack(&self, task_id: Uuid, reason: &str, delay_seconds: i64) -> Result<(), DbError> {
        let available_at = Utc::now() + Duration::seconds(delay_seconds);
        sqlx::query(
            r#"UPDATE task_queue SET status = 'queued', available_at = $2, last_error = $3, lease_expires_at = NULL
               WHERE id = $1"#,
        )
        .bind(task_id)
        .bind(available_at)
        .bind(reason)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn lease_extend(&self, task_id: Uuid, extra_seconds: i64) -> Result<(), DbError> {
        sqlx::query("UPDATE task_queue SET lease_expires_at = lease_expires_at + make_interval(secs => $2) WHERE id = $1")
            .bind(task_id)
            .bind(extra_seconds as f64)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Reclaims tasks whose lease expired without a heartbeat. Called by the
    /// periodic sweeper.
    pub async fn reclaim_expired(&self) -> Result<Vec<Uuid>, DbError> {
        let rows = sqlx::query(
            r#"UPDATE task_queue SET status = 'queued', lease_expires_at = NULL
               WHERE status = 'leased' AND lease_expires_at < now()
               RETURNING id"#,
        )
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(|r| Ok(r.try_get("id")?)).collect()
    }

    pub async fn mark_permanently_failed(&self, task_id: Uuid, reason: &str) -> Result<(), DbError> {
        sqlx::query("UPDATE task_queue SET status = 'failed', last_error = $2 WHERE id = $1")
            .bind(task_id)
            .bind(reason)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Marks a not-yet-leased task canceled so a worker never picks it up.
    /// A task already leased keeps running; cancellation of in-flight work
    /// is the handler's own cooperative responsibility, observed at its next
    /// checkpoint.
    pub async fn cancel(&self, task_id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE task_queue SET status = 'canceled' WHERE id = $1 AND status = 'queued'")
            .bind(task_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn status(&self, task_id: Uuid) -> Result<Option<TaskSnapshot>, DbError> {
        let row = sqlx::query("SELECT status, attempts, last_error FROM task_queue WHERE id = $1")
            .bind(task_id)
            .fetch_optional(self.pool)
            .await?;
        row.map(|r| {
            Ok(TaskSnapshot {
                status: r.try_get("status")?,
                attempts: r.try_get("attempts")?,
                last_error: r.try_get("last_error")?,
            })
        })
        .transpose()
    }
}

#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
}

/// Deterministic logical key for a periodic task firing in a given window,
/// used as `dedup_key`.
pub fn window_dedup_key(task_kind: &str, window_start: DateTime<Utc>) -> String {
    format!("{task_kind}:{}", window_start.format("%Y-%m-%dT%H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_stable_within_a_minute_window() {
        let t1 = Utc::now();
        let key1 = window_dedup_key("ingest_daily", t1);
        let key2 = window_dedup_key("ingest_daily", t1);
        assert_eq!(key1, key2);
    }
}
