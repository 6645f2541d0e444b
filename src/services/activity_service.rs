//! Activity projection: an append-only audit line per user action.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    jobs::{JobClient, JobError, payloads::ActivityJobPayload},
    models::{
        notification::Activity,
        response::{PageParams, PaginationMeta},
    },
};

/// Request provenance attached to activity lines and admin logs.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Natural key of an activity: its content and the instant it happened.
pub fn dedup_key(payload: &ActivityJobPayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.message.as_bytes());
    hasher.update(b"|");
    hasher.update(payload.occurred_at.to_rfc3339().as_bytes());
    hex::encode(hasher.finalize())
}

/// Append an activity row. A redelivered task hits the dedup index.
pub async fn record(pool: &DbPool, payload: &ActivityJobPayload) -> Result<bool, JobError> {
    let result = sqlx::query(
        r#"
        INSERT INTO activities (user_id, message, ip_address, user_agent, dedup_key, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, dedup_key) DO NOTHING
        "#,
    )
    .bind(payload.user_id)
    .bind(payload.message.trim())
    .bind(&payload.ip_address)
    .bind(&payload.user_agent)
    .bind(dedup_key(payload))
    .bind(payload.occurred_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Enqueue an activity line for `user_id`.
pub async fn log(jobs: &JobClient, user_id: Uuid, message: impl Into<String>, meta: &ClientMeta) {
    jobs.dispatch(&ActivityJobPayload {
        user_id,
        message: message.into(),
        ip_address: meta.ip_address.clone(),
        user_agent: meta.user_agent.clone(),
        occurred_at: chrono::Utc::now(),
    })
    .await;
}

pub async fn list(
    pool: &DbPool,
    user_id: Uuid,
    page: PageParams,
) -> Result<(Vec<Activity>, PaginationMeta), AppError> {
    let page = page.clamp();
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query_as::<_, Activity>(
        r#"
        SELECT id, user_id, message, ip_address, user_agent, occurred_at, created_at
        FROM activities
        WHERE user_id = $1
        ORDER BY occurred_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page.meta(total)))
}
