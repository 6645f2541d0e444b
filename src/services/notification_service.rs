//! Notification projection.
//!
//! Writes happen only in `notification:*` job handlers; request handlers read
//! rows directly and enqueue writes through [`crate::jobs::JobClient`].

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    jobs::{
        JobError,
        payloads::{
            CreateNotificationRequest, DeleteNotificationsRequest, MarkAllReadRequest,
            MarkReadRequest, UpdateNotificationRequest,
        },
    },
    models::{
        notification::{Notification, NotificationQuery},
        response::{PageParams, PaginationMeta},
    },
};

/// Insert a notification. A replay with the same `dedup_key` is a no-op.
///
/// Returns whether a row was written.
pub async fn insert(pool: &DbPool, request: &CreateNotificationRequest) -> Result<bool, JobError> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, kind, title, message, dedup_key)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, dedup_key) DO NOTHING
        "#,
    )
    .bind(request.user_id)
    .bind(request.kind)
    .bind(request.title.trim())
    .bind(request.message.trim())
    .bind(&request.dedup_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn update(pool: &DbPool, request: &UpdateNotificationRequest) -> Result<(), JobError> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET title = COALESCE($3, title),
            message = COALESCE($4, message),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(request.id)
    .bind(request.user_id)
    .bind(&request.title)
    .bind(&request.message)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(JobError::skip(format!("notification {} not found", request.id)));
    }
    Ok(())
}

/// Delete by id, scoped to the owner unless `user_id` is absent (admin).
pub async fn delete(pool: &DbPool, request: &DeleteNotificationsRequest) -> Result<u64, JobError> {
    let result = match request.user_id {
        Some(user_id) => {
            sqlx::query("DELETE FROM notifications WHERE id = ANY($1) AND user_id = $2")
                .bind(&request.ids)
                .bind(user_id)
                .execute(pool)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
                .bind(&request.ids)
                .execute(pool)
                .await?
        }
    };
    Ok(result.rows_affected())
}

/// `(id, user_id) -> is_read = true`. Zero rows affected is permanent.
pub async fn mark_read(pool: &DbPool, request: &MarkReadRequest) -> Result<(), JobError> {
    let result = sqlx::query(
        r#"
        UPDATE notifications
        SET is_read = true, updated_at = NOW()
        WHERE id = $1 AND user_id = $2 AND NOT is_read
        "#,
    )
    .bind(request.id)
    .bind(request.user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(JobError::skip(format!(
            "notification {} not found or already read",
            request.id
        )));
    }
    Ok(())
}

pub async fn mark_all_read(pool: &DbPool, request: &MarkAllReadRequest) -> Result<u64, JobError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = true, updated_at = NOW() WHERE user_id = $1 AND NOT is_read",
    )
    .bind(request.user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list(
    pool: &DbPool,
    user_id: Uuid,
    query: &NotificationQuery,
) -> Result<(Vec<Notification>, PaginationMeta), AppError> {
    let page = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .clamp();
    let unread_only = query.unread_only.unwrap_or(false);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR NOT is_read)",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query_as::<_, Notification>(
        r#"
        SELECT * FROM notifications
        WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((rows, page.meta(total)))
}

pub async fn unread_count(pool: &DbPool, user_id: Uuid) -> Result<i64, AppError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn get(pool: &DbPool, user_id: Uuid, id: Uuid) -> Result<Notification, AppError> {
    sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification".to_string()))
}
