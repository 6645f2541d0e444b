//! Admin operations: audit log, dashboard figures and user lifecycle.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        admin_log::{AdminActor, AdminLog, CurrencyBalance, DashboardStats, UserListRequest},
        response::{PageParams, PaginationMeta},
        user::{User, UserResponse},
    },
    services::transaction_store,
};

/// Append an AdminLog row inside the caller's database transaction.
pub async fn record_action(
    conn: &mut PgConnection,
    actor: &AdminActor,
    action: &str,
    target_type: &str,
    target_id: &str,
    details: serde_json::Value,
) -> Result<AdminLog, AppError> {
    let log = sqlx::query_as::<_, AdminLog>(
        r#"
        INSERT INTO admin_logs (admin_id, action, target_type, target_id, details, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(actor.admin_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(details)
    .bind(&actor.ip_address)
    .bind(&actor.user_agent)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        admin_id = %actor.admin_id,
        action,
        target_type,
        target_id,
        "Admin action recorded"
    );
    Ok(log)
}

pub async fn dashboard(pool: &DbPool) -> Result<DashboardStats, AppError> {
    let (total_users, verified_users, blocked_users): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*),
            COUNT(*) FILTER (WHERE is_verified),
            COUNT(*) FILTER (WHERE is_blocked)
        FROM users
        WHERE deleted_at IS NULL AND NOT is_admin
        "#,
    )
    .fetch_one(pool)
    .await?;

    let stats = transaction_store::stats(pool, None).await?;

    let balances = sqlx::query_as::<_, CurrencyBalance>(
        r#"
        SELECT currency, COALESCE(SUM(balance), 0) AS total_balance
        FROM wallets
        GROUP BY currency
        ORDER BY currency
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(DashboardStats {
        total_users,
        verified_users,
        blocked_users,
        pending_transactions: stats.pending,
        completed_transactions: stats.completed,
        failed_transactions: stats.failed,
        volume: stats.volume,
        balances,
    })
}

/// Users, newest first, with optional search over name and email.
pub async fn list_users(
    pool: &DbPool,
    request: &UserListRequest,
) -> Result<(Vec<UserResponse>, PaginationMeta), AppError> {
    let page = PageParams {
        page: request.page,
        limit: request.limit,
    }
    .clamp();
    let search = request
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM users
        WHERE deleted_at IS NULL
          AND ($1::text IS NULL OR full_name ILIKE $1 OR email ILIKE $1)
          AND ($2::boolean IS NULL OR is_blocked = $2)
        "#,
    )
    .bind(&search)
    .bind(request.is_blocked)
    .fetch_one(pool)
    .await?;

    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE deleted_at IS NULL
          AND ($1::text IS NULL OR full_name ILIKE $1 OR email ILIKE $1)
          AND ($2::boolean IS NULL OR is_blocked = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(&search)
    .bind(request.is_blocked)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    Ok((
        users.into_iter().map(UserResponse::from).collect(),
        page.meta(total),
    ))
}

/// Block or unblock a user. Admins cannot block themselves.
pub async fn set_blocked(
    pool: &DbPool,
    actor: &AdminActor,
    user_id: Uuid,
    blocked: bool,
) -> Result<UserResponse, AppError> {
    if actor.admin_id == user_id {
        return Err(AppError::Validation(
            "Admins cannot change their own block status".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET is_blocked = $2, updated_at = NOW()
        WHERE id = $1 AND deleted_at IS NULL
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(blocked)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("User".to_string()))?;

    let action = if blocked { "block_user" } else { "unblock_user" };
    record_action(
        &mut tx,
        actor,
        action,
        "user",
        &user.id.to_string(),
        serde_json::json!({ "email": user.email }),
    )
    .await?;

    tx.commit().await?;
    Ok(user.into())
}

/// AdminLog rows for one target, newest first.
pub async fn logs_for_target(
    pool: &DbPool,
    target_type: &str,
    target_id: &str,
) -> Result<Vec<AdminLog>, AppError> {
    let logs = sqlx::query_as::<_, AdminLog>(
        r#"
        SELECT * FROM admin_logs
        WHERE target_type = $1 AND target_id = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(target_type)
    .bind(target_id)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}
