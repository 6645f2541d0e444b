//! Notification and activity endpoints.
//!
//! Reads go straight to the store. Writes are queued and answered with the
//! task ids; the notification worker applies them.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    jobs::payloads::{DeleteNotificationsRequest, MarkAllReadRequest, MarkReadRequest},
    middleware::auth::AuthUser,
    models::{
        notification::{
            Activity, BulkDeleteRequest, Notification, NotificationQuery, QueuedWrite, UnreadCount,
        },
        response::{ApiResponse, PageParams},
    },
    services::{activity_service, notification_service},
    state::AppState,
};

/// `GET /notifications/all?unread_only=true&page=1&limit=20`
pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<ApiResponse<Vec<Notification>>, AppError> {
    let (items, meta) = notification_service::list(&state.pool, auth.id, &query).await?;
    Ok(ApiResponse::paginated("Notifications retrieved", items, meta))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<UnreadCount>, AppError> {
    let unread = notification_service::unread_count(&state.pool, auth.id).await?;
    Ok(ApiResponse::ok("Unread count retrieved", UnreadCount { unread }))
}

/// Queue a mark-read for one notification the caller owns.
///
/// # Errors
///
/// `404` when the notification does not exist or belongs to someone else.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<QueuedWrite>, AppError> {
    notification_service::get(&state.pool, auth.id, id).await?;
    let task_id = state
        .jobs
        .enqueue(&MarkReadRequest {
            id,
            user_id: auth.id,
        })
        .await?;
    Ok(ApiResponse::ok(
        "Notification queued to be marked as read",
        QueuedWrite {
            task_ids: vec![task_id],
        },
    ))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<ApiResponse<QueuedWrite>, AppError> {
    let task_id = state
        .jobs
        .enqueue(&MarkAllReadRequest { user_id: auth.id })
        .await?;
    Ok(ApiResponse::ok(
        "All notifications queued to be marked as read",
        QueuedWrite {
            task_ids: vec![task_id],
        },
    ))
}

/// # Request Body
///
/// ```json
/// { "ids": ["7c0e…", "91aa…"] }
/// ```
///
/// Ids owned by other users are ignored by the worker.
pub async fn delete_bulk(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<ApiResponse<QueuedWrite>, AppError> {
    if request.ids.is_empty() {
        return Err(AppError::Validation("ids must not be empty".to_string()));
    }
    let task_id = state
        .jobs
        .enqueue(&DeleteNotificationsRequest {
            ids: request.ids,
            user_id: Some(auth.id),
        })
        .await?;
    Ok(ApiResponse::ok(
        "Notifications queued for deletion",
        QueuedWrite {
            task_ids: vec![task_id],
        },
    ))
}

pub async fn activities(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageParams>,
) -> Result<ApiResponse<Vec<Activity>>, AppError> {
    let (items, meta) = activity_service::list(&state.pool, auth.id, page).await?;
    Ok(ApiResponse::paginated("Activities retrieved", items, meta))
}
