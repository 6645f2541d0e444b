//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    /// Tasks waiting across all queues; `null` if the broker did not answer.
    pub queued_tasks: Option<i64>,
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "connected",
///   "queued_tasks": 3,
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// If the database is unreachable, returns the standard 500 error envelope.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    let queued_tasks = match state.inspector.queues().await {
        Ok(queues) => Some(queues.iter().map(|q| q.pending).sum()),
        Err(e) => {
            tracing::warn!(error = %e, "Queue stats unavailable");
            None
        }
    };

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: "connected".to_string(),
        queued_tasks,
        timestamp: Utc::now(),
    }))
}
