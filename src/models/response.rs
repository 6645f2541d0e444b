//! Response envelope and pagination shared by every endpoint.
//!
//! Successful responses look like:
//!
//! ```json
//! { "error": false, "message": "Wallet balance retrieved", "data": { ... } }
//! ```
//!
//! and list endpoints add a `pagination` block.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;
/// Highest page whose offset still fits in an `i64`.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_LIMIT;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
            pagination: None,
            status: StatusCode::OK,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, pagination: PaginationMeta) -> Self {
        Self {
            pagination: Some(pagination),
            ..Self::ok(message, data)
        }
    }
}

impl ApiResponse<()> {
    /// A response with a message and no payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: None,
            pagination: None,
            status: StatusCode::OK,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

/// Page request as sent by clients. Values are clamped, never rejected.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Clamped page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl PageParams {
    /// `page` is clamped to `[1, MAX_PAGE]`, `limit` to `[1, 100]`.
    pub fn clamp(self) -> Page {
        Page {
            page: self.page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }
}

impl Page {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        PaginationMeta {
            page: self.page,
            limit: self.limit,
            total,
            total_pages: if total == 0 {
                0
            } else {
                (total + self.limit - 1) / self.limit
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_above_max_is_clamped() {
        let page = PageParams {
            page: Some(2),
            limit: Some(500),
        }
        .clamp();
        assert_eq!(page, Page { page: 2, limit: 100 });
    }

    #[test]
    fn huge_page_keeps_offset_in_range() {
        let page = PageParams {
            page: Some(i64::MAX),
            limit: Some(100),
        }
        .clamp();
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * 100);

        let raw = Page {
            page: i64::MAX,
            limit: 100,
        };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn page_below_one_is_clamped() {
        let page = PageParams {
            page: Some(0),
            limit: Some(0),
        }
        .clamp();
        assert_eq!(page, Page { page: 1, limit: 1 });
        assert_eq!(PageParams::default().clamp(), Page { page: 1, limit: 20 });
    }

    #[test]
    fn meta_counts_pages() {
        let page = Page { page: 3, limit: 10 };
        assert_eq!(page.offset(), 20);
        assert_eq!(page.meta(0).total_pages, 0);
        assert_eq!(page.meta(10).total_pages, 1);
        assert_eq!(page.meta(11).total_pages, 2);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let value = serde_json::to_value(ApiResponse::message("done")).unwrap();
        assert_eq!(value, serde_json::json!({ "error": false, "message": "done" }));
    }
}
