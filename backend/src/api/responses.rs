use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub count: usize,
    pub timestamp: String,
}

impl<T> ApiResponse<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
            timestamp: now(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn item(data: T) -> Self {
        Self::with_count(data, 1)
    }

    pub fn with_count(data: T, count: usize) -> Self {
        Self {
            success: true,
            data,
            count,
            timestamp: now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn cached(self, max_age_seconds: u32) -> Response {
        with_cache_control(max_age_seconds, Json(self))
    }
}

/// Adds a shared-cache revalidation hint to any response.
pub fn with_cache_control(max_age_seconds: u32, body: impl IntoResponse) -> Response {
    let cache_control = format!(
        "public, s-maxage={}, stale-while-revalidate={}",
        max_age_seconds,
        max_age_seconds * 2
    );
    ([(header::CACHE_CONTROL, cache_control)], body).into_response()
}

/// Failure envelope: `{success: false, error, data: []}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.message,
            "data": [],
        });
        (self.status, Json(body)).into_response()
    }
}

pub fn clamp_limit(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max)
}
