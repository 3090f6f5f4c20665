/**
 * Routes Module
 * API route handlers plus the response shapes they share.
 */

pub mod blog;
pub mod contact;
pub mod health;
pub mod sitemap;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Validation failure response enumerating the offending fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub fields: BTreeMap<String, String>,
}

pub fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: None,
        }),
    )
        .into_response()
}

pub fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

pub fn database_unavailable() -> Response {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "Database not available")
}

pub fn database_error(context: &str, err: sqlx::Error) -> Response {
    tracing::error!(error = %err, "database error: {}", context);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
}

pub fn validation_failed(fields: BTreeMap<String, String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ValidationErrorResponse {
            error: "Validation failed".to_string(),
            fields,
        }),
    )
        .into_response()
}
