use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Request,
    },
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();
    match response.extensions().get::<Result<(), ApiError>>() {
        Some(Ok(_)) => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
        Some(Err(value)) if value.is_internal() => error!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %value,
            "Failed to process request"
        ),
        Some(Err(value)) => warn!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            value = %value,
            "Rejected request"
        ),
        None => info!(
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request without outcome extension"
        ),
    }

    response
}

#[derive(Clone, Debug, Error)]
pub enum ApiError {
    #[error("Failed to hash password {0}")]
    PasswordHashFailed(String),
    #[error("Failed to generate token: {0}")]
    TokenGenerationFailed(String),
    #[error("Database error: {0}")]
    DbError(String),
    #[error("Database connection timed out, please retry")]
    DbTimeout,
    #[error("{0}")]
    ValidationFail(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PasswordHashFailed(_)
            | ApiError::TokenGenerationFailed(_)
            | ApiError::DbError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::DbTimeout => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::ValidationFail(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::PasswordHashFailed(_)
                | ApiError::TokenGenerationFailed(_)
                | ApiError::DbError(_)
                | ApiError::DbTimeout
        )
    }

    /// Message shown to the client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::PasswordHashFailed(_)
            | ApiError::TokenGenerationFailed(_)
            | ApiError::DbError(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        let message = err.to_string();
        if is_connection_timeout(&message) {
            ApiError::DbTimeout
        } else {
            ApiError::DbError(message)
        }
    }
}

/// Well-formed JSON of the wrong shape is a validation failure; anything
/// else about the body is a bad request.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => ApiError::ValidationFail(err.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn is_connection_timeout(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("timed out") || message.contains("timeout")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            error!(error = %self, "Action failed");
        }
        to_response(
            (
                self.status(),
                Json(json!({
                    "success": false,
                    "error": self.public_message(),
                })),
            ),
            Err(self),
        )
    }
}

pub fn to_response<T: IntoResponse>(
    response: T,               //The response that we are sending + StatusCode
    ext: Result<(), ApiError>, //The extension, that we want to give logging middleware
) -> Response {
    let mut response = response.into_response();

    response.extensions_mut().insert(ext);

    response
}

/// `{"success": true, "message": ...}` with the given status.
pub fn success(status: StatusCode, message: impl Into<String>) -> Response {
    to_response(
        (
            status,
            Json(json!({
                "success": true,
                "message": message.into(),
            })),
        ),
        Ok(()),
    )
}

/// Same as [`success`], with the created or updated resource under `data`.
pub fn success_with<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Response {
    to_response(
        (
            status,
            Json(json!({
                "success": true,
                "message": message.into(),
                "data": data,
            })),
        ),
        Ok(()),
    )
}

pub fn json_ok<T: Serialize>(data: T) -> Response {
    to_response(Json(data), Ok(()))
}
