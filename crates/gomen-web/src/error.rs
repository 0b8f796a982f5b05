use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use gomen_core::{AuthError, CoreError, QuotaExceeded};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Validation(Vec<String>),
    TooManyRequests { retry_after_secs: u64 },
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let mut errors = None;

        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(details) => {
                errors = Some(details);
                (StatusCode::UNPROCESSABLE_ENTITY, "Validation failed".to_string())
            }
            AppError::TooManyRequests { retry_after_secs } => {
                retry_after = Some(retry_after_secs);
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            message,
            errors,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let message = match e {
            AuthError::Malformed => "Invalid authorization header format",
            AuthError::Invalid => "Invalid or expired token",
        };
        AppError::Unauthorized(message.to_string())
    }
}

impl From<QuotaExceeded> for AppError {
    fn from(e: QuotaExceeded) -> Self {
        // Round up so clients never retry while still inside the window.
        let secs = e.retry_after.as_secs() + u64::from(e.retry_after.subsec_nanos() > 0);
        AppError::TooManyRequests {
            retry_after_secs: secs.max(1),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", e);
        AppError::Internal("Internal server error".to_string())
    }
}
