use std::any::Any;

use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Turns a handler panic into the standard 500 envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::Internal(format!("panic recovered: {detail}")).into_response()
}
