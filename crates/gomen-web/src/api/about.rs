use axum::extract::State;
use axum::Json;

use crate::auth::middleware::MaybeUser;
use crate::dto::{AboutResponse, ApiResponse};
use crate::state::AppState;

/// Public endpoint that recognises signed-in callers.
pub async fn about(
    MaybeUser(viewer): MaybeUser,
    State(state): State<AppState>,
) -> Json<ApiResponse<AboutResponse>> {
    let greeting = match &viewer {
        Some(identity) => format!("Welcome back, {}", identity.email),
        None => "Hello, guest".to_string(),
    };

    Json(ApiResponse::ok(
        "About retrieved successfully",
        AboutResponse {
            name: state.config.app.name.clone(),
            env: state.config.app.env.clone(),
            greeting,
            viewer,
        },
    ))
}
