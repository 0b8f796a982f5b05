mod about;
mod auth_handlers;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{optional_auth, require_auth};
use crate::dto::ApiResponse;
use crate::middleware::cors::cors_layer;
use crate::middleware::rate_limit::rate_limit;
use crate::middleware::recovery::handle_panic;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The complete application: every route behind the global layers.
pub fn app(state: AppState) -> Router {
    with_global_layers(routes(&state), state)
}

/// Routes under `/api/v1`, each group with its auth mode.
pub fn routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login));

    let protected = Router::new()
        .route(
            "/auth/profile",
            get(auth_handlers::profile).put(auth_handlers::update_profile),
        )
        .route("/auth/change-password", post(auth_handlers::change_password))
        .route("/auth/refresh", post(auth_handlers::refresh))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let optional = Router::new()
        .route("/about", get(about::about))
        .route_layer(from_fn_with_state(state.clone(), optional_auth));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", public.merge(protected).merge(optional))
}

/// Wraps `router` so that, outermost first: tracing, panic recovery, CORS,
/// body limit, then rate limiting run before any route.
pub fn with_global_layers(router: Router<AppState>, state: AppState) -> Router {
    router
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(&state.config.cors))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(
        "OK",
        serde_json::json!({ "status": "healthy" }),
    ))
}
