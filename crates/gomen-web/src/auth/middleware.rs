use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use gomen_core::{AuthError, AuthMode, Identity, TokenAuthenticator};

use crate::error::AppError;
use crate::state::AppState;

/// Rejects the request with 401 unless it carries a valid bearer token.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    guard(AuthMode::Required, &state.authenticator, request, next).await
}

/// Attaches the caller's identity when a valid bearer token is present and
/// lets every request through.
pub async fn optional_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    guard(AuthMode::Optional, &state.authenticator, request, next).await
}

async fn guard(
    mode: AuthMode,
    authenticator: &TokenAuthenticator,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(identity) = resolve_identity(mode, authenticator, request.headers())? {
        tracing::debug!(subject_id = identity.subject_id, "request authenticated");
        request.extensions_mut().insert(identity);
    }
    Ok(next.run(request).await)
}

pub fn resolve_identity(
    mode: AuthMode,
    authenticator: &TokenAuthenticator,
    headers: &HeaderMap,
) -> Result<Option<Identity>, AppError> {
    // An empty header counts as absent.
    let raw = headers
        .get(header::AUTHORIZATION)
        .filter(|value| !value.is_empty());
    let outcome = match raw.map(|v| v.to_str()) {
        Some(Err(_)) => Err(AuthError::Malformed),
        Some(Ok(value)) => authenticator.authenticate(Some(value)),
        None => authenticator.authenticate(None),
    };

    mode.resolve(outcome).map_err(|err| match (err, raw) {
        (AuthError::Malformed, None) => {
            AppError::Unauthorized("Authorization header is required".to_string())
        }
        (err, _) => err.into(),
    })
}

/// The authenticated caller. Only usable on routes behind [`require_auth`].
pub struct AuthUser(pub Identity);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Authorization header is required".to_string()))
    }
}

/// The caller's identity if one was attached by [`optional_auth`].
pub struct MaybeUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<Identity>().cloned()))
    }
}
