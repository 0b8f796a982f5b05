use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use gomen_core::Identity;

use crate::auth::middleware::AuthUser;
use crate::auth::password;
use crate::config::UserConfig;
use crate::dto::{
    ApiResponse, AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, TokenDto,
    UpdateProfileRequest, UserDto,
};
use crate::error::AppError;
use crate::state::AppState;

const EMAIL_TAKEN: &str = "email already registered";

fn invalid_body(_: JsonRejection) -> AppError {
    AppError::BadRequest("Invalid request body".to_string())
}

fn user_not_found() -> AppError {
    AppError::NotFound("user not found".to_string())
}

fn validated(errors: Vec<String>) -> Result<(), AppError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

async fn hash_off_thread(password: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(hash)
}

async fn verify_off_thread(hash: String, password: String) -> Result<bool, AppError> {
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&hash, &password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    Ok(valid)
}

fn session_for(state: &AppState, user: &UserConfig) -> Result<AuthResponse, AppError> {
    let issued = state
        .authenticator
        .issue(&Identity::new(user.id, user.email.clone()))?;

    Ok(AuthResponse {
        user: UserDto::from(user),
        token: TokenDto::bearer(issued.token, issued.expires_at),
    })
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AppError> {
    let Json(body) = body.map_err(invalid_body)?;
    validated(body.validate())?;

    let email = body.email.trim().to_string();
    // Cheap check first so a taken address does not cost an argon2 hash.
    if state.users.find_by_email(&email).is_some() {
        tracing::warn!(%email, "Registration attempted with existing email");
        return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
    }

    let hash = hash_off_thread(body.password).await?;
    let Some(user) = state.users.register(body.name.trim(), &email, hash) else {
        tracing::warn!(%email, "Registration attempted with existing email");
        return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
    };

    let session = session_for(&state, &user)?;
    tracing::info!(user_id = user.id, email = %user.email, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", session)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;
    validated(body.validate())?;

    let email = body.email.trim().to_string();
    let Some(user) = state.users.find_by_email(&email) else {
        let password = body.password;
        tokio::task::spawn_blocking(move || password::verify_against_dummy(&password))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        tracing::warn!(%email, "Login attempt with unknown email");
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    };

    if !verify_off_thread(user.password_hash.clone(), body.password).await? {
        tracing::warn!(user_id = user.id, %email, "Login attempt with incorrect password");
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    }

    if !user.is_active {
        tracing::warn!(user_id = user.id, %email, "Login attempt on inactive account");
        return Err(AppError::Unauthorized("account is not active".to_string()));
    }

    let session = session_for(&state, &user)?;
    tracing::info!(user_id = user.id, email = %user.email, "User logged in");

    Ok(Json(ApiResponse::ok("Login successful", session)))
}

pub async fn profile(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    let user = state
        .users
        .get(identity.subject_id)
        .ok_or_else(user_not_found)?;

    Ok(Json(ApiResponse::ok(
        "Profile retrieved successfully",
        UserDto::from(&user),
    )))
}

pub async fn update_profile(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserDto>>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;
    validated(body.validate())?;

    let user = state
        .users
        .update_name(identity.subject_id, body.name.trim())
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = user.id, email = %user.email, "User profile updated");

    Ok(Json(ApiResponse::ok(
        "Profile updated successfully",
        UserDto::from(&user),
    )))
}

pub async fn change_password(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;
    validated(body.validate())?;

    let user = state
        .users
        .get(identity.subject_id)
        .ok_or_else(user_not_found)?;

    if !verify_off_thread(user.password_hash.clone(), body.current_password).await? {
        tracing::warn!(
            user_id = user.id,
            email = %user.email,
            "Password change attempt with incorrect current password"
        );
        return Err(AppError::BadRequest(
            "current password is incorrect".to_string(),
        ));
    }

    let hash = hash_off_thread(body.new_password).await?;
    if !state.users.set_password_hash(user.id, hash) {
        return Err(user_not_found());
    }

    tracing::info!(user_id = user.id, email = %user.email, "User password changed");

    Ok(Json(ApiResponse::message("Password changed successfully")))
}

pub async fn refresh(
    AuthUser(identity): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TokenDto>>, AppError> {
    let issued = state.authenticator.issue(&identity)?;

    tracing::debug!(subject_id = identity.subject_id, "Token refreshed");

    Ok(Json(ApiResponse::ok(
        "Token refreshed successfully",
        TokenDto::bearer(issued.token, issued.expires_at),
    )))
}
