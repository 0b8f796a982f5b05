use gomen_core::Identity;
use serde::{Deserialize, Serialize};

use crate::config::UserConfig;

/// Success envelope shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Returns one message per failed rule, or an empty list.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_email(&self.email, &mut errors);
        if self.password.is_empty() {
            errors.push("password is required".to_string());
        }
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_name(&self.name, &mut errors);
        check_email(&self.email, &mut errors);
        check_new_password("password", &self.password, &self.password_confirm, &mut errors);
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: String,
}

impl UpdateProfileRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        check_name(&self.name, &mut errors);
        errors
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub password_confirm: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.current_password.is_empty() {
            errors.push("current_password is required".to_string());
        }
        check_new_password(
            "new_password",
            &self.new_password,
            &self.password_confirm,
            &mut errors,
        );
        errors
    }
}

const NAME_CHARS: std::ops::RangeInclusive<usize> = 2..=100;
const MIN_PASSWORD_CHARS: usize = 6;

fn check_name(name: &str, errors: &mut Vec<String>) {
    let len = name.trim().chars().count();
    if len == 0 {
        errors.push("name is required".to_string());
    } else if !NAME_CHARS.contains(&len) {
        errors.push(format!(
            "name must be between {} and {} characters",
            NAME_CHARS.start(),
            NAME_CHARS.end()
        ));
    }
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    let email = email.trim();
    if email.is_empty() {
        errors.push("email is required".to_string());
    } else if !looks_like_email(email) {
        errors.push("email must be a valid email address".to_string());
    }
}

fn check_new_password(field: &str, password: &str, confirm: &str, errors: &mut Vec<String>) {
    if password.is_empty() {
        errors.push(format!("{field} is required"));
    } else if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.push(format!("{field} must be at least {MIN_PASSWORD_CHARS} characters"));
    }

    if confirm.is_empty() {
        errors.push("password_confirm is required".to_string());
    } else if confirm != password {
        errors.push(format!("password_confirm must match {field}"));
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub is_active: bool,
}

impl From<&UserConfig> for UserDto {
    fn from(user: &UserConfig) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenDto {
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: u64,
}

impl TokenDto {
    pub fn bearer(token: String, expires_at: u64) -> Self {
        Self {
            token,
            token_type: "Bearer",
            expires_at,
        }
    }
}

/// Body returned by login and registration.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserDto,
    #[serde(flatten)]
    pub token: TokenDto,
}

#[derive(Debug, Serialize)]
pub struct AboutResponse {
    pub name: String,
    pub env: String,
    pub greeting: String,
    pub viewer: Option<Identity>,
}
