//! Error types for `gomen-core`.
//!
//! Request-local rejections ([`AuthError`], [`QuotaExceeded`]) are kept apart
//! from [`CoreError`], which covers the few operations that can fail for
//! reasons unrelated to the caller's input.

use std::time::Duration;

/// Why a bearer credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header is absent or not of the form `Bearer <token>`.
    #[error("malformed authorization header")]
    Malformed,

    /// The token's signature does not verify, it cannot be decoded, or it has expired.
    #[error("invalid or expired token")]
    Invalid,
}

/// The caller has used up its quota for the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, retry after {}s", .retry_after.as_secs())]
pub struct QuotaExceeded {
    /// Time remaining until the caller's current window ends.
    pub retry_after: Duration,
}

/// Failures that are not the caller's fault.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Signing a token failed.
    #[error("token encoding failed: {0}")]
    TokenEncoding(String),

    /// The system clock reads before the UNIX epoch.
    #[error("system clock error: {0}")]
    Clock(String),
}

/// Convenience alias used throughout `gomen-core`.
pub type CoreResult<T> = Result<T, CoreError>;
