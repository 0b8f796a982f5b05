//! Bearer authentication: header parsing, signed tokens, and the two call modes.
//!
//! [`TokenAuthenticator::authenticate`] is a pure function of its input and
//! the signing secret. Attaching the resulting [`Identity`] to a request is
//! the caller's job; [`AuthMode`] decides what a failure means for that request.

pub mod bearer;
pub mod token;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

pub use bearer::parse_bearer;
pub use token::{Claims, IssuedToken, TokenAuthenticator};

/// Who the caller is, as carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject_id: u64,
    pub email: String,
}

impl Identity {
    pub fn new(subject_id: u64, email: impl Into<String>) -> Self {
        Self {
            subject_id,
            email: email.into(),
        }
    }
}

/// How a route treats an authentication failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Any failure rejects the request before the handler runs.
    Required,
    /// Failures are dropped and the request proceeds anonymously.
    Optional,
}

impl AuthMode {
    /// Maps an authentication outcome to the identity the request carries on.
    ///
    /// Returns `Err` only in [`AuthMode::Required`]; in optional mode every
    /// failure becomes `Ok(None)`.
    pub fn resolve(
        self,
        outcome: Result<Identity, AuthError>,
    ) -> Result<Option<Identity>, AuthError> {
        match (self, outcome) {
            (_, Ok(identity)) => Ok(Some(identity)),
            (AuthMode::Required, Err(err)) => Err(err),
            (AuthMode::Optional, Err(err)) => {
                tracing::debug!(error = %err, "optional auth: continuing anonymously");
                Ok(None)
            }
        }
    }
}
