use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{parse_bearer, Identity};
use crate::error::{AuthError, CoreError, CoreResult};

/// Signed claim set. Timestamps are seconds since the UNIX epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub email: String,
    pub iat: u64,
    pub exp: u64,
}

/// A freshly signed token and its validity bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

/// Issues and verifies HS256 bearer tokens with a single server secret.
///
/// Tokens cannot be revoked; they stop verifying once `now >= exp`.
pub struct TokenAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenAuthenticator {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against our own clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Signs a token for `identity` valid from now for the configured lifetime.
    pub fn issue(&self, identity: &Identity) -> CoreResult<IssuedToken> {
        self.issue_at(identity, now_secs()?)
    }

    /// Signs a token for `identity` as if the current time were `now`.
    pub fn issue_at(&self, identity: &Identity, now: u64) -> CoreResult<IssuedToken> {
        let expires_at = now.saturating_add(self.ttl.as_secs());
        let claims = Claims {
            sub: identity.subject_id,
            email: identity.email.clone(),
            iat: now,
            exp: expires_at,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| CoreError::TokenEncoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            issued_at: now,
            expires_at,
        })
    }

    /// Authenticates a raw `Authorization` header value against the current time.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Identity, AuthError> {
        let now = now_secs().map_err(|e| {
            tracing::error!(error = %e, "cannot read clock while authenticating");
            AuthError::Invalid
        })?;
        self.authenticate_at(header, now)
    }

    /// Authenticates a raw `Authorization` header value as of `now`.
    pub fn authenticate_at(&self, header: Option<&str>, now: u64) -> Result<Identity, AuthError> {
        let token = parse_bearer(header)?;
        let claims = self.verify_at(token, now)?;

        Ok(Identity {
            subject_id: claims.sub,
            email: claims.email,
        })
    }

    /// Checks the signature and expiry of a bare token.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                AuthError::Invalid
            })?
            .claims;

        if now >= claims.exp {
            tracing::debug!(sub = claims.sub, exp = claims.exp, now, "token expired");
            return Err(AuthError::Invalid);
        }

        Ok(claims)
    }
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn now_secs() -> CoreResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| CoreError::Clock(e.to_string()))
}
