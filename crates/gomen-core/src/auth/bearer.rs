use crate::error::AuthError;

const SCHEME: &str = "Bearer";

/// Extracts the token from an `Authorization` header value.
///
/// The value is split on single spaces and must yield exactly `Bearer` and a
/// non-empty token. Anything else, including a missing header, is
/// [`AuthError::Malformed`].
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::Malformed)?;
    let mut parts = header.split(' ');

    match (parts.next(), parts.next(), parts.next()) {
        (Some(SCHEME), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::Malformed),
    }
}
