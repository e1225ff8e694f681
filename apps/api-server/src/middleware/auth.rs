//! Bearer token resolution for per-user rate limit keys.

use actix_web::{HttpRequest, http::header};

use turnstile_core::ports::{AuthError, TokenService};

/// Extract the Bearer token from the Authorization header.
fn bearer_token(req: &HttpRequest) -> Result<&str, AuthError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?;

    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidToken("Invalid authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidToken("Expected Bearer token".to_string()))
}

/// The authenticated user id, or `None` for anonymous callers.
///
/// An invalid or expired token is treated as anonymous: the request is keyed
/// by source address and any auth failure is left to the handler.
pub fn bearer_user_id(req: &HttpRequest, tokens: &dyn TokenService) -> Option<String> {
    let token = bearer_token(req).ok()?;

    match tokens.validate_token(token) {
        Ok(claims) => Some(claims.user_id.to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring invalid bearer token");
            None
        }
    }
}
