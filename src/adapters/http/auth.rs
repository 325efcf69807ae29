//! Credential extraction for the three surfaces.
//!
//! Tokens are opaque to the core beyond their wire prefixes: `csa_` for
//! agents and `cst_` for control users. Web sessions arrive as a JWT via
//! header or cookie; validating the JWT itself is outside the core, so
//! only presence is enforced here.

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Agent;

use super::AppState;

/// Pull the bearer token out of the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticate the calling agent from its `csa_` bearer token.
pub async fn authenticated_agent(state: &AppState, headers: &HeaderMap) -> DomainResult<Agent> {
    let token = bearer_token(headers)
        .ok_or_else(|| DomainError::Unauthorized("missing bearer token".to_string()))?;
    state.registry.authenticate(token).await
}

/// Validate a control-surface `cst_<user_id>_<secret>` token and return
/// the embedded user id.
pub fn control_user(headers: &HeaderMap) -> DomainResult<Uuid> {
    let token = bearer_token(headers)
        .ok_or_else(|| DomainError::Unauthorized("missing bearer token".to_string()))?;
    let rest = token
        .strip_prefix("cst_")
        .ok_or_else(|| DomainError::Unauthorized("malformed control token".to_string()))?;
    let (user_id, secret) = rest
        .rsplit_once('_')
        .ok_or_else(|| DomainError::Unauthorized("malformed control token".to_string()))?;
    if secret.is_empty() {
        return Err(DomainError::Unauthorized("malformed control token".to_string()));
    }
    Uuid::parse_str(user_id)
        .map_err(|_| DomainError::Unauthorized("malformed control token".to_string()))
}

/// Require a web session: a JWT in the Authorization header or a session
/// cookie. Signature checks happen upstream of the core.
pub fn require_web_session(headers: &HeaderMap) -> DomainResult<()> {
    if bearer_token(headers).is_some() {
        return Ok(());
    }
    let has_cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookies| cookies.split(';').any(|c| c.trim().starts_with("session=")));
    if has_cookie {
        Ok(())
    } else {
        Err(DomainError::Unauthorized("missing session credential".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_strips_the_scheme() {
        let headers = headers_with_auth("Bearer csa_abc_def");
        assert_eq!(bearer_token(&headers), Some("csa_abc_def"));
    }

    #[test]
    fn control_token_embeds_the_user_id() {
        let user_id = Uuid::new_v4();
        let headers = headers_with_auth(&format!("Bearer cst_{user_id}_s3cret"));
        assert_eq!(control_user(&headers).unwrap(), user_id);
    }

    #[test]
    fn agent_tokens_are_rejected_on_the_control_surface() {
        let headers = headers_with_auth("Bearer csa_not_a_control_token");
        assert!(control_user(&headers).is_err());
    }

    #[test]
    fn web_session_accepts_a_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc"));
        assert!(require_web_session(&headers).is_ok());
    }
}
