//! Session-cookie authentication gate
//!
//! The cookie value is a signed, expiring token rather than a server-side
//! session id, so there is no session table to maintain. The middleware only
//! classifies the request (user vs. guest); handlers that need the gate call
//! [`AuthSession::require`].

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "salesboard_session";

/// Sessions expire after 24 hours, matching the cookie lifetime.
const SESSION_TTL_SECS: i64 = 60 * 60 * 24;

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: i64,
    iat: i64,
    exp: i64,
}

/// Authentication result attached to every request by [`session_middleware`].
#[derive(Debug, Clone)]
pub enum AuthSession {
    User { user_id: i64 },
    Guest,
}

impl AuthSession {
    /// The gate in front of administrative endpoints.
    pub fn require(&self) -> Result<i64, ApiError> {
        match self {
            AuthSession::User { user_id } => Ok(*user_id),
            AuthSession::Guest => Err(ApiError::unauthorized("Login required")),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            AuthSession::User { user_id } => Some(*user_id),
            AuthSession::Guest => None,
        }
    }
}

pub fn issue_session_token(
    secret: &str,
    user_id: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let iat = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: user_id,
        iat,
        exp: iat + SESSION_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_session_token(
    secret: &str,
    token: &str,
) -> Result<i64, jsonwebtoken::errors::Error> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims.sub)
}

/// `Set-Cookie` value establishing a session.
pub fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, SESSION_TTL_SECS
    )
}

/// `Set-Cookie` value removing the session cookie.
pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = match cookie_token(request.headers()) {
        Some(token) => match verify_session_token(&state.session_secret, &token) {
            Ok(user_id) => AuthSession::User { user_id },
            Err(err) => {
                tracing::debug!(error = %err, "Rejected session cookie");
                AuthSession::Guest
            }
        },
        None => AuthSession::Guest,
    };

    request.extensions_mut().insert(session);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_roundtrip() {
        let token = issue_session_token("secret", 42).unwrap();
        assert_eq!(verify_session_token("secret", &token).unwrap(), 42);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_session_token("secret", 42).unwrap();
        assert!(verify_session_token("other", &token).is_err());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(verify_session_token("secret", "not-a-token").is_err());
    }

    #[test]
    fn cookie_header_parsing_finds_the_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; salesboard_session=tok123; lang=pt"),
        );
        assert_eq!(cookie_token(&headers).as_deref(), Some("tok123"));

        let mut other = HeaderMap::new();
        other.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(cookie_token(&other), None);
    }

    #[test]
    fn guest_session_is_rejected_by_the_gate() {
        assert!(AuthSession::Guest.require().is_err());
        assert_eq!(AuthSession::User { user_id: 7 }.require().unwrap(), 7);
    }
}
