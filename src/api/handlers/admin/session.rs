//! Admin session token and cookie.
//!
//! The session token is a pure function of the admin password, so every
//! session is invalidated when the password changes and nothing needs to be
//! stored server side.

use axum::http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{
    state::AdminConfig,
    utils::{build_cookie, cookie_value},
};

pub const SESSION_COOKIE_NAME: &str = "admin_session";
pub const SESSION_TOKEN_PREFIX: &str = "admin-session:";

/// Lowercase hex SHA-256 of `admin-session:` followed by the secret.
#[must_use]
pub fn derive_session_token(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SESSION_TOKEN_PREFIX.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whether `presented` matches the token for `secret`.
///
/// Always false when the secret is unset or nothing was presented.
#[must_use]
pub fn is_valid_session(presented: Option<&str>, secret: Option<&SecretString>) -> bool {
    let (Some(presented), Some(secret)) = (presented, secret) else {
        return false;
    };
    let expected = derive_session_token(secret.expose_secret());
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

pub(crate) fn has_admin_session(headers: &HeaderMap, config: &AdminConfig) -> bool {
    let presented = cookie_value(headers, SESSION_COOKIE_NAME);
    is_valid_session(presented.as_deref(), config.password())
}

pub(crate) fn session_cookie(
    config: &AdminConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        config,
        SESSION_COOKIE_NAME,
        token,
        true,
        config.session_ttl_seconds(),
    )
}

pub(crate) fn clear_session_cookie(
    config: &AdminConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, SESSION_COOKIE_NAME, "", true, 0)
}
