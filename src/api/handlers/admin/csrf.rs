//! Double-submit CSRF protection for admin mutations.
//!
//! A random token lives in the readable `admin_csrf` cookie. Clients echo it
//! back in the `x-csrf-token` header; a request is valid only when both are
//! present and equal.

use axum::http::{HeaderMap, HeaderValue, header::InvalidHeaderValue};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

use super::{
    state::AdminConfig,
    utils::{build_cookie, cookie_value},
};

pub const CSRF_COOKIE_NAME: &str = "admin_csrf";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

const CSRF_TOKEN_BYTES: usize = 32;

/// 32 random bytes, base64url without padding (43 chars).
#[must_use]
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Cookie and header must both be present, non-empty and equal.
#[must_use]
pub fn is_request_valid(headers: &HeaderMap) -> bool {
    let Some(cookie) = cookie_value(headers, CSRF_COOKIE_NAME) else {
        return false;
    };
    let Some(header) = headers
        .get(CSRF_HEADER_NAME)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    else {
        return false;
    };
    cookie.as_bytes().ct_eq(header.as_bytes()).into()
}

/// Not `HttpOnly`: page scripts must read it to echo it back.
pub(crate) fn csrf_cookie(
    config: &AdminConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        config,
        CSRF_COOKIE_NAME,
        token,
        false,
        config.session_ttl_seconds(),
    )
}

pub(crate) fn clear_csrf_cookie(config: &AdminConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, CSRF_COOKIE_NAME, "", false, 0)
}
