//! Middleware protecting `/admin` pages.

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, error};

use super::{
    csrf::{CSRF_COOKIE_NAME, csrf_cookie, generate_csrf_token},
    session::has_admin_session,
    state::{AdminConfig, AdminState, LOGIN_PAGE_PATH},
    utils::cookie_value,
};

/// Redirect unauthenticated requests for protected pages to the login page.
///
/// Authenticated requests without a CSRF cookie get a fresh one on the
/// response. Everything outside the protected prefix passes through.
pub async fn admin_guard(
    State(state): State<Arc<AdminState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !AdminConfig::is_protected(request.uri().path()) {
        return next.run(request).await;
    }

    if !has_admin_session(request.headers(), state.config()) {
        debug!(path = request.uri().path(), "No admin session, redirecting to login");
        return Redirect::temporary(LOGIN_PAGE_PATH).into_response();
    }

    let needs_csrf = cookie_value(request.headers(), CSRF_COOKIE_NAME).is_none();
    let mut response = next.run(request).await;
    if needs_csrf {
        match csrf_cookie(state.config(), &generate_csrf_token()) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(err) => error!("Failed to build CSRF cookie: {err}"),
        }
    }
    response
}
