//! Admin authentication: password login, stateless session cookie,
//! double-submit CSRF, login rate limiting and the security audit log.

pub mod audit;
pub mod csrf;
pub mod guard;
pub mod login;
pub mod pages;
pub mod rate_limit;
pub mod session;
pub mod state;
mod utils;


use axum::{
    http::{HeaderMap, Method, StatusCode},
    response::Response,
};
use tracing::warn;

use super::json_error;

pub use audit::{AuditError, AuditEvent, AuditLog, AuditStatus};
pub use rate_limit::{Allowance, InMemoryLoginRateLimiter, LoginRateLimiter};
pub use session::derive_session_token;
pub use state::{AdminConfig, AdminState};

/// Session and CSRF checks shared by admin JSON endpoints.
///
/// Returns the response to send when the request must be rejected: 401
/// without a session, 403 (audited as `{action}.csrf_failed`) on a CSRF
/// mismatch.
pub(crate) async fn authorize_mutation(
    state: &AdminState,
    method: &Method,
    path: &str,
    headers: &HeaderMap,
    action: &str,
) -> Option<Response> {
    if !session::has_admin_session(headers, state.config()) {
        return Some(json_error(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    if !csrf::is_request_valid(headers) {
        warn!(path, "Rejected admin request with invalid CSRF token");
        state
            .audit()
            .append(AuditEvent::for_request(
                &format!("{action}.csrf_failed"),
                AuditStatus::Denied,
                method,
                path,
                headers,
            ))
            .await;
        return Some(json_error(StatusCode::FORBIDDEN, "Invalid CSRF token"));
    }
    None
}
