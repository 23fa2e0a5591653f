//! Password login and logout for the admin area.

use axum::{
    Form,
    extract::{Extension, OriginalUri, rejection::FormRejection},
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
        header::{HOST, LOCATION, ORIGIN, REFERER, RETRY_AFTER, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::{fmt, sync::Arc};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use url::Url;
use utoipa::ToSchema;

use super::{
    audit::{AuditEvent, AuditStatus},
    csrf::{clear_csrf_cookie, csrf_cookie, generate_csrf_token},
    session::{clear_session_cookie, derive_session_token, session_cookie},
    state::{AdminConfig, AdminState, DEFAULT_ERROR_PATH, DEFAULT_SUCCESS_PATH, LOGIN_PAGE_PATH},
    utils::client_key,
};

#[derive(ToSchema, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub error_path: Option<String>,
    #[serde(default)]
    pub success_path: Option<String>,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("password", &"[REDACTED]")
            .field("error_path", &self.error_path)
            .field("success_path", &self.success_path)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LoginDenial {
    #[error("too many failed attempts, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },
    #[error("cross-origin request")]
    CrossOrigin,
    #[error("missing Origin and Referer")]
    MissingOrigin,
    #[error("invalid password")]
    InvalidPassword,
    #[error("unreadable login form: {0}")]
    UnreadableForm(StatusCode),
}

impl LoginDenial {
    fn audit_action(self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "admin.login.rate_limited",
            Self::CrossOrigin | Self::MissingOrigin => "admin.login.cross_origin_denied",
            Self::InvalidPassword | Self::UnreadableForm(_) => "admin.login.failed",
        }
    }

    /// Blocked attempts are not counted again.
    fn counts_as_failure(self) -> bool {
        !matches!(self, Self::RateLimited { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OriginCheck {
    SameOrigin,
    CrossOrigin,
    Missing,
}

/// Accept only local absolute paths, otherwise use `fallback`.
pub(crate) fn safe_redirect_path(candidate: Option<&str>, fallback: &str) -> String {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.contains('\\')
                && !path.chars().any(char::is_control) =>
        {
            path.to_string()
        }
        _ => fallback.to_string(),
    }
}

fn with_error_flag(path: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}error=1")
}

fn origin_of(value: &str) -> Option<String> {
    Url::parse(value)
        .ok()
        .map(|url| url.origin().ascii_serialization())
}

/// Origin this server was reached at, from `Host` and the forwarded scheme.
fn request_origin(headers: &HeaderMap, config: &AdminConfig) -> Option<String> {
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    let forwarded = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let scheme = match forwarded {
        Some(scheme) => scheme.to_ascii_lowercase(),
        None if config.secure_cookies() => "https".to_string(),
        None => "http".to_string(),
    };
    origin_of(&format!("{scheme}://{host}"))
}

/// Compare the browser's claimed origin (`Origin`, else `Referer`) with ours.
pub(crate) fn check_origin(headers: &HeaderMap, config: &AdminConfig) -> OriginCheck {
    let header = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    let claimed = match (header(ORIGIN), header(REFERER)) {
        (Some(origin), _) => origin_of(origin),
        (None, Some(referer)) => origin_of(referer),
        (None, None) => return OriginCheck::Missing,
    };
    match (claimed, request_origin(headers, config)) {
        (Some(claimed), Some(expected)) if claimed == expected => OriginCheck::SameOrigin,
        _ => OriginCheck::CrossOrigin,
    }
}

fn password_matches(config: &AdminConfig, presented: &str) -> bool {
    config.password().is_some_and(|secret| {
        presented
            .as_bytes()
            .ct_eq(secret.expose_secret().as_bytes())
            .into()
    })
}

/// Decide a login attempt. Only reads limiter state.
///
/// `form` is the rejection status when the body could not be decoded; such
/// attempts still pass the rate and origin checks first.
fn authorize(
    state: &AdminState,
    client: &str,
    headers: &HeaderMap,
    form: Result<&LoginForm, StatusCode>,
) -> Result<(), LoginDenial> {
    let allowance = state.rate_limiter().check_allowance(client);
    if !allowance.allowed {
        return Err(LoginDenial::RateLimited {
            retry_after_seconds: allowance.retry_after_seconds,
        });
    }

    match check_origin(headers, state.config()) {
        OriginCheck::SameOrigin => {}
        OriginCheck::Missing if !state.config().strict_origin() => {}
        OriginCheck::Missing => return Err(LoginDenial::MissingOrigin),
        OriginCheck::CrossOrigin => return Err(LoginDenial::CrossOrigin),
    }

    let form = form.map_err(LoginDenial::UnreadableForm)?;
    if password_matches(state.config(), &form.password) {
        Ok(())
    } else {
        Err(LoginDenial::InvalidPassword)
    }
}

/// 303 to `location`, falling back to the login page if it is not a valid header.
fn see_other(location: &str) -> Response {
    let location = HeaderValue::from_str(location)
        .unwrap_or_else(|_| HeaderValue::from_static(LOGIN_PAGE_PATH));
    (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response()
}

fn append_cookies(response: &mut Response, cookies: Vec<HeaderValue>) {
    for cookie in cookies {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the success path with session cookies, or to the error path with `?error=1` (also when the body is not a url-encoded form)")
    ),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn login(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Response {
    let client = client_key(&headers);
    let form = form.map(|Form(form)| form).map_err(|rejection| {
        warn!(client = %client, "Unreadable login form: {rejection}");
        rejection.status()
    });
    let (error_path, success_path) = match &form {
        Ok(form) => (
            safe_redirect_path(form.error_path.as_deref(), DEFAULT_ERROR_PATH),
            safe_redirect_path(form.success_path.as_deref(), DEFAULT_SUCCESS_PATH),
        ),
        Err(_) => (
            DEFAULT_ERROR_PATH.to_string(),
            DEFAULT_SUCCESS_PATH.to_string(),
        ),
    };
    let audit = |action: &str, status| {
        AuditEvent::for_request(action, status, &method, uri.path(), &headers)
    };

    if let Err(denial) = authorize(&state, &client, &headers, form.as_ref().map_err(|s| *s)) {
        warn!(client = %client, "Admin login denied: {denial}");
        if denial.counts_as_failure() {
            state.rate_limiter().record_result(&client, false);
        }
        state
            .audit()
            .append(
                audit(denial.audit_action(), AuditStatus::Denied).with_detail(denial.to_string()),
            )
            .await;

        let mut response = see_other(&with_error_flag(&error_path));
        if let LoginDenial::RateLimited {
            retry_after_seconds,
        } = denial
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_seconds));
        }
        return response;
    }

    state.rate_limiter().record_result(&client, true);

    let config = state.config();
    let token = config
        .password()
        .map(|secret| derive_session_token(secret.expose_secret()))
        .unwrap_or_default();
    let cookies = session_cookie(config, &token)
        .and_then(|session| Ok(vec![session, csrf_cookie(config, &generate_csrf_token())?]));
    match cookies {
        Ok(cookies) => {
            info!(client = %client, "Admin login succeeded");
            state
                .audit()
                .append(audit("admin.login.success", AuditStatus::Ok))
                .await;
            let mut response = see_other(&success_path);
            append_cookies(&mut response, cookies);
            response
        }
        Err(err) => {
            error!("Failed to build admin cookies: {err}");
            state
                .audit()
                .append(
                    audit("admin.login.error", AuditStatus::Error).with_detail(err.to_string()),
                )
                .await;
            see_other(&with_error_flag(&error_path))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/logout",
    responses(
        (status = 303, description = "Cookies cleared, redirect to the login page")
    ),
    tag = "admin"
)]
#[instrument(skip_all)]
pub async fn logout(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
) -> Response {
    let audit = |action: &str, status| {
        AuditEvent::for_request(action, status, &method, uri.path(), &headers)
    };
    let config = state.config();

    let denied = match check_origin(&headers, config) {
        OriginCheck::SameOrigin => false,
        OriginCheck::Missing => config.strict_origin(),
        OriginCheck::CrossOrigin => true,
    };
    if denied {
        state
            .audit()
            .append(audit("admin.logout.cross_origin_denied", AuditStatus::Denied))
            .await;
        return see_other(DEFAULT_SUCCESS_PATH);
    }

    let mut response = see_other(LOGIN_PAGE_PATH);
    match (clear_session_cookie(config), clear_csrf_cookie(config)) {
        (Ok(session), Ok(csrf)) => append_cookies(&mut response, vec![session, csrf]),
        (Err(err), _) | (_, Err(err)) => error!("Failed to build cleared cookies: {err}"),
    }
    state
        .audit()
        .append(audit("admin.logout.success", AuditStatus::Ok))
        .await;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_static(*value));
        }
        headers
    }

    #[test]
    fn safe_redirect_path_rejects_external_targets() {
        assert_eq!(safe_redirect_path(Some("/admin/kpis"), "/admin"), "/admin/kpis");
        assert_eq!(safe_redirect_path(Some("//evil.com"), "/admin"), "/admin");
        assert_eq!(safe_redirect_path(Some("https://evil.com"), "/admin"), "/admin");
        assert_eq!(safe_redirect_path(Some("/\\evil.com"), "/admin"), "/admin");
        assert_eq!(safe_redirect_path(Some("/a\r\nb"), "/admin"), "/admin");
        assert_eq!(safe_redirect_path(Some(""), "/admin"), "/admin");
        assert_eq!(safe_redirect_path(None, "/admin/login"), "/admin/login");
    }

    #[test]
    fn with_error_flag_appends_query() {
        assert_eq!(with_error_flag("/admin/login"), "/admin/login?error=1");
        assert_eq!(with_error_flag("/admin/login?next=x"), "/admin/login?next=x&error=1");
    }

    #[test]
    fn same_origin_from_origin_header() {
        let config = AdminConfig::new(None);
        let h = headers(&[("host", "dash.local:8080"), ("origin", "http://dash.local:8080")]);
        assert_eq!(check_origin(&h, &config), OriginCheck::SameOrigin);
    }

    #[test]
    fn referer_used_when_origin_missing() {
        let config = AdminConfig::new(None);
        let h = headers(&[
            ("host", "dash.local"),
            ("referer", "http://dash.local/admin/login?error=1"),
        ]);
        assert_eq!(check_origin(&h, &config), OriginCheck::SameOrigin);

        let h = headers(&[("host", "dash.local"), ("referer", "http://evil.com/x")]);
        assert_eq!(check_origin(&h, &config), OriginCheck::CrossOrigin);
    }

    #[test]
    fn cross_origin_and_scheme_mismatch() {
        let config = AdminConfig::new(None);
        let h = headers(&[("host", "dash.local"), ("origin", "http://evil.com")]);
        assert_eq!(check_origin(&h, &config), OriginCheck::CrossOrigin);

        let h = headers(&[("host", "dash.local"), ("origin", "https://dash.local")]);
        assert_eq!(check_origin(&h, &config), OriginCheck::CrossOrigin);

        let h = headers(&[("host", "dash.local"), ("origin", "null")]);
        assert_eq!(check_origin(&h, &config), OriginCheck::CrossOrigin);
    }

    #[test]
    fn forwarded_proto_and_secure_cookies_pick_scheme() {
        let h = headers(&[
            ("host", "dash.example.com"),
            ("x-forwarded-proto", "https"),
            ("origin", "https://dash.example.com"),
        ]);
        assert_eq!(check_origin(&h, &AdminConfig::new(None)), OriginCheck::SameOrigin);

        let h = headers(&[("host", "dash.example.com"), ("origin", "https://dash.example.com")]);
        let secure = AdminConfig::new(None).with_secure_cookies(true);
        assert_eq!(check_origin(&h, &secure), OriginCheck::SameOrigin);
    }

    #[test]
    fn default_port_is_normalized() {
        let h = headers(&[("host", "dash.local:80"), ("origin", "http://dash.local")]);
        assert_eq!(check_origin(&h, &AdminConfig::new(None)), OriginCheck::SameOrigin);
    }

    #[test]
    fn missing_headers_are_reported() {
        let h = headers(&[("host", "dash.local")]);
        assert_eq!(check_origin(&h, &AdminConfig::new(None)), OriginCheck::Missing);
    }

    #[test]
    fn missing_host_is_cross_origin() {
        let h = headers(&[("origin", "http://dash.local")]);
        assert_eq!(check_origin(&h, &AdminConfig::new(None)), OriginCheck::CrossOrigin);
    }

    #[test]
    fn denial_bookkeeping() {
        let limited = LoginDenial::RateLimited {
            retry_after_seconds: 5,
        };
        assert!(!limited.counts_as_failure());
        assert_eq!(limited.audit_action(), "admin.login.rate_limited");
        assert!(LoginDenial::CrossOrigin.counts_as_failure());
        assert!(LoginDenial::MissingOrigin.counts_as_failure());
        assert_eq!(LoginDenial::InvalidPassword.audit_action(), "admin.login.failed");
        let unreadable = LoginDenial::UnreadableForm(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(unreadable.counts_as_failure());
        assert_eq!(unreadable.audit_action(), "admin.login.failed");
    }

    #[test]
    fn login_form_debug_redacts_password() {
        let form = LoginForm {
            password: "s3cret".to_string(),
            ..LoginForm::default()
        };
        assert!(!format!("{form:?}").contains("s3cret"));
    }
}
