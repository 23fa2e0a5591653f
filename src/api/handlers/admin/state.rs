//! Admin configuration and shared state.

use secrecy::{ExposeSecret, SecretString};
use std::{fmt, sync::Arc};

use super::{audit::AuditLog, rate_limit::LoginRateLimiter};

/// Paths under this prefix require an admin session.
pub const PROTECTED_PREFIX: &str = "/admin";
pub const LOGIN_PAGE_PATH: &str = "/admin/login";
pub const DEFAULT_SUCCESS_PATH: &str = "/admin";
pub const DEFAULT_ERROR_PATH: &str = LOGIN_PAGE_PATH;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AdminConfig {
    password: Option<SecretString>,
    secure_cookies: bool,
    strict_origin: bool,
    session_ttl_seconds: u64,
}

impl AdminConfig {
    /// An empty password is treated as unset.
    #[must_use]
    pub fn new(password: Option<SecretString>) -> Self {
        let password = password.filter(|secret| !secret.expose_secret().is_empty());
        Self {
            password,
            secure_cookies: false,
            strict_origin: false,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    #[must_use]
    pub fn with_strict_origin(mut self, strict: bool) -> Self {
        self.strict_origin = strict;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    #[must_use]
    pub fn strict_origin(&self) -> bool {
        self.strict_origin
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> u64 {
        self.session_ttl_seconds
    }

    /// Whether `path` needs a session. The login page itself never does.
    #[must_use]
    pub fn is_protected(path: &str) -> bool {
        path.starts_with(PROTECTED_PREFIX) && path != LOGIN_PAGE_PATH
    }
}

pub struct AdminState {
    config: AdminConfig,
    rate_limiter: Arc<dyn LoginRateLimiter>,
    audit: AuditLog,
}

impl AdminState {
    #[must_use]
    pub fn new(
        config: AdminConfig,
        rate_limiter: Arc<dyn LoginRateLimiter>,
        audit: AuditLog,
    ) -> Self {
        Self {
            config,
            rate_limiter,
            audit,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn LoginRateLimiter {
        self.rate_limiter.as_ref()
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

impl fmt::Debug for AdminState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminState")
            .field("config", &self.config)
            .field("audit", &self.audit)
            .finish_non_exhaustive()
    }
}
