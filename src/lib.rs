//! # Opsdash (internal operations dashboard)
//!
//! `opsdash` serves a small password-gated admin area for tracking KPIs and
//! per-entity goals. Data lives in JSON files under a data directory.
//!
//! ## Admin security chain
//!
//! - **Session:** the `admin_session` cookie carries `SHA-256("admin-session:" + secret)`.
//!   Nothing is stored server-side; the token is re-derived on every check, so
//!   rotating `ADMIN_PASSWORD` invalidates every session at once.
//! - **CSRF:** double-submit pattern. A random `admin_csrf` cookie (readable by
//!   client script) must be echoed in the `x-csrf-token` header on mutating API calls.
//! - **Rate limiting:** 8 failed logins per client IP within 10 minutes block
//!   that IP for 15 minutes. The shipped limiter is in-process memory and is
//!   not shared across instances.
//! - **Audit:** security-relevant outcomes are appended to a bounded JSON
//!   journal. Audit failures never fail the request.
//!
//! Without `ADMIN_PASSWORD` every admin route redirects to the login page.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
