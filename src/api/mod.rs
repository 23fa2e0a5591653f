use crate::{
    api::handlers::{
        admin::{
            AdminConfig, AdminState, AuditLog, InMemoryLoginRateLimiter,
            guard::admin_guard,
            pages,
            state::{LOGIN_PAGE_PATH, PROTECTED_PREFIX},
        },
        not_found,
    },
    store::{EntityGoalsStore, JsonFileStore, KpiStore, ReviewsStore},
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
};
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use utoipa_axum::router::OpenApiRouter;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;

pub use openapi::openapi;

/// Build the API router with all documented routes registered.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Full application: documented API routes, admin pages, the admin guard,
/// request ids and tracing.
#[must_use]
pub fn app(admin_state: Arc<AdminState>, files: JsonFileStore) -> Router {
    let (router, _openapi) = router().split_for_parts();
    router
        .route(PROTECTED_PREFIX, get(pages::dashboard))
        .route(LOGIN_PAGE_PATH, get(pages::login_page))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            admin_state.clone(),
            admin_guard,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(admin_state))
                .layer(Extension(KpiStore::new(files.clone())))
                .layer(Extension(ReviewsStore::new(files.clone())))
                .layer(Extension(EntityGoalsStore::new(files))),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, data_dir: PathBuf, admin_config: AdminConfig) -> Result<()> {
    let files = JsonFileStore::new(data_dir);
    tokio::fs::create_dir_all(files.data_dir())
        .await
        .with_context(|| {
            format!("Failed to create data directory {}", files.data_dir().display())
        })?;

    let admin_state = Arc::new(AdminState::new(
        admin_config,
        Arc::new(InMemoryLoginRateLimiter::new()),
        AuditLog::new(files.clone()),
    ));

    let app = app(admin_state, files);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
