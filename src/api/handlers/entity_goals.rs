//! Per-entity goal lists.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, OriginalUri, Query},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{
    admin::{AdminState, AuditEvent, AuditStatus, authorize_mutation, session::has_admin_session},
    json_error,
};
use crate::store::{EntityGoalsStore, hub_by_slug};

#[derive(IntoParams, Deserialize, Debug)]
#[into_params(parameter_in = Query)]
pub struct GoalsQuery {
    /// Entity hub slug, e.g. `pngwn`.
    #[serde(default)]
    slug: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct GoalsUpdate {
    #[serde(default)]
    slug: String,
    #[serde(default)]
    goals: Vec<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct GoalsResponse {
    ok: bool,
    goals: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/api/entity-goals",
    params(GoalsQuery),
    responses(
        (status = 200, description = "Goals for the hub", body = GoalsResponse),
        (status = 400, description = "Invalid entity slug"),
        (status = 401, description = "No admin session")
    ),
    tag = "entity-goals"
)]
pub async fn get_goals(
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    goals: Extension<EntityGoalsStore>,
    Query(query): Query<GoalsQuery>,
) -> Response {
    if !has_admin_session(&headers, state.config()) {
        return json_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let Some(hub) = query.slug.as_deref().map(str::trim).and_then(hub_by_slug) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid entity slug");
    };
    let goals = goals.read(hub).await;
    (StatusCode::OK, Json(GoalsResponse { ok: true, goals })).into_response()
}

#[utoipa::path(
    post,
    path = "/api/entity-goals",
    request_body = GoalsUpdate,
    params(("x-csrf-token" = String, Header, description = "Must equal the admin_csrf cookie")),
    responses(
        (status = 200, description = "Goals saved", body = GoalsResponse),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Invalid CSRF token"),
        (status = 500, description = "Store failure")
    ),
    tag = "entity-goals"
)]
#[instrument(skip_all)]
pub async fn update_goals(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    goals: Extension<EntityGoalsStore>,
    body: Bytes,
) -> Response {
    if let Some(rejection) =
        authorize_mutation(&state, &method, uri.path(), &headers, "entity_goals.update").await
    {
        return rejection;
    }

    let Ok(update) = serde_json::from_slice::<GoalsUpdate>(&body) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON body");
    };
    let Some(hub) = hub_by_slug(update.slug.trim()) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid entity slug");
    };

    match goals.write(hub, &update.goals).await {
        Ok(saved) => {
            state
                .audit()
                .append(
                    AuditEvent::for_request(
                        "entity_goals.update.success",
                        AuditStatus::Ok,
                        &method,
                        uri.path(),
                        &headers,
                    )
                    .with_detail(hub.slug),
                )
                .await;
            (
                StatusCode::OK,
                Json(GoalsResponse {
                    ok: true,
                    goals: saved,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to save goals for {}: {err:#}", hub.slug);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
