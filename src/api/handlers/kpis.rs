//! KPI list and upsert endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, OriginalUri},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::{
    admin::{AdminState, AuditEvent, AuditStatus, authorize_mutation, session::has_admin_session},
    json_error,
};
use crate::store::{Entity, KpiEntry, KpiStore, KpiUpsert, Priority};

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct KpiRequest {
    #[serde(default)]
    entity: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct KpiList {
    ok: bool,
    items: Vec<KpiEntry>,
}

fn is_http_link(link: &str) -> bool {
    Regex::new(r"(?i)^https?://\S+$").is_ok_and(|re| re.is_match(link))
}

fn trimmed(value: Option<&String>) -> &str {
    value.map_or("", |value| value.trim())
}

impl KpiRequest {
    /// Validate into a store upsert, or the message to return with a 400.
    fn validate(&self) -> Result<KpiUpsert, &'static str> {
        let entity = Entity::parse(trimmed(self.entity.as_ref())).ok_or("Invalid entity")?;

        let name = trimmed(self.name.as_ref());
        if name.is_empty() {
            return Err("Name is required");
        }
        let value = trimmed(self.value.as_ref());
        if value.is_empty() {
            return Err("Value is required");
        }

        let priority = match trimmed(self.priority.as_ref()) {
            "" => Priority::default(),
            raw => Priority::parse(raw).ok_or("Invalid priority")?,
        };

        let link = match trimmed(self.link.as_ref()) {
            "" => None,
            raw if is_http_link(raw) => Some(raw.to_string()),
            _ => return Err("Link must start with http:// or https://"),
        };

        Ok(KpiUpsert {
            entity,
            name: name.to_string(),
            value: value.to_string(),
            priority,
            link,
        })
    }
}

#[utoipa::path(
    get,
    path = "/api/kpis",
    responses(
        (status = 200, description = "All KPIs", body = KpiList),
        (status = 401, description = "No admin session")
    ),
    tag = "kpis"
)]
pub async fn list_kpis(
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    kpis: Extension<KpiStore>,
) -> Response {
    if !has_admin_session(&headers, state.config()) {
        return json_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let items = kpis.read().await;
    (StatusCode::OK, Json(KpiList { ok: true, items })).into_response()
}

#[utoipa::path(
    post,
    path = "/api/kpis",
    request_body = KpiRequest,
    params(("x-csrf-token" = String, Header, description = "Must equal the admin_csrf cookie")),
    responses(
        (status = 200, description = "KPI saved; full list returned", body = KpiList),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Invalid CSRF token"),
        (status = 500, description = "Store failure")
    ),
    tag = "kpis"
)]
#[instrument(skip_all)]
pub async fn upsert_kpi(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    kpis: Extension<KpiStore>,
    body: Bytes,
) -> Response {
    if let Some(rejection) =
        authorize_mutation(&state, &method, uri.path(), &headers, "kpis.upsert").await
    {
        return rejection;
    }

    let Ok(request) = serde_json::from_slice::<KpiRequest>(&body) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON body");
    };
    let input = match request.validate() {
        Ok(input) => input,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };
    let detail = format!("{}::{}", input.entity.as_str(), input.name);

    match kpis.upsert(input).await {
        Ok(items) => {
            state
                .audit()
                .append(
                    AuditEvent::for_request(
                        "kpis.upsert.success",
                        AuditStatus::Ok,
                        &method,
                        uri.path(),
                        &headers,
                    )
                    .with_detail(detail),
                )
                .await;
            (StatusCode::OK, Json(KpiList { ok: true, items })).into_response()
        }
        Err(err) => {
            error!("Failed to save KPI: {err:#}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
