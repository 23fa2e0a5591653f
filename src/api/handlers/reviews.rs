//! Weekly and monthly review entries.
//!
//! Reads need a session. Create, update and delete also need the CSRF header,
//! and each is audited under `reviews.{create,update,delete}`.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, OriginalUri, Query},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};

use super::{
    admin::{AdminState, AuditEvent, AuditStatus, authorize_mutation, session::has_admin_session},
    json_error,
};
use crate::store::{
    ReviewEntry, ReviewKind, ReviewUpdate, ReviewsStore, reviews::is_valid_date,
};

const INVALID_KIND: &str = "Invalid review kind";
const INVALID_DATE: &str = "scheduledFor must be in YYYY-MM-DD format";
const NOT_FOUND: &str = "Review entry not found";

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ReviewsQuery {
    /// Review entry id, e.g. `review-<uuid>`.
    #[serde(default)]
    id: Option<String>,
    /// `weekly` or `monthly`.
    #[serde(default)]
    kind: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateReview {
    #[serde(default)]
    kind: Option<String>,
    /// Defaults to the next review day for the kind.
    #[serde(default)]
    scheduled_for: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReview {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    scheduled_for: Option<String>,
    /// Field name to value. Replaces the stored values when present.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    values: Option<Value>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ReviewList {
    ok: bool,
    items: Vec<ReviewEntry>,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ReviewItem {
    ok: bool,
    item: ReviewEntry,
}

#[derive(ToSchema, Serialize, Debug)]
pub struct ReviewChanged {
    ok: bool,
    item: ReviewEntry,
    items: Vec<ReviewEntry>,
}

fn query(uri: &Uri) -> ReviewsQuery {
    Query::<ReviewsQuery>::try_from_uri(uri).map_or_else(|_| ReviewsQuery::default(), |q| q.0)
}

/// Trimmed, or `None` when blank.
fn non_blank(value: Option<&String>) -> Option<&str> {
    value.map(|value| value.trim()).filter(|value| !value.is_empty())
}

/// A blank date means "use the default"; anything else must be well formed.
fn scheduled_for(value: Option<&String>) -> Result<Option<String>, &'static str> {
    match non_blank(value) {
        None => Ok(None),
        Some(date) if is_valid_date(date) => Ok(Some(date.to_string())),
        Some(_) => Err(INVALID_DATE),
    }
}

/// Object values become strings keyed by trimmed names; `null` and `false` become empty.
fn normalize_values(values: Option<&Value>) -> Result<Option<BTreeMap<String, String>>, &'static str> {
    let object = match values {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(object)) => object,
        Some(_) => return Err("values must be an object"),
    };
    Ok(Some(
        object
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::Null | Value::Bool(false) => String::new(),
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.trim().to_string(), text)
            })
            .collect(),
    ))
}

impl UpdateReview {
    fn validate(&self) -> Result<ReviewUpdate, &'static str> {
        let id = non_blank(self.id.as_ref()).ok_or("id is required")?;
        let kind = self
            .kind
            .as_deref()
            .and_then(ReviewKind::parse)
            .ok_or(INVALID_KIND)?;
        Ok(ReviewUpdate {
            id: id.to_string(),
            kind,
            scheduled_for: scheduled_for(self.scheduled_for.as_ref())?,
            values: normalize_values(self.values.as_ref())?,
        })
    }
}

async fn audit_success(
    state: &AdminState,
    action: &str,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    kind: ReviewKind,
    id: &str,
) {
    state
        .audit()
        .append(
            AuditEvent::for_request(action, AuditStatus::Ok, method, uri.path(), headers)
                .with_detail(format!("{}:{id}", kind.as_str())),
        )
        .await;
}

#[utoipa::path(
    get,
    path = "/api/reviews",
    params(ReviewsQuery),
    responses(
        (status = 200, description = "Entries of the kind (or all), latest first; or the single entry when `id` is given", body = ReviewList),
        (status = 400, description = "Invalid review kind"),
        (status = 401, description = "No admin session"),
        (status = 404, description = "Review entry not found")
    ),
    tag = "reviews"
)]
pub async fn list_reviews(
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    reviews: Extension<ReviewsStore>,
) -> Response {
    if !has_admin_session(&headers, state.config()) {
        return json_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    let query = query(&uri);
    let kind = match non_blank(query.kind.as_ref()) {
        None => None,
        Some(raw) => match ReviewKind::parse(raw) {
            Some(kind) => Some(kind),
            None => return json_error(StatusCode::BAD_REQUEST, INVALID_KIND),
        },
    };

    if let Some(id) = non_blank(query.id.as_ref()) {
        return match reviews.get(id, kind).await {
            Some(item) => (StatusCode::OK, Json(ReviewItem { ok: true, item })).into_response(),
            None => json_error(StatusCode::NOT_FOUND, NOT_FOUND),
        };
    }
    let items = reviews.read(kind).await;
    (StatusCode::OK, Json(ReviewList { ok: true, items })).into_response()
}

#[utoipa::path(
    post,
    path = "/api/reviews",
    request_body = CreateReview,
    params(("x-csrf-token" = String, Header, description = "Must equal the admin_csrf cookie")),
    responses(
        (status = 200, description = "Entry created; entries of the kind returned", body = ReviewChanged),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Invalid CSRF token"),
        (status = 500, description = "Store failure")
    ),
    tag = "reviews"
)]
#[instrument(skip_all)]
pub async fn create_review(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    reviews: Extension<ReviewsStore>,
    body: Bytes,
) -> Response {
    if let Some(rejection) =
        authorize_mutation(&state, &method, uri.path(), &headers, "reviews.create").await
    {
        return rejection;
    }

    let Ok(request) = serde_json::from_slice::<CreateReview>(&body) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON body");
    };
    let Some(kind) = request.kind.as_deref().and_then(ReviewKind::parse) else {
        return json_error(StatusCode::BAD_REQUEST, INVALID_KIND);
    };
    let scheduled_for = match scheduled_for(request.scheduled_for.as_ref()) {
        Ok(date) => date,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };

    match reviews.create(kind, scheduled_for.as_deref()).await {
        Ok(change) => {
            audit_success(
                &state,
                "reviews.create.success",
                &method,
                &uri,
                &headers,
                kind,
                &change.item.id,
            )
            .await;
            let body = ReviewChanged {
                ok: true,
                item: change.item,
                items: change.items,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(err) => {
            error!("Failed to create review: {err:#}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/reviews",
    request_body = UpdateReview,
    params(("x-csrf-token" = String, Header, description = "Must equal the admin_csrf cookie")),
    responses(
        (status = 200, description = "Entry updated; entries of the kind returned", body = ReviewChanged),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Invalid CSRF token"),
        (status = 404, description = "Review entry not found"),
        (status = 500, description = "Store failure")
    ),
    tag = "reviews"
)]
#[instrument(skip_all)]
pub async fn update_review(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    reviews: Extension<ReviewsStore>,
    body: Bytes,
) -> Response {
    if let Some(rejection) =
        authorize_mutation(&state, &method, uri.path(), &headers, "reviews.update").await
    {
        return rejection;
    }

    let Ok(request) = serde_json::from_slice::<UpdateReview>(&body) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid JSON body");
    };
    let input = match request.validate() {
        Ok(input) => input,
        Err(message) => return json_error(StatusCode::BAD_REQUEST, message),
    };
    let kind = input.kind;

    match reviews.update(input).await {
        Ok(Some(change)) => {
            audit_success(
                &state,
                "reviews.update.success",
                &method,
                &uri,
                &headers,
                kind,
                &change.item.id,
            )
            .await;
            let body = ReviewChanged {
                ok: true,
                item: change.item,
                items: change.items,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(None) => json_error(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(err) => {
            error!("Failed to update review: {err:#}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/reviews",
    params(
        ReviewsQuery,
        ("x-csrf-token" = String, Header, description = "Must equal the admin_csrf cookie")
    ),
    responses(
        (status = 200, description = "Entry deleted; remaining entries of the kind returned", body = ReviewList),
        (status = 400, description = "Missing id or kind"),
        (status = 401, description = "No admin session"),
        (status = 403, description = "Invalid CSRF token"),
        (status = 404, description = "Review entry not found"),
        (status = 500, description = "Store failure")
    ),
    tag = "reviews"
)]
#[instrument(skip_all)]
pub async fn delete_review(
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    state: Extension<Arc<AdminState>>,
    reviews: Extension<ReviewsStore>,
) -> Response {
    if let Some(rejection) =
        authorize_mutation(&state, &method, uri.path(), &headers, "reviews.delete").await
    {
        return rejection;
    }

    let query = query(&uri);
    let Some(id) = non_blank(query.id.as_ref()) else {
        return json_error(StatusCode::BAD_REQUEST, "id is required");
    };
    let Some(kind) = query.kind.as_deref().and_then(ReviewKind::parse) else {
        return json_error(StatusCode::BAD_REQUEST, "kind is required and must be valid");
    };

    match reviews.delete(id, kind).await {
        Ok(Some(items)) => {
            audit_success(
                &state,
                "reviews.delete.success",
                &method,
                &uri,
                &headers,
                kind,
                id,
            )
            .await;
            (StatusCode::OK, Json(ReviewList { ok: true, items })).into_response()
        }
        Ok(None) => json_error(StatusCode::NOT_FOUND, NOT_FOUND),
        Err(err) => {
            error!("Failed to delete review: {err:#}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(body: Value) -> Result<ReviewUpdate, &'static str> {
        serde_json::from_value::<UpdateReview>(body)
            .map_err(|_| "bad json")?
            .validate()
    }

    #[test]
    fn update_requires_id_then_kind() {
        assert_eq!(update(json!({"kind": "weekly"})).err(), Some("id is required"));
        assert_eq!(update(json!({"id": "  "})).err(), Some("id is required"));
        assert_eq!(update(json!({"id": "r", "kind": "daily"})).err(), Some(INVALID_KIND));
    }

    #[test]
    fn update_checks_date_and_values() {
        let bad_date = json!({"id": "r", "kind": "weekly", "scheduledFor": "10/18/2026"});
        assert_eq!(update(bad_date).err(), Some(INVALID_DATE));
        let bad_values = json!({"id": "r", "kind": "weekly", "values": ["a"]});
        assert_eq!(update(bad_values).err(), Some("values must be an object"));

        let ok = update(json!({
            "id": " r ",
            "kind": "Monthly",
            "scheduledFor": " ",
            "values": {" wins ": "shipped", "count": 3, "blocked": null, "done": false}
        }));
        let Ok(input) = ok else {
            panic!("expected a valid update");
        };
        assert_eq!(input.id, "r");
        assert_eq!(input.kind, ReviewKind::Monthly);
        assert_eq!(input.scheduled_for, None);
        let values = input.values.unwrap_or_default();
        assert_eq!(values.get("wins").map(String::as_str), Some("shipped"));
        assert_eq!(values.get("count").map(String::as_str), Some("3"));
        assert_eq!(values.get("blocked").map(String::as_str), Some(""));
        assert_eq!(values.get("done").map(String::as_str), Some(""));
    }

    #[test]
    fn null_values_leave_stored_values_alone() {
        let input = update(json!({"id": "r", "kind": "weekly", "values": null}));
        assert!(input.is_ok_and(|input| input.values.is_none()));
    }

    #[test]
    fn query_reads_id_and_kind() {
        let uri: Uri = "/api/reviews?id=review-1&kind=weekly".parse().unwrap_or_default();
        let parsed = query(&uri);
        assert_eq!(parsed.id.as_deref(), Some("review-1"));
        assert_eq!(parsed.kind.as_deref(), Some("weekly"));
        assert!(query(&Uri::from_static("/api/reviews")).id.is_none());
    }
}
