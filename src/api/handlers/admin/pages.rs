//! Server-rendered admin pages.

use axum::{
    extract::{Extension, Query},
    response::Html,
};
use serde::Deserialize;
use std::{fmt::Write as _, sync::Arc};

use super::state::{AdminState, DEFAULT_ERROR_PATH, DEFAULT_SUCCESS_PATH};
use crate::store::KpiStore;

const RECENT_AUDIT_EVENTS: usize = 20;

#[derive(Deserialize, Debug, Default)]
pub struct LoginPageQuery {
    #[serde(default)]
    error: Option<String>,
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_html(title)
    ))
}

pub async fn login_page(Query(query): Query<LoginPageQuery>) -> Html<String> {
    let notice = if query.error.is_some() {
        "<p role=\"alert\">Invalid password</p>\n"
    } else {
        ""
    };
    let body = format!(
        "<h1>Admin login</h1>\n{notice}<form method=\"post\" action=\"/api/admin/login\">\n\
         <input type=\"hidden\" name=\"errorPath\" value=\"{DEFAULT_ERROR_PATH}\">\n\
         <input type=\"hidden\" name=\"successPath\" value=\"{DEFAULT_SUCCESS_PATH}\">\n\
         <label>Password <input type=\"password\" name=\"password\" autocomplete=\"current-password\" required></label>\n\
         <button type=\"submit\">Sign in</button>\n</form>"
    );
    layout("Admin login", &body)
}

pub async fn dashboard(
    state: Extension<Arc<AdminState>>,
    kpis: Extension<KpiStore>,
) -> Html<String> {
    let mut body = String::from("<h1>Operations dashboard</h1>\n<h2>KPIs</h2>\n<table>\n");
    body.push_str("<tr><th>Entity</th><th>Name</th><th>Value</th><th>Priority</th><th>Updated</th></tr>\n");
    for kpi in kpis.read().await {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:?}</td><td>{}</td></tr>",
            escape_html(kpi.entity.as_str()),
            escape_html(&kpi.name),
            escape_html(&kpi.value),
            kpi.priority,
            escape_html(&kpi.updated_at),
        );
    }
    body.push_str("</table>\n<h2>Recent security events</h2>\n<ul>\n");
    let events = state.audit().events().await;
    for event in events.iter().rev().take(RECENT_AUDIT_EVENTS) {
        let _ = writeln!(
            body,
            "<li>{} {} {}</li>",
            escape_html(&event.at),
            escape_html(&event.action),
            escape_html(&event.ip),
        );
    }
    body.push_str(
        "</ul>\n<form method=\"post\" action=\"/api/admin/logout\"><button type=\"submit\">Log out</button></form>",
    );
    layout("Operations dashboard", &body)
}
