//! Append-only audit trail of security events, capped at [`MAX_AUDIT_EVENTS`].
//!
//! Persisting is best effort: a failed write is logged and never changes the
//! outcome of the request that produced the event.

use axum::http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::utils::client_key;
use crate::store::{JsonFileStore, now_rfc3339};

pub const AUDIT_LOG_FILE: &str = "audit-log.json";
pub const MAX_AUDIT_EVENTS: usize = 500;

const MAX_ACTION_CHARS: usize = 120;
const MAX_PATH_CHARS: usize = 240;
const MAX_METHOD_CHARS: usize = 16;
const MAX_IP_CHARS: usize = 120;
const MAX_DETAIL_CHARS: usize = 300;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Ok,
    Denied,
    Error,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuditEvent {
    pub at: String,
    pub action: String,
    pub path: String,
    pub method: String,
    pub ip: String,
    pub status: AuditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Event for the current request, stamped with the current time.
    #[must_use]
    pub fn for_request(
        action: &str,
        status: AuditStatus,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Self {
        Self {
            at: now_rfc3339(),
            action: action.to_string(),
            path: path.to_string(),
            method: method.as_str().to_string(),
            ip: client_key(headers),
            status,
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    fn sanitized(self) -> Self {
        Self {
            at: self.at,
            action: clean_text(&self.action, MAX_ACTION_CHARS),
            path: clean_text(&self.path, MAX_PATH_CHARS),
            method: clean_text(&self.method, MAX_METHOD_CHARS),
            ip: clean_text(&self.ip, MAX_IP_CHARS),
            status: self.status,
            detail: self
                .detail
                .map(|detail| clean_text(&detail, MAX_DETAIL_CHARS))
                .filter(|detail| !detail.is_empty()),
        }
    }
}

/// Collapse whitespace runs to one space, trim, keep at most `max_chars` characters.
pub(crate) fn clean_text(value: &str, max_chars: usize) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct AuditState {
    #[serde(default)]
    items: Vec<AuditEvent>,
}

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Clone, Debug)]
pub struct AuditLog {
    files: JsonFileStore,
    write_lock: Arc<Mutex<()>>,
}

impl AuditLog {
    #[must_use]
    pub fn new(files: JsonFileStore) -> Self {
        Self {
            files,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Record `event`, logging instead of failing when it cannot be stored.
    pub async fn append(&self, event: AuditEvent) {
        let action = event.action.clone();
        if let Err(err) = self.try_append(event).await {
            warn!("Failed to write audit event {action}: {err}");
        }
    }

    /// Record `event` and drop the oldest entries beyond the cap.
    ///
    /// # Errors
    /// Returns an error if the audit file cannot be written.
    pub async fn try_append(&self, event: AuditEvent) -> Result<(), AuditError> {
        let event = event.sanitized();
        debug!(action = %event.action, status = ?event.status, ip = %event.ip, "audit");

        let _guard = self.write_lock.lock().await;
        let mut state: AuditState = self
            .files
            .read_json(AUDIT_LOG_FILE, AuditState::default())
            .await;
        state.items.push(event);
        if state.items.len() > MAX_AUDIT_EVENTS {
            let excess = state.items.len() - MAX_AUDIT_EVENTS;
            state.items.drain(..excess);
        }
        self.files.write_json(AUDIT_LOG_FILE, &state).await?;
        Ok(())
    }

    /// Stored events, oldest first.
    pub async fn events(&self) -> Vec<AuditEvent> {
        let state: AuditState = self
            .files
            .read_json(AUDIT_LOG_FILE, AuditState::default())
            .await;
        state.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn event(action: &str) -> AuditEvent {
        AuditEvent::for_request(
            action,
            AuditStatus::Ok,
            &Method::POST,
            "/api/admin/login",
            &HeaderMap::new(),
        )
    }

    #[test]
    fn clean_text_collapses_and_clamps() {
        assert_eq!(clean_text("  a \n\t b  ", 100), "a b");
        assert_eq!(clean_text("abcdef", 3), "abc");
        assert_eq!(clean_text("ééé", 2), "éé");
        assert_eq!(clean_text("   ", 10), "");
    }

    #[test]
    fn sanitized_clamps_each_field() {
        let mut raw = event(&"x".repeat(500));
        raw.path = format!("/{}", "p".repeat(500));
        raw.method = "POST\nPOST POST POST POST".to_string();
        raw.ip = "i".repeat(500);
        raw.detail = Some(format!("line one\n{}", "d".repeat(500)));

        let clean = raw.sanitized();
        assert_eq!(clean.action.chars().count(), 120);
        assert_eq!(clean.path.chars().count(), 240);
        assert_eq!(clean.method, "POST POST POST P");
        assert_eq!(clean.ip.chars().count(), 120);
        assert!(
            clean
                .detail
                .is_some_and(|d| d.starts_with("line one d") && d.chars().count() == 300)
        );
    }

    #[test]
    fn serializes_lowercase_status_without_empty_detail() -> Result<()> {
        let json = serde_json::to_value(event("admin.login.success"))?;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["ip"], "unknown");
        assert_eq!(json["method"], "POST");
        assert!(json.get("detail").is_none());
        assert!(json["at"].as_str().is_some_and(|at| at.ends_with('Z')));
        Ok(())
    }

    #[tokio::test]
    async fn append_persists_items_document() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(JsonFileStore::new(dir.path()));
        log.try_append(event("admin.login.failed").with_detail("bad"))
            .await?;

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(AUDIT_LOG_FILE))?)?;
        assert_eq!(raw["items"][0]["action"], "admin.login.failed");
        assert_eq!(raw["items"][0]["detail"], "bad");
        Ok(())
    }

    #[tokio::test]
    async fn keeps_only_the_newest_events() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(JsonFileStore::new(dir.path()));
        for i in 0..(MAX_AUDIT_EVENTS + 5) {
            log.try_append(event(&format!("event.{i}"))).await?;
        }

        let events = log.events().await;
        assert_eq!(events.len(), MAX_AUDIT_EVENTS);
        assert_eq!(events[0].action, "event.5");
        assert_eq!(
            events.last().map(|e| e.action.as_str()),
            Some(format!("event.{}", MAX_AUDIT_EVENTS + 4).as_str())
        );
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let log = AuditLog::new(JsonFileStore::new(dir.path()));
        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move { log.try_append(event(&format!("e{i}"))).await })
            })
            .collect();
        for task in tasks {
            task.await??;
        }
        assert_eq!(log.events().await.len(), 20);
        Ok(())
    }

    #[tokio::test]
    async fn append_swallows_write_failures() -> Result<()> {
        let dir = tempfile::tempdir()?;
        // A regular file where the data directory should be.
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, b"")?;
        let log = AuditLog::new(JsonFileStore::new(&blocker));

        assert!(log.try_append(event("x")).await.is_err());
        log.append(event("x")).await;
        Ok(())
    }
}
