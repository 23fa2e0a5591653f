//! File-backed JSON stores.
//!
//! Every store keeps one JSON document per file under the data directory and
//! rewrites the whole document on change. Reads never fail: a missing or
//! corrupt file yields the caller's fallback. Writes go to a temporary sibling
//! first and are renamed into place.

pub mod entities;
pub mod goals;
pub mod kpis;
pub mod reviews;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{Instrument, info_span, warn};
use ulid::Ulid;

pub use entities::{ENTITY_HUBS, Entity, EntityHub, hub_by_slug};
pub use goals::EntityGoalsStore;
pub use kpis::{KpiEntry, KpiStore, KpiUpsert, Priority};
pub use reviews::{ReviewChange, ReviewEntry, ReviewKind, ReviewUpdate, ReviewsStore};

/// Current UTC time as RFC 3339 with milliseconds and a `Z` suffix.
pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone, Debug)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }

    /// Read and decode `file_name`, returning `fallback` on any failure.
    pub async fn read_json<T: DeserializeOwned>(&self, file_name: &str, fallback: T) -> T {
        let path = self.path(file_name);
        let span = info_span!("store.read", file = file_name);
        let bytes = match tokio::fs::read(&path).instrument(span).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return fallback,
            Err(err) => {
                warn!("Failed to read {}: {err}", path.display());
                return fallback;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!("Ignoring malformed {}: {err}", path.display());
                fallback
            }
        }
    }

    /// Replace `file_name` with the pretty-printed JSON of `value`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created or the file cannot be written.
    pub async fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;

        let mut body = serde_json::to_vec_pretty(value)
            .with_context(|| format!("failed to encode {file_name}"))?;
        body.push(b'\n');

        let path = self.path(file_name);
        let tmp = self.path(&format!(".{file_name}.{}.tmp", Ulid::new()));
        let span = info_span!("store.write", file = file_name);
        async {
            tokio::fs::write(&tmp, &body)
                .await
                .with_context(|| format!("failed to write {}", tmp.display()))?;
            if let Err(err) = tokio::fs::rename(&tmp, &path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(err).with_context(|| format!("failed to replace {}", path.display()));
            }
            Ok(())
        }
        .instrument(span)
        .await
    }
}
