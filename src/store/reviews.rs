//! Weekly and monthly review entries persisted in `reviews.json`.

use anyhow::Result;
use chrono::{Datelike, Days, Local, Months, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{JsonFileStore, now_rfc3339};

pub const REVIEWS_FILE: &str = "reviews.json";

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewKind {
    Weekly,
    Monthly,
}

impl ReviewKind {
    /// Case-insensitive, surrounding whitespace ignored.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// The next scheduled review day on or after `today`.
    #[must_use]
    pub fn next_date(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Weekly => next_sunday(today),
            Self::Monthly => next_first_sunday(today),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub id: String,
    pub kind: ReviewKind,
    pub scheduled_for: String,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// Validated input for [`ReviewsStore::update`].
#[derive(Clone, Debug)]
pub struct ReviewUpdate {
    pub id: String,
    pub kind: ReviewKind,
    pub scheduled_for: Option<String>,
    pub values: Option<BTreeMap<String, String>>,
}

/// The touched entry and the refreshed list for its kind.
#[derive(Clone, Debug)]
pub struct ReviewChange {
    pub item: ReviewEntry,
    pub items: Vec<ReviewEntry>,
}

#[derive(Serialize, Deserialize, Default)]
struct ReviewsState {
    #[serde(default)]
    items: Vec<ReviewEntry>,
}

/// `YYYY-MM-DD` naming a real calendar day.
#[must_use]
pub fn is_valid_date(value: &str) -> bool {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").is_ok_and(|re| re.is_match(value))
        && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn next_sunday(today: NaiveDate) -> NaiveDate {
    let add = (7 - today.weekday().num_days_from_sunday()) % 7;
    today + Days::new(u64::from(add))
}

fn first_sunday_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1).map(next_sunday)
}

fn next_first_sunday(today: NaiveDate) -> NaiveDate {
    let this_month = first_sunday_of_month(today.year(), today.month());
    if let Some(date) = this_month.filter(|date| *date >= today) {
        return date;
    }
    today
        .with_day(1)
        .and_then(|first| first.checked_add_months(Months::new(1)))
        .and_then(|next| first_sunday_of_month(next.year(), next.month()))
        .unwrap_or(today)
}

fn scheduled_or_default(kind: ReviewKind, scheduled_for: Option<&str>) -> String {
    match scheduled_for {
        Some(date) if is_valid_date(date) => date.to_string(),
        _ => kind
            .next_date(Local::now().date_naive())
            .format("%Y-%m-%d")
            .to_string(),
    }
}

fn sorted(mut items: Vec<ReviewEntry>) -> Vec<ReviewEntry> {
    items.sort_by(|a, b| {
        b.scheduled_for
            .cmp(&a.scheduled_for)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    items
}

#[derive(Clone, Debug)]
pub struct ReviewsStore {
    files: JsonFileStore,
}

impl ReviewsStore {
    #[must_use]
    pub fn new(files: JsonFileStore) -> Self {
        Self { files }
    }

    async fn state(&self) -> ReviewsState {
        let mut state: ReviewsState = self
            .files
            .read_json(REVIEWS_FILE, ReviewsState::default())
            .await;
        for entry in &mut state.items {
            if entry.updated_at.is_empty() {
                entry.updated_at.clone_from(&entry.created_at);
            }
        }
        state
    }

    /// Entries of `kind` (or all), latest scheduled first.
    pub async fn read(&self, kind: Option<ReviewKind>) -> Vec<ReviewEntry> {
        let items = self.state().await.items;
        sorted(
            items
                .into_iter()
                .filter(|entry| kind.is_none_or(|kind| entry.kind == kind))
                .collect(),
        )
    }

    pub async fn get(&self, id: &str, kind: Option<ReviewKind>) -> Option<ReviewEntry> {
        self.state()
            .await
            .items
            .into_iter()
            .find(|entry| entry.id == id && kind.is_none_or(|kind| entry.kind == kind))
    }

    /// Add an entry. A missing or malformed date becomes the next review day.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn create(
        &self,
        kind: ReviewKind,
        scheduled_for: Option<&str>,
    ) -> Result<ReviewChange> {
        let mut state = self.state().await;
        let now = now_rfc3339();
        let item = ReviewEntry {
            id: format!("review-{}", Uuid::new_v4()),
            kind,
            scheduled_for: scheduled_or_default(kind, scheduled_for),
            created_at: now.clone(),
            updated_at: now,
            values: BTreeMap::new(),
        };
        debug!("Adding {} review {}", kind.as_str(), item.id);
        state.items.insert(0, item.clone());
        self.files.write_json(REVIEWS_FILE, &state).await?;
        Ok(ReviewChange {
            item,
            items: self.read(Some(kind)).await,
        })
    }

    /// Update the entry matching both id and kind. `None` when there is none.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn update(&self, input: ReviewUpdate) -> Result<Option<ReviewChange>> {
        let mut state = self.state().await;
        let Some(entry) = state
            .items
            .iter_mut()
            .find(|entry| entry.id == input.id && entry.kind == input.kind)
        else {
            return Ok(None);
        };

        let scheduled_for = input
            .scheduled_for
            .as_deref()
            .filter(|date| !date.is_empty())
            .unwrap_or(entry.scheduled_for.as_str());
        entry.scheduled_for = scheduled_or_default(input.kind, Some(scheduled_for));
        if let Some(values) = input.values {
            entry.values = values;
        }
        entry.updated_at = now_rfc3339();
        let item = entry.clone();

        self.files.write_json(REVIEWS_FILE, &state).await?;
        Ok(Some(ReviewChange {
            item,
            items: self.read(Some(input.kind)).await,
        }))
    }

    /// Remove the entry matching both id and kind. Returns the remaining
    /// entries of `kind`, or `None` when nothing matched.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub async fn delete(&self, id: &str, kind: ReviewKind) -> Result<Option<Vec<ReviewEntry>>> {
        let mut state = self.state().await;
        let before = state.items.len();
        state
            .items
            .retain(|entry| !(entry.id == id && entry.kind == kind));
        if state.items.len() == before {
            return Ok(None);
        }
        self.files.write_json(REVIEWS_FILE, &state).await?;
        Ok(Some(self.read(Some(kind)).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_default()
    }

    #[test]
    fn kind_parse() {
        assert_eq!(ReviewKind::parse(" Weekly "), Some(ReviewKind::Weekly));
        assert_eq!(ReviewKind::parse("MONTHLY"), Some(ReviewKind::Monthly));
        assert_eq!(ReviewKind::parse("daily"), None);
        assert_eq!(ReviewKind::parse(""), None);
    }

    #[test]
    fn date_format() {
        assert!(is_valid_date("2026-03-01"));
        assert!(!is_valid_date("2026-3-1"));
        assert!(!is_valid_date("2026-02-30"));
        assert!(!is_valid_date(" 2026-03-01"));
    }

    #[test]
    fn weekly_defaults_to_sunday_on_or_after_today() {
        // 2026-10-16 is a Friday.
        assert_eq!(ReviewKind::Weekly.next_date(date("2026-10-16")), date("2026-10-18"));
        assert_eq!(ReviewKind::Weekly.next_date(date("2026-10-18")), date("2026-10-18"));
    }

    #[test]
    fn monthly_defaults_to_first_sunday() {
        // First Sunday of October 2026 is the 4th.
        assert_eq!(ReviewKind::Monthly.next_date(date("2026-10-01")), date("2026-10-04"));
        assert_eq!(ReviewKind::Monthly.next_date(date("2026-10-04")), date("2026-10-04"));
        assert_eq!(ReviewKind::Monthly.next_date(date("2026-10-05")), date("2026-11-01"));
        assert_eq!(ReviewKind::Monthly.next_date(date("2026-12-20")), date("2027-01-03"));
    }

    #[tokio::test]
    async fn create_update_delete() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = ReviewsStore::new(JsonFileStore::new(dir.path()));
        assert!(store.read(None).await.is_empty());

        let first = store.create(ReviewKind::Weekly, Some("2026-10-11")).await?;
        let second = store.create(ReviewKind::Weekly, Some("2026-10-18")).await?;
        store.create(ReviewKind::Monthly, None).await?;
        assert!(first.item.id.starts_with("review-"));
        assert_eq!(first.item.updated_at, first.item.created_at);

        let weekly = store.read(Some(ReviewKind::Weekly)).await;
        assert_eq!(
            weekly.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
            vec![second.item.id.as_str(), first.item.id.as_str()]
        );
        assert_eq!(store.read(None).await.len(), 3);

        let values = BTreeMap::from([("wins".to_string(), "shipped".to_string())]);
        let changed = store
            .update(ReviewUpdate {
                id: first.item.id.clone(),
                kind: ReviewKind::Weekly,
                scheduled_for: None,
                values: Some(values.clone()),
            })
            .await?;
        let changed = changed.map(|change| change.item);
        assert!(changed.as_ref().is_some_and(|item| item.values == values));
        assert!(changed.is_some_and(|item| item.scheduled_for == "2026-10-11"));

        // Kind must match too.
        let wrong_kind = store
            .update(ReviewUpdate {
                id: first.item.id.clone(),
                kind: ReviewKind::Monthly,
                scheduled_for: None,
                values: None,
            })
            .await?;
        assert!(wrong_kind.is_none());
        assert!(store.delete(&first.item.id, ReviewKind::Monthly).await?.is_none());

        let remaining = store.delete(&first.item.id, ReviewKind::Weekly).await?;
        assert_eq!(remaining.map(|items| items.len()), Some(1));
        assert!(store.get(&first.item.id, None).await.is_none());
        assert!(store.get(&second.item.id, Some(ReviewKind::Weekly)).await.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn legacy_entries_fill_missing_fields() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let files = JsonFileStore::new(dir.path());
        tokio::fs::write(
            dir.path().join(REVIEWS_FILE),
            r#"{"items":[{"id":"review-1","kind":"weekly","scheduledFor":"2026-01-04","createdAt":"2026-01-01T00:00:00.000Z"}]}"#,
        )
        .await?;
        let store = ReviewsStore::new(files);
        let entry = store.get("review-1", None).await;
        assert!(entry.is_some_and(|e| e.updated_at == e.created_at && e.values.is_empty()));
        Ok(())
    }
}
