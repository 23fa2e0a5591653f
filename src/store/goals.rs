//! Per-entity goal lists persisted in `entity-goals.json`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{EntityHub, JsonFileStore};

pub const ENTITY_GOALS_FILE: &str = "entity-goals.json";
pub const MAX_GOALS: usize = 6;

#[derive(Serialize, Deserialize, Debug, Default)]
struct EntityGoalsState {
    #[serde(rename = "goalsBySlug", default)]
    goals_by_slug: BTreeMap<String, Vec<String>>,
}

/// Trim, drop blanks, keep at most [`MAX_GOALS`].
fn normalize_goals<S: AsRef<str>>(goals: &[S]) -> Vec<String> {
    goals
        .iter()
        .map(|goal| goal.as_ref().trim())
        .filter(|goal| !goal.is_empty())
        .take(MAX_GOALS)
        .map(str::to_string)
        .collect()
}

#[derive(Clone, Debug)]
pub struct EntityGoalsStore {
    files: JsonFileStore,
}

impl EntityGoalsStore {
    #[must_use]
    pub fn new(files: JsonFileStore) -> Self {
        Self { files }
    }

    /// Saved goals for the hub, or its defaults when none are saved.
    pub async fn read(&self, hub: &EntityHub) -> Vec<String> {
        let state: EntityGoalsState = self
            .files
            .read_json(ENTITY_GOALS_FILE, EntityGoalsState::default())
            .await;
        match state.goals_by_slug.get(hub.slug) {
            Some(goals) if !goals.is_empty() => normalize_goals(goals),
            _ => hub
                .default_goals
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }

    /// Replace the hub's goals and return the normalized list that was stored.
    ///
    /// # Errors
    /// Returns an error if the goals file cannot be written.
    pub async fn write(&self, hub: &EntityHub, goals: &[String]) -> Result<Vec<String>> {
        let mut state: EntityGoalsState = self
            .files
            .read_json(ENTITY_GOALS_FILE, EntityGoalsState::default())
            .await;
        let normalized = normalize_goals(goals);
        state
            .goals_by_slug
            .insert(hub.slug.to_string(), normalized.clone());
        self.files.write_json(ENTITY_GOALS_FILE, &state).await?;
        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::hub_by_slug;

    #[test]
    fn normalize_goals_trims_filters_and_caps() {
        let goals = [
            " one ", "", "two", "   ", "three", "four", "five", "six", "seven",
        ];
        assert_eq!(
            normalize_goals(&goals[..]),
            vec!["one", "two", "three", "four", "five", "six"]
        );
    }

    #[tokio::test]
    async fn read_falls_back_to_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = EntityGoalsStore::new(JsonFileStore::new(dir.path()));
        let Some(hub) = hub_by_slug("pngwn") else {
            anyhow::bail!("missing pngwn hub");
        };

        let goals = store.read(hub).await;
        assert_eq!(goals.len(), 3);
        assert_eq!(goals[0], "Grow waitlist signups consistently.");
        Ok(())
    }

    #[tokio::test]
    async fn write_then_read_round_trips_per_slug() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = EntityGoalsStore::new(JsonFileStore::new(dir.path()));
        let (Some(pngwn), Some(decor)) = (hub_by_slug("pngwn"), hub_by_slug("diyesu-decor")) else {
            anyhow::bail!("missing hubs");
        };

        let saved = store
            .write(pngwn, &[" Ship v2 ".to_string(), String::new()])
            .await?;
        assert_eq!(saved, vec!["Ship v2".to_string()]);
        assert_eq!(store.read(pngwn).await, saved);
        // Other hubs keep their defaults.
        assert_eq!(store.read(decor).await.len(), 3);

        // Saving an empty list brings the defaults back on read.
        store.write(pngwn, &[]).await?;
        assert_eq!(store.read(pngwn).await.len(), 3);
        Ok(())
    }
}
