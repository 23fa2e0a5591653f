//! KPI entries persisted in `kpis.json`.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Entity, JsonFileStore, now_rfc3339};

pub const KPIS_FILE: &str = "kpis.json";

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    P1,
    P2,
    P3,
}

impl Priority {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KpiEntry {
    pub id: String,
    pub entity: Entity,
    pub name: String,
    pub value: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub updated_at: String,
}

/// Validated input for [`KpiStore::upsert`].
#[derive(Clone, Debug)]
pub struct KpiUpsert {
    pub entity: Entity,
    pub name: String,
    pub value: String,
    pub priority: Priority,
    pub link: Option<String>,
}

impl KpiUpsert {
    fn key(&self) -> String {
        upsert_key(self.entity, &self.name)
    }
}

fn upsert_key(entity: Entity, name: &str) -> String {
    format!("{}::{}", entity.as_str(), name).to_lowercase()
}

fn default_kpis() -> Vec<KpiEntry> {
    let now = now_rfc3339();
    let seed = |id: &str, entity: Entity, name: &str, value: &str| KpiEntry {
        id: id.to_string(),
        entity,
        name: name.to_string(),
        value: value.to_string(),
        priority: Priority::P1,
        link: None,
        updated_at: now.clone(),
    };
    vec![
        seed(
            "kpi-unigentamos-doc-coverage",
            Entity::Unigentamos,
            "Documentation Coverage",
            "0 / 12 areas complete",
        ),
        seed(
            "kpi-pngwn-waitlist",
            Entity::Pngwn,
            "Waitlist Signups (Weekly)",
            "TBD",
        ),
        seed(
            "kpi-diyesu-content",
            Entity::DiyesuDecor,
            "Content Shipped (Weekly)",
            "TBD",
        ),
    ]
}

#[derive(Clone, Debug)]
pub struct KpiStore {
    files: JsonFileStore,
}

impl KpiStore {
    #[must_use]
    pub fn new(files: JsonFileStore) -> Self {
        Self { files }
    }

    /// All KPIs, or the seeded defaults when nothing has been saved yet.
    pub async fn read(&self) -> Vec<KpiEntry> {
        self.files.read_json(KPIS_FILE, default_kpis()).await
    }

    /// Insert a KPI or update the one with the same entity and name (case-insensitive).
    ///
    /// # Errors
    /// Returns an error if the updated list cannot be written.
    pub async fn upsert(&self, input: KpiUpsert) -> Result<Vec<KpiEntry>> {
        let mut items = self.read().await;
        let key = input.key();
        let now = now_rfc3339();

        if let Some(existing) = items
            .iter_mut()
            .find(|kpi| upsert_key(kpi.entity, &kpi.name) == key)
        {
            debug!("Updating KPI {}", existing.id);
            existing.value = input.value;
            existing.priority = input.priority;
            if input.link.is_some() {
                existing.link = input.link;
            }
            existing.updated_at = now;
        } else {
            let entry = KpiEntry {
                id: format!("kpi-{}", Uuid::new_v4()),
                entity: input.entity,
                name: input.name,
                value: input.value,
                priority: input.priority,
                link: input.link,
                updated_at: now,
            };
            debug!("Adding KPI {}", entry.id);
            items.push(entry);
        }

        self.files.write_json(KPIS_FILE, &items).await?;
        Ok(items)
    }
}
