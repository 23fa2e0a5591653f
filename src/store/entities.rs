//! Tracked entities and their hub settings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    #[serde(rename = "Unigentamos")]
    Unigentamos,
    #[serde(rename = "pngwn")]
    Pngwn,
    #[serde(rename = "Diyesu Decor")]
    DiyesuDecor,
}

impl Entity {
    pub const ALL: [Self; 3] = [Self::Unigentamos, Self::Pngwn, Self::DiyesuDecor];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unigentamos => "Unigentamos",
            Self::Pngwn => "pngwn",
            Self::DiyesuDecor => "Diyesu Decor",
        }
    }

    /// Exact, case-sensitive match on the display name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|entity| entity.as_str() == value)
    }
}

#[derive(Debug)]
pub struct EntityHub {
    pub slug: &'static str,
    pub entity: Entity,
    pub default_goals: &'static [&'static str],
}

pub static ENTITY_HUBS: [EntityHub; 3] = [
    EntityHub {
        slug: "unigentamos",
        entity: Entity::Unigentamos,
        default_goals: &[
            "Keep all 12 Unigentamos documentation areas current.",
            "Reduce active blockers every week.",
            "Keep dashboards and workflows easy to run.",
        ],
    },
    EntityHub {
        slug: "pngwn",
        entity: Entity::Pngwn,
        default_goals: &[
            "Grow waitlist signups consistently.",
            "Keep website impressions trending up.",
            "Keep errors and unread inbox load low.",
        ],
    },
    EntityHub {
        slug: "diyesu-decor",
        entity: Entity::DiyesuDecor,
        default_goals: &[
            "Ship weekly pins and blogs on plan.",
            "Increase outbound clicks and impressions.",
            "Grow newsletter signups week over week.",
        ],
    },
];

#[must_use]
pub fn hub_by_slug(slug: &str) -> Option<&'static EntityHub> {
    ENTITY_HUBS.iter().find(|hub| hub.slug == slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_parse_is_exact() {
        assert_eq!(Entity::parse("pngwn"), Some(Entity::Pngwn));
        assert_eq!(Entity::parse("Diyesu Decor"), Some(Entity::DiyesuDecor));
        assert_eq!(Entity::parse("PNGWN"), None);
        assert_eq!(Entity::parse(""), None);
    }

    #[test]
    fn entity_serializes_as_display_name() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&Entity::DiyesuDecor)?,
            "\"Diyesu Decor\""
        );
        Ok(())
    }

    #[test]
    fn hub_lookup_by_slug() {
        assert_eq!(
            hub_by_slug("diyesu-decor").map(|hub| hub.entity),
            Some(Entity::DiyesuDecor)
        );
        assert!(hub_by_slug("unknown").is_none());
        assert!(ENTITY_HUBS.iter().all(|hub| hub.default_goals.len() == 3));
    }
}
