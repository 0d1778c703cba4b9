//! Data model types for ingested entities.
//!
//! These types represent the normalized shape of everything the pipeline
//! persists: characters, locations, episodes, and the link rows between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One untyped item exactly as the listing endpoint returned it.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

// ── Entity Kind ─────────────────────────────────────────────────────────────

/// The entity collections exposed by the listing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Character,
    Location,
    Episode,
}

impl EntityKind {
    /// All kinds, in the order their listings are requested.
    pub const ALL: [EntityKind; 3] = [Self::Character, Self::Location, Self::Episode];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Character => "character",
            Self::Location => "location",
            Self::Episode => "episode",
        }
    }

    /// Path segment of the listing endpoint, relative to the API base.
    pub fn endpoint_path(&self) -> &'static str {
        self.as_str()
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Character ───────────────────────────────────────────────────────────────

/// A character as normalized from the API, before its references are resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Character {
    pub id: i64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub species: Option<String>,
    pub gender: Option<String>,
    /// Name of the origin location (free text, resolved to `origin_id`).
    pub origin: Option<String>,
    /// Name of the last known location (free text, resolved to `location_id`).
    pub location: Option<String>,
    pub image: Option<String>,
    /// The API's own creation timestamp, kept verbatim.
    pub source_created: Option<String>,
    /// Ingestion time.
    pub created: DateTime<Utc>,
}

/// A character whose by-name references have been replaced with location ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRow {
    pub character: Character,
    pub origin_id: Option<i64>,
    pub location_id: Option<i64>,
}

// ── Location ────────────────────────────────────────────────────────────────

/// A location. `residents` holds character URLs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: i64,
    pub name: Option<String>,
    /// The API's `type` field.
    pub kind: Option<String>,
    pub dimension: Option<String>,
    pub residents: Vec<String>,
    pub url: Option<String>,
    pub created: DateTime<Utc>,
}

// ── Episode ─────────────────────────────────────────────────────────────────

/// An episode. `characters` holds character URLs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Episode {
    pub id: i64,
    pub name: Option<String>,
    pub air_date: Option<String>,
    /// Season/episode code such as `S01E01` (the API's `episode` field).
    pub code: Option<String>,
    pub characters: Vec<String>,
    pub url: Option<String>,
    pub created: DateTime<Utc>,
}

// ── Entity ──────────────────────────────────────────────────────────────────

/// Any normalized entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entity {
    Character(Character),
    Location(Location),
    Episode(Episode),
}

impl Entity {
    pub fn id(&self) -> i64 {
        match self {
            Self::Character(c) => c.id,
            Self::Location(l) => l.id,
            Self::Episode(e) => e.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Character(_) => EntityKind::Character,
            Self::Location(_) => EntityKind::Location,
            Self::Episode(_) => EntityKind::Episode,
        }
    }

    pub fn into_character(self) -> Option<Character> {
        match self {
            Self::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_location(self) -> Option<Location> {
        match self {
            Self::Location(l) => Some(l),
            _ => None,
        }
    }

    pub fn into_episode(self) -> Option<Episode> {
        match self {
            Self::Episode(e) => Some(e),
            _ => None,
        }
    }
}

// ── Relationships ───────────────────────────────────────────────────────────

/// Many-to-many link types derived from URL lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Location → character, from `Location::residents`.
    Residents,
    /// Episode → character, from `Episode::characters`.
    EpisodeCharacters,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Residents => "residents",
            Self::EpisodeCharacters => "episode_characters",
        }
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A link between a parent entity and a child entity.
///
/// `(parent_id, child_id)` is unique within a relationship table; `url` is the
/// reference the child id was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelationshipRow {
    pub parent_id: i64,
    pub child_id: i64,
    pub url: String,
}

// ── Pages ───────────────────────────────────────────────────────────────────

/// One page of a listing, in page order.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    pub records: Vec<RawRecord>,
}

// ── Run Tracking ────────────────────────────────────────────────────────────

/// Log entry for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestRun {
    pub id: i64,
    pub started_at: String,
    pub elapsed_secs: f64,
    pub characters: i64,
    pub locations: i64,
    pub episodes: i64,
    pub relationships_inserted: i64,
    pub failed_pages: i64,
    pub malformed_urls: i64,
    pub unresolved_references: i64,
}
