//! Raw API item → typed entity.
//!
//! Normalization is pure: the ingestion timestamp is supplied by the caller,
//! so the same record and timestamp always produce the same entity. Missing
//! scalars and missing nested objects become `None` (or an empty list);
//! only a missing `id` is an error, since the id is the upsert key.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::types::{Character, Entity, EntityKind, Episode, Location, RawRecord};
use crate::url_list::parse_url_list;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("{kind} record has no integer id")]
    MissingId { kind: EntityKind },
}

/// Normalize a raw record of the given kind.
pub fn normalize(
    kind: EntityKind,
    raw: &RawRecord,
    now: DateTime<Utc>,
) -> Result<Entity, NormalizeError> {
    Ok(match kind {
        EntityKind::Character => Entity::Character(normalize_character(raw, now)?),
        EntityKind::Location => Entity::Location(normalize_location(raw, now)?),
        EntityKind::Episode => Entity::Episode(normalize_episode(raw, now)?),
    })
}

pub fn normalize_character(
    raw: &RawRecord,
    now: DateTime<Utc>,
) -> Result<Character, NormalizeError> {
    Ok(Character {
        id: id_field(raw, EntityKind::Character)?,
        name: text(raw, "name"),
        status: text(raw, "status"),
        species: text(raw, "species"),
        gender: text(raw, "gender"),
        origin: nested_name(raw, "origin"),
        location: nested_name(raw, "location"),
        image: text(raw, "image"),
        source_created: text(raw, "created"),
        created: now,
    })
}

pub fn normalize_location(
    raw: &RawRecord,
    now: DateTime<Utc>,
) -> Result<Location, NormalizeError> {
    Ok(Location {
        id: id_field(raw, EntityKind::Location)?,
        name: text(raw, "name"),
        kind: text(raw, "type"),
        dimension: text(raw, "dimension"),
        residents: raw.get("residents").map(parse_url_list).unwrap_or_default(),
        url: text(raw, "url"),
        created: now,
    })
}

pub fn normalize_episode(raw: &RawRecord, now: DateTime<Utc>) -> Result<Episode, NormalizeError> {
    Ok(Episode {
        id: id_field(raw, EntityKind::Episode)?,
        name: text(raw, "name"),
        air_date: text(raw, "air_date"),
        code: text(raw, "episode"),
        characters: raw.get("characters").map(parse_url_list).unwrap_or_default(),
        url: text(raw, "url"),
        created: now,
    })
}

// ── Field helpers ───────────────────────────────────────────────────────────

fn id_field(raw: &RawRecord, kind: EntityKind) -> Result<i64, NormalizeError> {
    raw.get("id")
        .and_then(Value::as_i64)
        .ok_or(NormalizeError::MissingId { kind })
}

/// Scalar field as text. Strings pass through; numbers and booleans are
/// rendered; null, arrays, and objects read as absent.
fn text(raw: &RawRecord, key: &str) -> Option<String> {
    scalar_text(raw.get(key)?)
}

/// `{ "origin": { "name": "Earth", "url": "…" } }` → `Some("Earth")`.
fn nested_name(raw: &RawRecord, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_object)
        .and_then(|obj| obj.get("name"))
        .and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
