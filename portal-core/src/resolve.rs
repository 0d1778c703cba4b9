//! Cross-entity reference resolution.
//!
//! Free-text references (a character's origin and location names) resolve
//! through a [`LookupTable`]; URL references resolve by parsing the trailing
//! id segment into [`RelationshipRow`]s. Every call returns its result as a
//! value. Callers merge [`Resolution`]s explicitly.

use std::collections::HashMap;
use std::num::ParseIntError;

use thiserror::Error;

use crate::types::{Character, CharacterRow, Episode, Location, RelationshipRow};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("malformed reference URL '{url}': trailing segment is not a numeric id")]
    MalformedUrl {
        url: String,
        #[source]
        source: ParseIntError,
    },
}

// ── Lookup ──────────────────────────────────────────────────────────────────

/// An entity that can be referenced by display name.
pub trait Named {
    fn id(&self) -> i64;
    fn name(&self) -> Option<&str>;
}

impl Named for Location {
    fn id(&self) -> i64 {
        self.id
    }
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Named for Character {
    fn id(&self) -> i64 {
        self.id
    }
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Named for Episode {
    fn id(&self) -> i64 {
        self.id
    }
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Display name → id index for one entity type.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    ids: HashMap<String, i64>,
    collisions: usize,
}

impl LookupTable {
    pub fn get(&self, name: &str) -> Option<i64> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// How many times a name was remapped to a different id while building.
    ///
    /// Each collision overwrote an earlier id (last write wins). Seeing the
    /// same name and id again is not a collision. Upstream
    /// names are assumed unique, so a non-zero count means some references
    /// may point at the wrong entity.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    fn insert(&mut self, name: &str, id: i64) {
        if let Some(previous) = self.ids.insert(name.to_string(), id) {
            if previous != id {
                log::debug!("Lookup name '{}' remapped from {} to {}", name, previous, id);
                self.collisions += 1;
            }
        }
    }
}

/// Build a name → id lookup. Later entities overwrite earlier ones that share
/// a name; unnamed entities are skipped.
pub fn build_lookup<'a, T, I>(entities: I) -> LookupTable
where
    T: Named + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut table = LookupTable::default();
    for entity in entities {
        if let Some(name) = entity.name() {
            table.insert(name, entity.id());
        }
    }
    table
}

// ── Foreign keys ────────────────────────────────────────────────────────────

/// The by-name reference fields of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterRef {
    Origin,
    Location,
}

/// Look up the id a character's reference field names, if any.
pub fn resolve_foreign_key(
    character: &Character,
    lookup: &LookupTable,
    field: CharacterRef,
) -> Option<i64> {
    let name = match field {
        CharacterRef::Origin => character.origin.as_deref(),
        CharacterRef::Location => character.location.as_deref(),
    }?;
    lookup.get(name)
}

/// Resolve both location references of a character.
pub fn resolve_character(character: Character, locations: &LookupTable) -> CharacterRow {
    CharacterRow {
        origin_id: resolve_foreign_key(&character, locations, CharacterRef::Origin),
        location_id: resolve_foreign_key(&character, locations, CharacterRef::Location),
        character,
    }
}

// ── URL relationships ───────────────────────────────────────────────────────

/// Parse the trailing id segment of a reference URL.
///
/// ```
/// use portal_core::resolve::child_id_from_url;
///
/// assert_eq!(child_id_from_url("https://example.test/api/character/7").unwrap(), 7);
/// assert_eq!(child_id_from_url("https://example.test/api/character/7/").unwrap(), 7);
/// assert!(child_id_from_url("https://example.test/api/character/abc").is_err());
/// ```
pub fn child_id_from_url(url: &str) -> Result<i64, ResolveError> {
    let segment = url.trim().trim_end_matches('/').rsplit('/').next().unwrap_or("");
    segment
        .parse::<i64>()
        .map_err(|source| ResolveError::MalformedUrl {
            url: url.to_string(),
            source,
        })
}

/// Resolve one reference URL into a link row.
pub fn resolve_url(parent_id: i64, url: &str) -> Result<RelationshipRow, ResolveError> {
    Ok(RelationshipRow {
        parent_id,
        child_id: child_id_from_url(url)?,
        url: url.to_string(),
    })
}

/// Link rows resolved from URL lists, plus the URLs that failed to resolve.
#[derive(Debug, Default)]
pub struct Resolution {
    pub rows: Vec<RelationshipRow>,
    /// `(parent_id, error)` for each URL that could not be resolved.
    pub errors: Vec<(i64, ResolveError)>,
}

impl Resolution {
    pub fn merge(&mut self, other: Resolution) {
        self.rows.extend(other.rows);
        self.errors.extend(other.errors);
    }
}

/// Resolve every URL of one parent. A malformed URL fails only its own row.
pub fn resolve_relationships(parent_id: i64, urls: &[String]) -> Resolution {
    let mut resolution = Resolution::default();
    for url in urls {
        match resolve_url(parent_id, url) {
            Ok(row) => resolution.rows.push(row),
            Err(e) => resolution.errors.push((parent_id, e)),
        }
    }
    resolution
}
