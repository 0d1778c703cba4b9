//! Read queries for the ingest database.
//!
//! Counts, run history, single-character lookup, and the stored URL lists
//! that link tables are rebuilt from.

use portal_core::parse_url_list_str;
use portal_core::types::{IngestRun, RelationshipKind};
use rusqlite::{Connection, params};

use crate::operations::OperationError;

// ── Counts ──────────────────────────────────────────────────────────────────

/// Row counts of every data table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub locations: i64,
    pub episodes: i64,
    pub characters: i64,
    pub residents: i64,
    pub episode_characters: i64,
}

fn count(conn: &Connection, table: &str) -> Result<i64, OperationError> {
    let n = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(n)
}

pub fn table_counts(conn: &Connection) -> Result<TableCounts, OperationError> {
    Ok(TableCounts {
        locations: count(conn, "locations")?,
        episodes: count(conn, "episodes")?,
        characters: count(conn, "characters")?,
        residents: count(conn, "residents")?,
        episode_characters: count(conn, "episode_characters")?,
    })
}

// ── Character Lookups ───────────────────────────────────────────────────────

/// A character row as stored, with resolved location ids.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCharacter {
    pub id: i64,
    pub name: Option<String>,
    pub status: Option<String>,
    pub species: Option<String>,
    pub gender: Option<String>,
    pub origin_id: Option<i64>,
    pub location_id: Option<i64>,
    pub image: Option<String>,
    pub source_created: Option<String>,
    pub created: String,
}

/// Get a character by id.
pub fn character_by_id(
    conn: &Connection,
    id: i64,
) -> Result<Option<StoredCharacter>, OperationError> {
    let result = conn.query_row(
        "SELECT id, name, status, species, gender, origin_id, location_id,
                image, source_created, created
         FROM characters WHERE id = ?1",
        params![id],
        row_to_character,
    );
    match result {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn row_to_character(row: &rusqlite::Row) -> rusqlite::Result<StoredCharacter> {
    Ok(StoredCharacter {
        id: row.get(0)?,
        name: row.get(1)?,
        status: row.get(2)?,
        species: row.get(3)?,
        gender: row.get(4)?,
        origin_id: row.get(5)?,
        location_id: row.get(6)?,
        image: row.get(7)?,
        source_created: row.get(8)?,
        created: row.get(9)?,
    })
}

// ── Stored URL Lists ────────────────────────────────────────────────────────

/// `(parent_id, urls)` for every parent of a relationship, in id order.
///
/// The stored column is decoded with [`parse_url_list_str`], so lists written
/// by other tools as array literals are accepted too.
pub fn stored_url_lists(
    conn: &Connection,
    kind: RelationshipKind,
) -> Result<Vec<(i64, Vec<String>)>, OperationError> {
    let sql = match kind {
        RelationshipKind::Residents => "SELECT id, residents FROM locations ORDER BY id",
        RelationshipKind::EpisodeCharacters => "SELECT id, characters FROM episodes ORDER BY id",
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        let id: i64 = row.get(0)?;
        let raw: Option<String> = row.get(1)?;
        Ok((id, raw.as_deref().map(parse_url_list_str).unwrap_or_default()))
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

// ── Run Log ─────────────────────────────────────────────────────────────────

/// The most recent runs, newest first.
pub fn recent_runs(conn: &Connection, limit: u32) -> Result<Vec<IngestRun>, OperationError> {
    let mut stmt = conn.prepare(
        "SELECT id, started_at, elapsed_secs, characters, locations, episodes,
                relationships_inserted, failed_pages, malformed_urls, unresolved_references
         FROM ingest_runs ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(IngestRun {
            id: row.get(0)?,
            started_at: row.get(1)?,
            elapsed_secs: row.get(2)?,
            characters: row.get(3)?,
            locations: row.get(4)?,
            episodes: row.get(5)?,
            relationships_inserted: row.get(6)?,
            failed_pages: row.get(7)?,
            malformed_urls: row.get(8)?,
            unresolved_references: row.get(9)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}
