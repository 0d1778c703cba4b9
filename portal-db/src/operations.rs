//! Batched write operations for entities, link rows and the run log.
//!
//! Every public write runs inside one transaction: either all rows of the
//! call are committed or, on error, none are.

use portal_core::encode_url_list;
use portal_core::types::*;
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid SQL identifier: '{0}'")]
    InvalidIdentifier(String),
    #[error("Column list for '{0}' must include 'id'")]
    MissingIdColumn(String),
    #[error("Row type has no value for column '{column}' of '{table}'")]
    ColumnMismatch { table: String, column: String },
    #[error("Batch write to '{table}' failed ({rows} rows rolled back): {source}")]
    Batch {
        table: String,
        rows: usize,
        #[source]
        source: rusqlite::Error,
    },
}

/// Rows per multi-row statement unless the caller picks another size.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`.
const MAX_BOUND_PARAMETERS: usize = 32766;

// ── Row Mapping ─────────────────────────────────────────────────────────────

/// A value that can be written as one row of a table.
pub trait TableRow {
    /// The SQL value for `column`, or `None` if this row type has no such column.
    fn column_value(&self, column: &str) -> Option<Value>;
}

fn text(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn integer(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

fn timestamp(value: &chrono::DateTime<chrono::Utc>) -> Value {
    Value::Text(value.to_rfc3339())
}

impl TableRow for Location {
    fn column_value(&self, column: &str) -> Option<Value> {
        Some(match column {
            "id" => Value::Integer(self.id),
            "name" => text(&self.name),
            "type" => text(&self.kind),
            "dimension" => text(&self.dimension),
            "residents" => Value::Text(encode_url_list(&self.residents)),
            "url" => text(&self.url),
            "created" => timestamp(&self.created),
            _ => return None,
        })
    }
}

impl TableRow for Episode {
    fn column_value(&self, column: &str) -> Option<Value> {
        Some(match column {
            "id" => Value::Integer(self.id),
            "name" => text(&self.name),
            "air_date" => text(&self.air_date),
            "episode" => text(&self.code),
            "characters" => Value::Text(encode_url_list(&self.characters)),
            "url" => text(&self.url),
            "created" => timestamp(&self.created),
            _ => return None,
        })
    }
}

impl TableRow for CharacterRow {
    fn column_value(&self, column: &str) -> Option<Value> {
        let c = &self.character;
        Some(match column {
            "id" => Value::Integer(c.id),
            "name" => text(&c.name),
            "status" => text(&c.status),
            "species" => text(&c.species),
            "gender" => text(&c.gender),
            "origin_id" => integer(self.origin_id),
            "location_id" => integer(self.location_id),
            "image" => text(&c.image),
            "source_created" => text(&c.source_created),
            "created" => timestamp(&c.created),
            _ => return None,
        })
    }
}

pub const LOCATION_COLUMNS: &[&str] =
    &["id", "name", "type", "dimension", "residents", "url", "created"];

pub const EPISODE_COLUMNS: &[&str] =
    &["id", "name", "air_date", "episode", "characters", "url", "created"];

pub const CHARACTER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "status",
    "species",
    "gender",
    "origin_id",
    "location_id",
    "image",
    "source_created",
    "created",
];

// ── Statement Building ──────────────────────────────────────────────────────

fn validate_identifier(name: &str) -> Result<(), OperationError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(OperationError::InvalidIdentifier(name.to_string()))
    }
}

/// Rows per statement, capped so no statement exceeds the parameter limit.
fn chunk_rows(batch_size: usize, columns: usize) -> usize {
    batch_size.max(1).min(MAX_BOUND_PARAMETERS / columns.max(1)).max(1)
}

fn values_clause(columns: usize, rows: usize) -> String {
    let row = format!("({})", vec!["?"; columns].join(", "));
    vec![row; rows].join(", ")
}

fn upsert_sql(table: &str, columns: &[&str], rows: usize) -> String {
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| **c != "id")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {table} ({}) VALUES {} ON CONFLICT(id) {conflict}",
        columns.join(", "),
        values_clause(columns.len(), rows),
    )
}

// ── Entity Operations ───────────────────────────────────────────────────────

/// Insert new rows and overwrite existing ones keyed by `id`.
///
/// Rows are written in chunks of `batch_size` inside a single transaction.
/// Returns the number of rows written. An empty `rows` is a logged no-op.
pub fn upsert_batch<R: TableRow>(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    rows: &[R],
    batch_size: usize,
) -> Result<usize, OperationError> {
    validate_identifier(table)?;
    for column in columns {
        validate_identifier(column)?;
    }
    if !columns.contains(&"id") {
        return Err(OperationError::MissingIdColumn(table.to_string()));
    }

    let Some(first) = rows.first() else {
        log::warn!("No rows to upsert into {}", table);
        return Ok(0);
    };
    if let Some(column) = columns.iter().find(|c| first.column_value(c).is_none()) {
        return Err(OperationError::ColumnMismatch {
            table: table.to_string(),
            column: column.to_string(),
        });
    }

    let tx = conn.unchecked_transaction()?;
    let mut written = 0;
    for chunk in rows.chunks(chunk_rows(batch_size, columns.len())) {
        let sql = upsert_sql(table, columns, chunk.len());
        let values = chunk.iter().flat_map(|row| {
            columns
                .iter()
                .map(move |c| row.column_value(c).unwrap_or(Value::Null))
        });
        written += tx
            .execute(&sql, params_from_iter(values))
            .map_err(|source| OperationError::Batch {
                table: table.to_string(),
                rows: rows.len(),
                source,
            })?;
    }
    tx.commit()?;

    log::debug!("Upserted {} rows into {}", written, table);
    Ok(written)
}

pub fn upsert_locations(
    conn: &Connection,
    locations: &[Location],
    batch_size: usize,
) -> Result<usize, OperationError> {
    upsert_batch(conn, "locations", LOCATION_COLUMNS, locations, batch_size)
}

pub fn upsert_episodes(
    conn: &Connection,
    episodes: &[Episode],
    batch_size: usize,
) -> Result<usize, OperationError> {
    upsert_batch(conn, "episodes", EPISODE_COLUMNS, episodes, batch_size)
}

pub fn upsert_characters(
    conn: &Connection,
    characters: &[CharacterRow],
    batch_size: usize,
) -> Result<usize, OperationError> {
    upsert_batch(conn, "characters", CHARACTER_COLUMNS, characters, batch_size)
}

// ── Relationship Operations ─────────────────────────────────────────────────

/// Table and column names of one link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipTable {
    pub name: &'static str,
    pub parent_column: &'static str,
    pub child_column: &'static str,
    pub url_column: &'static str,
}

impl RelationshipTable {
    pub const RESIDENTS: Self = Self {
        name: "residents",
        parent_column: "location_id",
        child_column: "character_id",
        url_column: "resident_url",
    };

    pub const EPISODE_CHARACTERS: Self = Self {
        name: "episode_characters",
        parent_column: "episode_id",
        child_column: "character_id",
        url_column: "character_url",
    };

    pub fn for_kind(kind: RelationshipKind) -> Self {
        match kind {
            RelationshipKind::Residents => Self::RESIDENTS,
            RelationshipKind::EpisodeCharacters => Self::EPISODE_CHARACTERS,
        }
    }
}

/// Insert link rows that are not already present; existing pairs are left
/// untouched. Returns the number of rows actually inserted.
pub fn insert_relationships(
    conn: &Connection,
    table: &RelationshipTable,
    rows: &[RelationshipRow],
    batch_size: usize,
) -> Result<usize, OperationError> {
    for name in [table.name, table.parent_column, table.child_column, table.url_column] {
        validate_identifier(name)?;
    }
    if rows.is_empty() {
        log::warn!("No relationship rows to insert into {}", table.name);
        return Ok(0);
    }

    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0;
    for chunk in rows.chunks(chunk_rows(batch_size, 3)) {
        let sql = format!(
            "INSERT OR IGNORE INTO {} ({}, {}, {}) VALUES {}",
            table.name,
            table.parent_column,
            table.child_column,
            table.url_column,
            values_clause(3, chunk.len()),
        );
        let values = chunk.iter().flat_map(|row| {
            [
                Value::Integer(row.parent_id),
                Value::Integer(row.child_id),
                Value::Text(row.url.clone()),
            ]
        });
        inserted += tx
            .execute(&sql, params_from_iter(values))
            .map_err(|source| OperationError::Batch {
                table: table.name.to_string(),
                rows: rows.len(),
                source,
            })?;
    }
    tx.commit()?;

    log::debug!(
        "Inserted {} of {} rows into {}",
        inserted,
        rows.len(),
        table.name
    );
    Ok(inserted)
}

// ── Run Log Operations ──────────────────────────────────────────────────────

/// Record a finished run. Returns the new run id.
pub fn insert_ingest_run(
    conn: &Connection,
    run: &IngestRun,
    summary_json: Option<&str>,
) -> Result<i64, OperationError> {
    conn.execute(
        "INSERT INTO ingest_runs (started_at, elapsed_secs, characters, locations, episodes,
             relationships_inserted, failed_pages, malformed_urls, unresolved_references, summary_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            run.started_at,
            run.elapsed_secs,
            run.characters,
            run.locations,
            run.episodes,
            run.relationships_inserted,
            run.failed_pages,
            run.malformed_urls,
            run.unresolved_references,
            summary_json,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(validate_identifier("episode_characters").is_ok());
        assert!(validate_identifier("_x1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("name; DROP TABLE x").is_err());
    }

    #[test]
    fn chunk_size_respects_parameter_limit() {
        assert_eq!(chunk_rows(1000, 10), 1000);
        assert_eq!(chunk_rows(100_000, 10), 3276);
        assert_eq!(chunk_rows(0, 3), 1);
    }

    #[test]
    fn upsert_statement_shape() {
        let sql = upsert_sql("locations", &["id", "name"], 2);
        assert_eq!(
            sql,
            "INSERT INTO locations (id, name) VALUES (?, ?), (?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name"
        );
        assert!(upsert_sql("t", &["id"], 1).ends_with("DO NOTHING"));
    }
}
