//! SQLite schema creation and migration.

use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: expected version {expected}, found {found}")]
    VersionMismatch { expected: i32, found: i32 },
}

/// Current schema version. Increment when adding migrations.
pub const CURRENT_VERSION: i32 = 1;

/// Create all tables and indexes if they don't exist.
///
/// Safe to call on an existing database.
pub fn create_schema(conn: &Connection) -> Result<(), SchemaError> {
    conn.execute_batch(SCHEMA_SQL)?;
    if get_schema_version(conn)? != CURRENT_VERSION {
        set_schema_version(conn, CURRENT_VERSION)?;
    }
    Ok(())
}

/// Open or create an ingest database at the given path.
///
/// Parent directories are not created; the caller owns the path.
pub fn open_database(path: &std::path::Path) -> Result<Connection, SchemaError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let version = get_schema_version(&conn)?;
    if version == 0 {
        create_schema(&conn)?;
    } else if version != CURRENT_VERSION {
        migrate(&conn, version)?;
    }

    Ok(conn)
}

/// Open an in-memory database with the full schema. Useful for testing.
pub fn open_memory() -> Result<Connection, SchemaError> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Get the current schema version, or 0 if no schema exists.
pub fn get_schema_version(conn: &Connection) -> Result<i32, SchemaError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version: i32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), SchemaError> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Run migrations from `from_version` up to `CURRENT_VERSION`.
fn migrate(conn: &Connection, from_version: i32) -> Result<(), SchemaError> {
    if from_version > CURRENT_VERSION {
        return Err(SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: from_version,
        });
    }

    // Each step upgrades `version` to `version + 1`. Version 1 is the first
    // released schema, so there are no steps yet.
    let mut version = from_version;
    while version < CURRENT_VERSION {
        version += 1;
        set_schema_version(conn, version)?;
        log::info!("Migrated ingest database to schema version {}", version);
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Locations (referenced by characters.origin_id / location_id)
CREATE TABLE IF NOT EXISTS locations (
    id INTEGER PRIMARY KEY,
    name TEXT,
    type TEXT,
    dimension TEXT,
    residents TEXT NOT NULL DEFAULT '[]',
    url TEXT,
    created TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_locations_name ON locations(name);

-- Episodes
CREATE TABLE IF NOT EXISTS episodes (
    id INTEGER PRIMARY KEY,
    name TEXT,
    air_date TEXT,
    episode TEXT,
    characters TEXT NOT NULL DEFAULT '[]',
    url TEXT,
    created TEXT NOT NULL
);

-- Characters
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY,
    name TEXT,
    status TEXT,
    species TEXT,
    gender TEXT,
    origin_id INTEGER REFERENCES locations(id),
    location_id INTEGER REFERENCES locations(id),
    image TEXT,
    source_created TEXT,
    created TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_characters_location ON characters(location_id);

-- Location → character links. character_id is not a foreign key: a
-- character page may have failed to fetch while its location succeeded.
CREATE TABLE IF NOT EXISTS residents (
    location_id INTEGER NOT NULL REFERENCES locations(id),
    character_id INTEGER NOT NULL,
    resident_url TEXT NOT NULL,
    PRIMARY KEY (location_id, character_id)
);

CREATE INDEX IF NOT EXISTS idx_residents_character ON residents(character_id);

-- Episode → character links
CREATE TABLE IF NOT EXISTS episode_characters (
    episode_id INTEGER NOT NULL REFERENCES episodes(id),
    character_id INTEGER NOT NULL,
    character_url TEXT NOT NULL,
    PRIMARY KEY (episode_id, character_id)
);

CREATE INDEX IF NOT EXISTS idx_episode_characters_character ON episode_characters(character_id);

-- One row per completed ingest run
CREATE TABLE IF NOT EXISTS ingest_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    elapsed_secs REAL NOT NULL,
    characters INTEGER NOT NULL DEFAULT 0,
    locations INTEGER NOT NULL DEFAULT 0,
    episodes INTEGER NOT NULL DEFAULT 0,
    relationships_inserted INTEGER NOT NULL DEFAULT 0,
    failed_pages INTEGER NOT NULL DEFAULT 0,
    malformed_urls INTEGER NOT NULL DEFAULT 0,
    unresolved_references INTEGER NOT NULL DEFAULT 0,
    summary_json TEXT
);

"#;
