use portal_db::open_memory;
use portal_db::schema::{
    CURRENT_VERSION, SchemaError, create_schema, get_schema_version, open_database,
};
use rusqlite::Connection;

#[test]
fn create_schema_in_memory() {
    let conn = open_memory().unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
}

#[test]
fn schema_is_idempotent() {
    let conn = open_memory().unwrap();
    create_schema(&conn).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn foreign_keys_enabled() {
    let conn = open_memory().unwrap();
    let fk: i32 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fk, 1);
}

#[test]
fn all_tables_exist() {
    let conn = open_memory().unwrap();
    let tables = [
        "schema_version",
        "locations",
        "episodes",
        "characters",
        "residents",
        "episode_characters",
        "ingest_runs",
    ];
    for table in tables {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert!(exists, "Table '{}' should exist", table);
    }
}

#[test]
fn reopen_on_disk_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.db");
    {
        let conn = open_database(&path).unwrap();
        conn.execute(
            "INSERT INTO locations (id, name, created) VALUES (1, 'Earth', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
    }
    let conn = open_database(&path).unwrap();
    let name: String = conn
        .query_row("SELECT name FROM locations WHERE id = 1", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "Earth");
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
}

#[test]
fn reopen_at_current_version_records_no_migration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("portal.db");
    drop(open_database(&path).unwrap());

    let conn = open_database(&path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(get_schema_version(&conn).unwrap(), 1);
}

#[test]
fn newer_database_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER NOT NULL, applied_at TEXT);
             INSERT INTO schema_version (version) VALUES (99);",
        )
        .unwrap();
    }
    let err = open_database(&path).unwrap_err();
    assert!(matches!(
        err,
        SchemaError::VersionMismatch {
            expected: CURRENT_VERSION,
            found: 99
        }
    ));
}
