use chrono::{TimeZone, Utc};
use portal_core::types::*;
use portal_db::operations::*;
use portal_db::{TableCounts, open_memory, table_counts};
use rusqlite::Connection;

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn location(id: i64, name: &str, residents: &[&str]) -> Location {
    Location {
        id,
        name: Some(name.to_string()),
        kind: Some("Planet".to_string()),
        dimension: Some("C-137".to_string()),
        residents: residents.iter().map(|s| s.to_string()).collect(),
        url: Some(format!("https://example.test/api/location/{id}")),
        created: now(),
    }
}

fn episode(id: i64, code: &str) -> Episode {
    Episode {
        id,
        name: Some(format!("Episode {id}")),
        air_date: Some("December 2, 2013".to_string()),
        code: Some(code.to_string()),
        characters: vec![],
        url: None,
        created: now(),
    }
}

fn character(id: i64, name: &str, location_id: Option<i64>) -> CharacterRow {
    CharacterRow {
        character: Character {
            id,
            name: Some(name.to_string()),
            status: Some("Alive".to_string()),
            species: Some("Human".to_string()),
            gender: None,
            origin: None,
            location: None,
            image: None,
            source_created: Some("2017-11-04T18:48:46.250Z".to_string()),
            created: now(),
        },
        origin_id: None,
        location_id,
    }
}

fn link(parent_id: i64, child_id: i64) -> RelationshipRow {
    RelationshipRow {
        parent_id,
        child_id,
        url: format!("https://example.test/api/character/{child_id}"),
    }
}

fn setup() -> Connection {
    open_memory().unwrap()
}

// ── Upserts ─────────────────────────────────────────────────────────────────

#[test]
fn upsert_twice_keeps_row_count() {
    let conn = setup();
    let locations = vec![location(1, "Earth", &[]), location(2, "Mars", &[])];

    assert_eq!(upsert_locations(&conn, &locations, DEFAULT_BATCH_SIZE).unwrap(), 2);
    upsert_locations(&conn, &locations, DEFAULT_BATCH_SIZE).unwrap();

    assert_eq!(table_counts(&conn).unwrap().locations, 2);
}

#[test]
fn upsert_overwrites_existing_row() {
    let conn = setup();
    upsert_locations(&conn, &[location(1, "Earth", &[])], DEFAULT_BATCH_SIZE).unwrap();

    let mut renamed = location(
        1,
        "Earth (Replacement Dimension)",
        &["https://example.test/api/character/1"],
    );
    renamed.dimension = None;
    upsert_locations(&conn, &[renamed], DEFAULT_BATCH_SIZE).unwrap();

    let (name, dimension, residents): (String, Option<String>, String) = conn
        .query_row(
            "SELECT name, dimension, residents FROM locations WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "Earth (Replacement Dimension)");
    assert_eq!(dimension, None);
    assert_eq!(residents, r#"["https://example.test/api/character/1"]"#);
}

#[test]
fn empty_upsert_is_noop() {
    let conn = setup();
    let none: Vec<Location> = Vec::new();
    assert_eq!(upsert_locations(&conn, &none, DEFAULT_BATCH_SIZE).unwrap(), 0);
    assert_eq!(table_counts(&conn).unwrap(), TableCounts::default());
}

#[test]
fn small_batches_write_every_row() {
    let conn = setup();
    let episodes: Vec<Episode> = (1..=25).map(|id| episode(id, "S01E01")).collect();

    assert_eq!(upsert_episodes(&conn, &episodes, 4).unwrap(), 25);
    assert_eq!(table_counts(&conn).unwrap().episodes, 25);
}

#[test]
fn rejects_bad_identifiers() {
    let conn = setup();
    let rows = [location(1, "Earth", &[])];

    let err = upsert_batch(&conn, "locations; DROP TABLE x", LOCATION_COLUMNS, &rows, 10)
        .unwrap_err();
    assert!(matches!(err, OperationError::InvalidIdentifier(_)));

    let err = upsert_batch(&conn, "locations", &["name", "created"], &rows, 10).unwrap_err();
    assert!(matches!(err, OperationError::MissingIdColumn(_)));

    let err = upsert_batch(&conn, "locations", &["id", "air_date"], &rows, 10).unwrap_err();
    assert!(matches!(err, OperationError::ColumnMismatch { .. }));
}

#[test]
fn failed_batch_commits_nothing() {
    let conn = setup();
    upsert_locations(&conn, &[location(1, "Earth", &[])], DEFAULT_BATCH_SIZE).unwrap();

    // Second chunk references a location that does not exist.
    let characters = vec![
        character(1, "Rick", Some(1)),
        character(2, "Morty", Some(1)),
        character(3, "Ghost", Some(999)),
    ];
    let err = upsert_characters(&conn, &characters, 2).unwrap_err();
    match err {
        OperationError::Batch { table, rows, .. } => {
            assert_eq!(table, "characters");
            assert_eq!(rows, 3);
        }
        other => panic!("expected batch error, got {other:?}"),
    }

    assert_eq!(table_counts(&conn).unwrap().characters, 0);
}

#[test]
fn character_columns_are_stored() {
    let conn = setup();
    upsert_locations(&conn, &[location(10, "Earth", &[])], DEFAULT_BATCH_SIZE).unwrap();
    let mut rick = character(1, "Rick", Some(10));
    rick.origin_id = Some(10);
    upsert_characters(&conn, &[rick], DEFAULT_BATCH_SIZE).unwrap();

    let stored = portal_db::character_by_id(&conn, 1).unwrap().unwrap();
    assert_eq!(stored.location_id, Some(10));
    assert_eq!(stored.origin_id, Some(10));
    assert_eq!(stored.source_created.as_deref(), Some("2017-11-04T18:48:46.250Z"));
    assert_eq!(stored.created, now().to_rfc3339());
}

// ── Relationships ───────────────────────────────────────────────────────────

#[test]
fn relationship_insert_is_idempotent() {
    let conn = setup();
    upsert_locations(&conn, &[location(1, "Earth", &[])], DEFAULT_BATCH_SIZE).unwrap();
    let rows = vec![link(1, 1), link(1, 2)];

    let first = insert_relationships(&conn, &RelationshipTable::RESIDENTS, &rows, 1000).unwrap();
    let second = insert_relationships(&conn, &RelationshipTable::RESIDENTS, &rows, 1000).unwrap();

    assert_eq!(first, 2);
    assert_eq!(second, 0);
    assert_eq!(table_counts(&conn).unwrap().residents, 2);
}

#[test]
fn relationship_conflict_keeps_first_url() {
    let conn = setup();
    upsert_episodes(&conn, &[episode(1, "S01E01")], DEFAULT_BATCH_SIZE).unwrap();
    let table = RelationshipTable::for_kind(RelationshipKind::EpisodeCharacters);

    insert_relationships(&conn, &table, &[link(1, 7)], 1000).unwrap();
    let mut dup = link(1, 7);
    dup.url = "https://example.test/api/character/7/".to_string();
    let inserted = insert_relationships(&conn, &table, &[dup], 1000).unwrap();
    assert_eq!(inserted, 0);

    let url: String = conn
        .query_row(
            "SELECT character_url FROM episode_characters WHERE episode_id = 1 AND character_id = 7",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(url, "https://example.test/api/character/7");
}

#[test]
fn duplicate_pairs_in_one_call_are_collapsed() {
    let conn = setup();
    upsert_locations(&conn, &[location(1, "Earth", &[])], DEFAULT_BATCH_SIZE).unwrap();
    let rows = vec![link(1, 3), link(1, 3), link(1, 4)];
    let inserted = insert_relationships(&conn, &RelationshipTable::RESIDENTS, &rows, 2).unwrap();
    assert_eq!(inserted, 2);
}

#[test]
fn relationship_to_missing_parent_rolls_back() {
    let conn = setup();
    upsert_locations(&conn, &[location(1, "Earth", &[])], DEFAULT_BATCH_SIZE).unwrap();
    let rows = vec![link(1, 1), link(42, 1)];

    let err = insert_relationships(&conn, &RelationshipTable::RESIDENTS, &rows, 1).unwrap_err();
    assert!(matches!(err, OperationError::Batch { rows: 2, .. }));
    assert_eq!(table_counts(&conn).unwrap().residents, 0);
}

// ── Run Log ─────────────────────────────────────────────────────────────────

#[test]
fn run_log_entries_get_increasing_ids() {
    let conn = setup();
    let run = IngestRun {
        started_at: now().to_rfc3339(),
        elapsed_secs: 1.25,
        characters: 3,
        ..IngestRun::default()
    };
    let first = insert_ingest_run(&conn, &run, None).unwrap();
    let second = insert_ingest_run(&conn, &run, Some("{}")).unwrap();
    assert!(second > first);
}
