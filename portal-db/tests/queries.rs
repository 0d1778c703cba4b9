use chrono::Utc;
use portal_core::types::*;
use portal_db::*;
use rusqlite::Connection;

fn setup_db() -> Connection {
    let conn = open_memory().unwrap();
    let earth = Location {
        id: 1,
        name: Some("Earth".into()),
        kind: None,
        dimension: None,
        residents: vec![
            "https://example.test/api/character/1".into(),
            "https://example.test/api/character/2".into(),
        ],
        url: None,
        created: Utc::now(),
    };
    let citadel = Location {
        id: 3,
        name: Some("Citadel of Ricks".into()),
        residents: vec![],
        ..earth.clone()
    };
    upsert_locations(&conn, &[citadel, earth], DEFAULT_BATCH_SIZE).unwrap();
    conn
}

#[test]
fn counts_every_table() {
    let conn = setup_db();
    let counts = table_counts(&conn).unwrap();
    assert_eq!(counts.locations, 2);
    assert_eq!(counts.characters, 0);
    assert_eq!(counts.residents, 0);
}

#[test]
fn missing_character_is_none() {
    let conn = setup_db();
    assert!(character_by_id(&conn, 404).unwrap().is_none());
}

#[test]
fn url_lists_round_trip_through_storage() {
    let conn = setup_db();
    let lists = stored_url_lists(&conn, RelationshipKind::Residents).unwrap();
    assert_eq!(
        lists,
        vec![
            (
                1,
                vec![
                    "https://example.test/api/character/1".to_string(),
                    "https://example.test/api/character/2".to_string(),
                ]
            ),
            (3, vec![]),
        ]
    );
}

#[test]
fn array_literal_lists_are_decoded() {
    let conn = setup_db();
    conn.execute(
        "UPDATE locations SET residents = '{https://example.test/api/character/9}' WHERE id = 3",
        [],
    )
    .unwrap();
    let lists = stored_url_lists(&conn, RelationshipKind::Residents).unwrap();
    assert_eq!(lists[1].1, vec!["https://example.test/api/character/9".to_string()]);
}

#[test]
fn recent_runs_newest_first() {
    let conn = setup_db();
    for n in 1..=3 {
        let run = IngestRun {
            started_at: format!("2024-05-0{n}T00:00:00+00:00"),
            characters: n,
            ..IngestRun::default()
        };
        insert_ingest_run(&conn, &run, None).unwrap();
    }

    let runs = recent_runs(&conn, 2).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].characters, 3);
    assert_eq!(runs[1].characters, 2);
    assert!(runs[0].id > runs[1].id);
}
