//! SQLite persistence layer for ingested entities.
//!
//! Provides schema creation, transactional batch upserts for entities,
//! insert-if-absent writes for relationship link tables, and read queries
//! backed by SQLite (via rusqlite with bundled feature).

pub mod operations;
pub mod queries;
pub mod schema;

pub use operations::{
    CHARACTER_COLUMNS, DEFAULT_BATCH_SIZE, EPISODE_COLUMNS, LOCATION_COLUMNS, OperationError,
    RelationshipTable, TableRow, insert_ingest_run, insert_relationships, upsert_batch,
    upsert_characters, upsert_episodes, upsert_locations,
};
pub use queries::{
    StoredCharacter, TableCounts, character_by_id, recent_runs, stored_url_lists, table_counts,
};
pub use schema::{SchemaError, open_database, open_memory};
