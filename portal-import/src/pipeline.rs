//! One ingestion run: fetch every kind, normalize, resolve, persist.
//!
//! The fetch phase is async and runs the three listings concurrently. The
//! persist phase is synchronous and touches the database only from the
//! calling task, since `rusqlite::Connection` is not `Send`.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use portal_core::*;
use portal_db::{DEFAULT_BATCH_SIZE, OperationError, operations};
use portal_fetch::{FetchReport, PageSource, PagedFetcher, Sleeper};
use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::progress::IngestProgress;
use crate::relink::{LinkCounts, link_relationships};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Db(#[from] OperationError),
    #[error("Ingest cancelled before {0}")]
    Cancelled(&'static str),
}

/// Listing URLs for each entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub character: String,
    pub location: String,
    pub episode: String,
}

impl Endpoints {
    /// Derive the three listing URLs from an API base such as
    /// `https://rickandmortyapi.com/api`.
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let url = |kind: EntityKind| format!("{base}/{}", kind.endpoint_path());
        Self {
            character: url(EntityKind::Character),
            location: url(EntityKind::Location),
            episode: url(EntityKind::Episode),
        }
    }

    pub fn url(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Character => &self.character,
            EntityKind::Location => &self.location,
            EntityKind::Episode => &self.episode,
        }
    }
}

/// Options for the persist phase.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Rows per multi-row statement.
    pub batch_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

// ── Summary ─────────────────────────────────────────────────────────────────

/// Per-kind counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KindSummary {
    /// Raw records retrieved.
    pub fetched: usize,
    /// Records that became typed entities.
    pub normalized: usize,
    /// Rows written by the upsert.
    pub persisted: usize,
    /// Page numbers that failed every attempt.
    pub failed_pages: Vec<u32>,
}

/// Structured result of one run, suitable for logging.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub characters: KindSummary,
    pub locations: KindSummary,
    pub episodes: KindSummary,
    pub residents: LinkCounts,
    pub episode_characters: LinkCounts,
    /// Character origin/location names that matched no location.
    pub unresolved_references: usize,
    /// Location names that mapped to more than one id.
    pub lookup_collisions: usize,
    pub elapsed_secs: f64,
    /// Id of the `ingest_runs` row, once recorded.
    pub run_id: Option<i64>,
}

impl RunSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            characters: KindSummary::default(),
            locations: KindSummary::default(),
            episodes: KindSummary::default(),
            residents: LinkCounts::default(),
            episode_characters: LinkCounts::default(),
            unresolved_references: 0,
            lookup_collisions: 0,
            elapsed_secs: 0.0,
            run_id: None,
        }
    }

    pub fn kind(&self, kind: EntityKind) -> &KindSummary {
        match kind {
            EntityKind::Character => &self.characters,
            EntityKind::Location => &self.locations,
            EntityKind::Episode => &self.episodes,
        }
    }

    fn kind_mut(&mut self, kind: EntityKind) -> &mut KindSummary {
        match kind {
            EntityKind::Character => &mut self.characters,
            EntityKind::Location => &mut self.locations,
            EntityKind::Episode => &mut self.episodes,
        }
    }

    pub fn relationships_inserted(&self) -> usize {
        self.residents.inserted + self.episode_characters.inserted
    }

    pub fn malformed_urls(&self) -> usize {
        self.residents.malformed + self.episode_characters.malformed
    }

    pub fn failed_pages(&self) -> usize {
        EntityKind::ALL
            .iter()
            .map(|k| self.kind(*k).failed_pages.len())
            .sum()
    }

    /// Row for the `ingest_runs` table.
    pub fn to_ingest_run(&self) -> IngestRun {
        IngestRun {
            id: self.run_id.unwrap_or(0),
            started_at: self.started_at.to_rfc3339(),
            elapsed_secs: self.elapsed_secs,
            characters: self.characters.persisted as i64,
            locations: self.locations.persisted as i64,
            episodes: self.episodes.persisted as i64,
            relationships_inserted: self.relationships_inserted() as i64,
            failed_pages: self.failed_pages() as i64,
            malformed_urls: self.malformed_urls() as i64,
            unresolved_references: self.unresolved_references as i64,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} characters, {} locations, {} episodes, {} new links in {:.1}s",
            self.characters.persisted,
            self.locations.persisted,
            self.episodes.persisted,
            self.relationships_inserted(),
            self.elapsed_secs
        )?;
        let failed = self.failed_pages();
        if failed > 0 {
            write!(f, " ({failed} pages failed)")?;
        }
        if self.malformed_urls() > 0 {
            write!(f, " ({} malformed URLs)", self.malformed_urls())?;
        }
        Ok(())
    }
}

// ── Fetch Phase ─────────────────────────────────────────────────────────────

/// Raw listings of one run.
#[derive(Debug, Default)]
pub struct FetchedListings {
    pub characters: FetchReport,
    pub locations: FetchReport,
    pub episodes: FetchReport,
}

/// Fetch all three listings concurrently.
///
/// A failure in one listing never affects the others; each report carries
/// whatever records its pages produced.
pub async fn fetch_all_kinds<S: PageSource, Z: Sleeper>(
    fetcher: &PagedFetcher<S, Z>,
    endpoints: &Endpoints,
) -> FetchedListings {
    let (characters, locations, episodes) = futures::join!(
        fetcher.fetch_all(&endpoints.character),
        fetcher.fetch_all(&endpoints.location),
        fetcher.fetch_all(&endpoints.episode),
    );
    FetchedListings {
        characters,
        locations,
        episodes,
    }
}

// ── Normalize Phase ─────────────────────────────────────────────────────────

fn normalize_records<T>(
    kind: EntityKind,
    records: &[RawRecord],
    now: DateTime<Utc>,
    into: fn(Entity) -> Option<T>,
) -> Vec<T> {
    records
        .iter()
        .filter_map(|raw| match normalize(kind, raw, now) {
            Ok(entity) => into(entity),
            Err(e) => {
                log::warn!("Skipping {} record: {}", kind, e);
                None
            }
        })
        .collect()
}

fn record_fetch(
    summary: &mut RunSummary,
    kind: EntityKind,
    report: &FetchReport,
    progress: &dyn IngestProgress,
) {
    let entry = summary.kind_mut(kind);
    entry.fetched = report.records.len();
    entry.failed_pages = report.failed_pages.clone();
    progress.on_kind_fetched(kind, report.records.len(), report.failed_pages.len());
}

// ── Orchestration ───────────────────────────────────────────────────────────

fn check_cancel<S: PageSource, Z: Sleeper>(
    fetcher: &PagedFetcher<S, Z>,
    step: &'static str,
) -> Result<(), IngestError> {
    if fetcher.cancel_flag().is_cancelled() {
        log::warn!("Ingest cancelled before {}", step);
        return Err(IngestError::Cancelled(step));
    }
    Ok(())
}

/// Run one full ingest.
///
/// Fetch failures reduce counts but never fail the run. Any persistence
/// error is fatal and is returned with the table and row count. The
/// fetcher's cancel flag is checked before each persist step; steps already
/// committed stay committed.
pub async fn run_ingest<S: PageSource, Z: Sleeper>(
    fetcher: &PagedFetcher<S, Z>,
    conn: &Connection,
    endpoints: &Endpoints,
    options: &IngestOptions,
    progress: &dyn IngestProgress,
) -> Result<RunSummary, IngestError> {
    let started = Instant::now();
    let now = Utc::now();
    let mut summary = RunSummary::new(now);

    progress.on_phase("Fetching characters, locations and episodes");
    let fetched = fetch_all_kinds(fetcher, endpoints).await;
    record_fetch(&mut summary, EntityKind::Character, &fetched.characters, progress);
    record_fetch(&mut summary, EntityKind::Location, &fetched.locations, progress);
    record_fetch(&mut summary, EntityKind::Episode, &fetched.episodes, progress);

    let locations = normalize_records(
        EntityKind::Location,
        &fetched.locations.records,
        now,
        Entity::into_location,
    );
    let episodes = normalize_records(
        EntityKind::Episode,
        &fetched.episodes.records,
        now,
        Entity::into_episode,
    );
    let characters = normalize_records(
        EntityKind::Character,
        &fetched.characters.records,
        now,
        Entity::into_character,
    );
    summary.locations.normalized = locations.len();
    summary.episodes.normalized = episodes.len();
    summary.characters.normalized = characters.len();
    drop(fetched);

    let batch_size = options.batch_size;

    check_cancel(fetcher, "locations")?;
    progress.on_phase("Persisting locations");
    summary.locations.persisted = operations::upsert_locations(conn, &locations, batch_size)?;

    check_cancel(fetcher, "episodes")?;
    progress.on_phase("Persisting episodes");
    summary.episodes.persisted = operations::upsert_episodes(conn, &episodes, batch_size)?;

    let lookup = build_lookup(&locations);
    summary.lookup_collisions = lookup.collisions();
    if lookup.collisions() > 0 {
        log::warn!(
            "{} location names are shared; references use the last id seen",
            lookup.collisions()
        );
    }

    let rows: Vec<CharacterRow> = characters
        .into_iter()
        .map(|c| {
            let row = resolve_character(c, &lookup);
            let c = &row.character;
            let misses = [
                c.origin.is_some() && row.origin_id.is_none(),
                c.location.is_some() && row.location_id.is_none(),
            ];
            summary.unresolved_references += misses.iter().filter(|m| **m).count();
            row
        })
        .collect();

    check_cancel(fetcher, "characters")?;
    progress.on_phase("Persisting characters");
    summary.characters.persisted = operations::upsert_characters(conn, &rows, batch_size)?;

    check_cancel(fetcher, "residents")?;
    progress.on_phase("Linking residents");
    summary.residents = link_relationships(
        conn,
        RelationshipKind::Residents,
        locations.iter().map(|l| (l.id, l.residents.as_slice())),
        batch_size,
    )?;

    check_cancel(fetcher, "episode characters")?;
    progress.on_phase("Linking episode characters");
    summary.episode_characters = link_relationships(
        conn,
        RelationshipKind::EpisodeCharacters,
        episodes.iter().map(|e| (e.id, e.characters.as_slice())),
        batch_size,
    )?;

    summary.elapsed_secs = started.elapsed().as_secs_f64();
    let summary_json = match serde_json::to_string(&summary) {
        Ok(json) => Some(json),
        Err(e) => {
            log::warn!("Could not serialize run summary: {}", e);
            None
        }
    };
    summary.run_id = Some(operations::insert_ingest_run(
        conn,
        &summary.to_ingest_run(),
        summary_json.as_deref(),
    )?);

    progress.on_complete(&format!("Ingest complete: {summary}"));
    Ok(summary)
}
