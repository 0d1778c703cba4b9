//! Link-table population from URL lists.
//!
//! Used by the pipeline right after the parents are persisted, and by
//! [`relink_from_store`] to rebuild the link tables from the lists already
//! stored in the database without fetching anything.

use portal_core::{RelationshipKind, Resolution, resolve_relationships};
use portal_db::{OperationError, RelationshipTable, insert_relationships, queries};
use rusqlite::Connection;
use serde::Serialize;

/// Outcome of linking one relationship kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkCounts {
    /// Rows resolved from well-formed URLs.
    pub resolved: usize,
    /// Rows that were not already present.
    pub inserted: usize,
    /// URLs whose trailing segment was not a numeric id.
    pub malformed: usize,
}

/// Resolve every parent's URL list and insert the missing link rows.
///
/// Malformed URLs are logged and counted; they never block the rows of
/// well-formed URLs. All rows are written in a single atomic call.
pub fn link_relationships<'a, I>(
    conn: &Connection,
    kind: RelationshipKind,
    lists: I,
    batch_size: usize,
) -> Result<LinkCounts, OperationError>
where
    I: IntoIterator<Item = (i64, &'a [String])>,
{
    let mut resolution = Resolution::default();
    for (parent_id, urls) in lists {
        resolution.merge(resolve_relationships(parent_id, urls));
    }

    for (parent_id, err) in &resolution.errors {
        log::warn!("{} of parent {}: {}", kind, parent_id, err);
    }

    let table = RelationshipTable::for_kind(kind);
    let inserted = if resolution.rows.is_empty() {
        0
    } else {
        insert_relationships(conn, &table, &resolution.rows, batch_size)?
    };

    Ok(LinkCounts {
        resolved: resolution.rows.len(),
        inserted,
        malformed: resolution.errors.len(),
    })
}

/// Result of rebuilding both link tables from stored lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelinkSummary {
    pub residents: LinkCounts,
    pub episode_characters: LinkCounts,
}

impl RelinkSummary {
    pub fn inserted(&self) -> usize {
        self.residents.inserted + self.episode_characters.inserted
    }

    pub fn malformed(&self) -> usize {
        self.residents.malformed + self.episode_characters.malformed
    }
}

/// Rebuild `residents` and `episode_characters` from the URL lists stored
/// on `locations` and `episodes`. Existing link rows are kept.
pub fn relink_from_store(
    conn: &Connection,
    batch_size: usize,
) -> Result<RelinkSummary, OperationError> {
    let mut summary = RelinkSummary::default();
    for kind in [RelationshipKind::Residents, RelationshipKind::EpisodeCharacters] {
        let lists = queries::stored_url_lists(conn, kind)?;
        let counts = link_relationships(
            conn,
            kind,
            lists.iter().map(|(id, urls)| (*id, urls.as_slice())),
            batch_size,
        )?;
        log::info!(
            "Relinked {}: {} resolved, {} new, {} malformed",
            kind,
            counts.resolved,
            counts.inserted,
            counts.malformed
        );
        match kind {
            RelationshipKind::Residents => summary.residents = counts,
            RelationshipKind::EpisodeCharacters => summary.episode_characters = counts,
        }
    }
    Ok(summary)
}
