//! portal-ingest
//!
//! Fetches every character, location and episode from the listing API and
//! stores them, with their relationships, in a local SQLite database.
//! All settings come from the environment or the config file.

mod config;
mod error;
mod progress_bar;

use owo_colors::OwoColorize;
use owo_colors::Stream::{Stderr, Stdout};
use rusqlite::Connection;

use portal_fetch::{CancelFlag, HttpSource, PagedFetcher};
use portal_import::{Endpoints, RunSummary, relink_from_store, run_ingest};

use crate::config::IngestConfig;
use crate::error::CliError;
use crate::progress_bar::PhaseBar;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!(
            "{} {}",
            "\u{2718}".if_supports_color(Stderr, |t| t.bright_red()),
            e,
        );
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let config = IngestConfig::load()?;
    log::debug!("{:?}", config);

    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = portal_db::open_database(&config.database_path)
        .map_err(|e| CliError::database(format!("{}: {e}", config.database_path.display())))?;

    if config.relink_only {
        run_relink(&conn, &config)
    } else {
        run_full_ingest(&conn, &config)
    }
}

fn run_full_ingest(conn: &Connection, config: &IngestConfig) -> Result<(), CliError> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::runtime(format!("Failed to create tokio runtime: {e}")))?;

    let source =
        HttpSource::new(config.request_timeout).map_err(|e| CliError::fetch(e.to_string()))?;
    let cancel = CancelFlag::new();
    let fetcher = PagedFetcher::new(source, config.fetch_options()).with_cancel(cancel.clone());
    let endpoints = Endpoints::from_base(&config.api_base);

    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted; stopping before the next write");
            cancel.cancel();
        }
    });

    println!(
        "{} {}",
        "Ingesting from".if_supports_color(Stdout, |t| t.bold()),
        config.api_base.if_supports_color(Stdout, |t| t.cyan()),
    );

    let bar = PhaseBar::new();
    let result = rt.block_on(run_ingest(
        &fetcher,
        conn,
        &endpoints,
        &config.ingest_options(),
        &bar,
    ));
    bar.finish();

    print_summary(&result?, config);
    Ok(())
}

fn run_relink(conn: &Connection, config: &IngestConfig) -> Result<(), CliError> {
    let summary = relink_from_store(conn, config.batch_size)
        .map_err(|e| CliError::database(e.to_string()))?;
    println!(
        "{} {} residents, {} episode characters ({} malformed URLs)",
        "\u{2714} Relinked".if_supports_color(Stdout, |t| t.green()),
        summary.residents.inserted,
        summary.episode_characters.inserted,
        summary.malformed(),
    );
    Ok(())
}

fn print_summary(summary: &RunSummary, config: &IngestConfig) {
    let degraded = summary.failed_pages() > 0 || summary.malformed_urls() > 0;
    let mark = if degraded {
        "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()).to_string()
    } else {
        "\u{2714}".if_supports_color(Stdout, |t| t.green()).to_string()
    };
    println!("{mark} {summary}");

    for kind in portal_core::EntityKind::ALL {
        let counts = summary.kind(kind);
        println!(
            "  {:<10} fetched {:>5}  normalized {:>5}  persisted {:>5}",
            kind.as_str().if_supports_color(Stdout, |t| t.cyan()),
            counts.fetched,
            counts.normalized,
            counts.persisted,
        );
        if !counts.failed_pages.is_empty() {
            println!(
                "  {:<10} {}",
                "",
                format!("failed pages: {:?}", counts.failed_pages)
                    .if_supports_color(Stdout, |t| t.yellow()),
            );
        }
    }
    if summary.unresolved_references > 0 {
        println!(
            "  {}",
            format!(
                "{} location references matched no location",
                summary.unresolved_references
            )
            .if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    println!(
        "  {}",
        format!("Saved to {}", config.database_path.display())
            .if_supports_color(Stdout, |t| t.dimmed()),
    );
}
