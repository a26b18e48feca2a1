//! One harvest run: load, expand, classify, parse, persist, look up.
//!
//! Only a failed page load (or a document that stops answering) aborts the
//! run. Everything else ends in a terminal [`ExtractionStatus`]. The page
//! context is closed on every path.

use crate::artifact;
use crate::config::ScrapeConfig;
use crate::error::{Result, ScrapeError};
use crate::extraction::classifier::{self, MarkerPolicy, TablePolicy};
use crate::extraction::disclosure::{self, DisclosureState};
use crate::extraction::rows::{self, HashTable};
use crate::lookup::{self, Lookup};
use crate::renderer::{RenderContext, Renderer};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// How extraction ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Rows were parsed and written to `artifact`.
    Extracted { count: usize, artifact: PathBuf },
    /// No table on the page matched the policy.
    NoQualifyingTable,
    /// A table matched but none of its rows were usable.
    EmptyExtraction,
}

impl ExtractionStatus {
    /// Short machine-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Extracted { .. } => "extracted",
            Self::NoQualifyingTable => "no_qualifying_table",
            Self::EmptyExtraction => "empty_extraction",
        }
    }
}

/// Everything a caller needs to report the run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub final_url: String,
    pub disclosure: DisclosureState,
    pub status: ExtractionStatus,
    pub table: HashTable,
    pub lookup: Lookup,
}

/// Run the pipeline with the default table policy.
pub async fn run(renderer: &dyn Renderer, config: &ScrapeConfig, query: Option<&str>) -> Result<RunReport> {
    run_with_policy(renderer, config, &MarkerPolicy::iso_hashes(), query).await
}

/// Run the pipeline, choosing the table with `policy`.
pub async fn run_with_policy(
    renderer: &dyn Renderer,
    config: &ScrapeConfig,
    policy: &dyn TablePolicy,
    query: Option<&str>,
) -> Result<RunReport> {
    let mut ctx = renderer.new_context().await.map_err(ScrapeError::Context)?;
    let result = harvest(ctx.as_mut(), config, policy, query).await;

    if let Err(e) = ctx.close().await {
        warn!("failed to close page: {e:#}");
    }
    result
}

async fn harvest(
    ctx: &mut dyn RenderContext,
    config: &ScrapeConfig,
    policy: &dyn TablePolicy,
    query: Option<&str>,
) -> Result<RunReport> {
    info!("loading {}", config.url);
    let nav = ctx
        .navigate(config.url.as_str(), config.navigation_timeout_ms)
        .await
        .map_err(|source| ScrapeError::Navigation {
            url: config.url.to_string(),
            source,
        })?;
    info!("page loaded in {}ms", nav.load_time_ms);

    let disclosure = disclosure::ensure_expanded(ctx, &config.disclosure).await;

    let tables = classifier::collect_tables(ctx)
        .await
        .map_err(|source| ScrapeError::Document {
            stage: "listing tables",
            source,
        })?;
    let selected = classifier::select_table(&tables, policy).map(|t| t.element);
    settle(config).await;

    let Some(element) = selected else {
        info!("no qualifying table among {} candidates", tables.len());
        return Ok(RunReport {
            final_url: nav.final_url,
            disclosure,
            status: ExtractionStatus::NoQualifyingTable,
            table: HashTable::new(),
            lookup: Lookup::Skipped,
        });
    };

    info!("found hash table, extracting rows");
    let raw = rows::read_rows(ctx, element)
        .await
        .map_err(|source| ScrapeError::Document {
            stage: "reading rows",
            source,
        })?;
    let table = rows::parse_rows(raw);

    if table.is_empty() {
        info!("hash table has no usable rows");
        return Ok(RunReport {
            final_url: nav.final_url,
            disclosure,
            status: ExtractionStatus::EmptyExtraction,
            table,
            lookup: Lookup::Skipped,
        });
    }

    artifact::write_artifact(&config.artifact_path, &table)?;
    let lookup = lookup::find(&table, query);

    Ok(RunReport {
        final_url: nav.final_url,
        disclosure,
        status: ExtractionStatus::Extracted {
            count: table.len(),
            artifact: config.artifact_path.clone(),
        },
        table,
        lookup,
    })
}

async fn settle(config: &ScrapeConfig) {
    if !config.settle_delay.is_zero() {
        tokio::time::sleep(config.settle_delay).await;
    }
}
