//! Fatal error taxonomy for a harvest run.
//!
//! Non-fatal outcomes (panel unavailable, no table, empty table, query miss)
//! are not errors; they are reported through `pipeline::ExtractionStatus`
//! and `lookup::Lookup`.

use std::path::PathBuf;
use thiserror::Error;

/// Faults that abort the pipeline.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The page could not be loaded. Nothing is written.
    #[error("failed to load page {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    /// No document context could be provided: the browser did not start,
    /// the snapshot could not be read, or a page could not be opened.
    #[error("failed to open a document context: {0}")]
    Context(#[source] anyhow::Error),

    /// The document stopped answering queries mid-extraction.
    #[error("document query failed while {stage}: {source}")]
    Document {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Failures reading or writing `hashes.json`.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("refusing to write an empty hash table to {}", .0.display())]
    Empty(PathBuf),

    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;
