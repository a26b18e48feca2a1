//! isohash: harvest the published Windows 11 ISO hash table.
//!
//! A headless browser loads the download page, the collapsed verification
//! panel is opened, the hash table is picked out by its content, and the rows
//! become an edition -> SHA256 map persisted as `hashes.json`.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod extraction;
pub mod logging;
pub mod lookup;
pub mod pipeline;
pub mod renderer;

pub use error::{ArtifactError, ScrapeError};
pub use extraction::disclosure::DisclosureState;
pub use extraction::rows::{HashRecord, HashTable};
pub use lookup::Lookup;
pub use pipeline::{ExtractionStatus, RunReport};
