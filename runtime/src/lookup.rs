//! Answer "what is the hash for my language?" against a harvested table.

use crate::extraction::rows::{HashRecord, HashTable};
use serde::Serialize;

/// Outcome of an optional edition query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Lookup {
    /// No query was given.
    Skipped,
    /// Editions containing the query, in table order.
    Found { query: String, matches: Vec<HashRecord> },
    /// The query matched nothing. Callers must surface this.
    NotFound { query: String },
}

impl Lookup {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Case-insensitive substring match of `query` against every edition.
pub fn find(table: &HashTable, query: Option<&str>) -> Lookup {
    let Some(query) = query else {
        return Lookup::Skipped;
    };

    let needle = query.to_lowercase();
    let matches: Vec<HashRecord> = table
        .iter()
        .filter(|(edition, _)| edition.to_lowercase().contains(&needle))
        .map(|(edition, hash)| HashRecord {
            edition: edition.to_string(),
            hash: hash.to_string(),
        })
        .collect();

    if matches.is_empty() {
        Lookup::NotFound {
            query: query.to_string(),
        }
    } else {
        Lookup::Found {
            query: query.to_string(),
            matches,
        }
    }
}
