//! Turn the hash table's body rows into an edition -> hash map.

use crate::renderer::{ElementRef, Locator, RenderContext};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// One accepted row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    /// Language/region label, e.g. "English (United States) 64-bit".
    pub edition: String,
    /// Hex-encoded SHA256 digest as published.
    pub hash: String,
}

impl HashRecord {
    /// Build a record from raw cell text; `None` if either side is blank.
    pub fn from_cells(edition: &str, hash: &str) -> Option<Self> {
        let edition = edition.trim();
        let hash = hash.trim();
        if edition.is_empty() || hash.is_empty() {
            return None;
        }
        Some(Self {
            edition: edition.to_string(),
            hash: hash.to_string(),
        })
    }
}

/// Edition -> hash. Keys are kept exactly as scraped (after trimming);
/// iteration is in key order so the artifact is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashTable(BTreeMap<String, String>);

impl HashTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record; a repeated edition replaces the earlier hash.
    pub fn insert(&mut self, record: HashRecord) -> Option<String> {
        self.0.insert(record.edition, record.hash)
    }

    pub fn get(&self, edition: &str) -> Option<&str> {
        self.0.get(edition).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<HashRecord> for HashTable {
    fn from_iter<I: IntoIterator<Item = HashRecord>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

/// Cell texts of one body row, as read from the document. `None` stands for
/// a cell with no text content at all.
pub type RowCells = Vec<Option<String>>;

/// Build the mapping from rows. Only the first two cells are looked at;
/// rows with fewer cells or a blank edition/hash are skipped.
pub fn parse_rows<I>(rows: I) -> HashTable
where
    I: IntoIterator<Item = RowCells>,
{
    let mut table = HashTable::new();
    for (i, cells) in rows.into_iter().enumerate() {
        let record = match cells.as_slice() {
            [Some(edition), Some(hash), ..] => HashRecord::from_cells(edition, hash),
            _ => None,
        };
        match record {
            Some(record) => {
                if let Some(previous) = table.insert(record) {
                    trace!(row = i, %previous, "duplicate edition, keeping later hash");
                }
            }
            None => trace!(row = i, cells = cells.len(), "skipping row"),
        }
    }
    table
}

/// Read the body rows of `table`, at most two cells each.
///
/// A row with fewer than two `<td>` comes back shorter, which `parse_rows`
/// rejects.
pub async fn read_rows(ctx: &mut dyn RenderContext, table: ElementRef) -> Result<Vec<RowCells>> {
    let rows = ctx.locate(&Locator::within(table, "tbody tr")).await?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let cells = ctx.locate(&Locator::within(row, "td")).await?;
        let mut texts = Vec::with_capacity(2);
        for &cell in cells.iter().take(2) {
            texts.push(ctx.text_of(cell).await?);
        }
        out.push(texts);
    }
    Ok(out)
}
