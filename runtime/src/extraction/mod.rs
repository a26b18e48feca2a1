//! Locating and reading the hash table.
//!
//! Three steps, run in order against one page: open the verification panel
//! (`disclosure`), pick the right `<table>` (`classifier`), and turn its body
//! rows into an edition -> hash map (`rows`).

pub mod classifier;
pub mod disclosure;
pub mod rows;
