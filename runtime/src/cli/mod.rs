//! CLI command implementations for the isohash binary.

pub mod harvest_cmd;
pub mod output;
