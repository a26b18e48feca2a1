//! Tracing setup for the binary.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr.
///
/// `ISOHASH_LOG_FORMAT=json` switches to one JSON object per event.
pub fn init(verbose: bool, quiet: bool) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(rust_log.as_deref(), verbose, quiet)?;

    let json = std::env::var("ISOHASH_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
    Ok(())
}

/// Filter for the subscriber.
///
/// A non-empty `RUST_LOG` is used as given. Otherwise the filter is
/// `isohash=info`, `debug` when verbose, `warn` when quiet.
pub fn build_filter(rust_log: Option<&str>, verbose: bool, quiet: bool) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|s| !s.trim().is_empty()) {
        return Ok(EnvFilter::try_new(directives)?);
    }
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    Ok(EnvFilter::try_new(format!("isohash={level}"))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_overrides_default_level() {
        let filter = build_filter(Some("isohash=trace"), false, false).unwrap();
        assert_eq!(filter.to_string(), "isohash=trace");

        let filter = build_filter(Some("isohash=trace"), false, true).unwrap();
        assert_eq!(filter.to_string(), "isohash=trace");
    }

    #[test]
    fn test_default_level_follows_flags() {
        assert_eq!(build_filter(None, false, false).unwrap().to_string(), "isohash=info");
        assert_eq!(build_filter(None, true, false).unwrap().to_string(), "isohash=debug");
        assert_eq!(build_filter(None, false, true).unwrap().to_string(), "isohash=warn");
        assert_eq!(build_filter(Some("  "), true, false).unwrap().to_string(), "isohash=debug");
    }

    #[test]
    fn test_malformed_rust_log_is_an_error() {
        assert!(build_filter(Some("isohash=loud"), false, false).is_err());
    }
}
