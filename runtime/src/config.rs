//! Named configuration for a harvest run.
//!
//! Every value the download page forces on us (URL, selectors, marker text,
//! timeouts, output filename) lives here so tests can substitute them
//! without touching the pipeline.

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// The vendor page that publishes the ISO hash table.
pub const TARGET_URL: &str = "https://www.microsoft.com/en-us/software-download/windows11";

/// Desktop Chrome user agent; the page serves a different layout to headless UAs.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Artifact filename, written to the current working directory.
pub const ARTIFACT_FILE: &str = "hashes.json";

/// ARIA role of the control that expands the verification panel.
pub const TRIGGER_ROLE: &str = "button";

/// Accessible name of the control that expands the verification panel.
pub const TRIGGER_NAME: &str = "Verify your download";

/// Heading text that is only visible once the panel is expanded.
pub const LANDMARK_TEXT: &str = "Hash values for the ISO files";

/// Page load budget.
pub const NAVIGATION_TIMEOUT_MS: u64 = 30_000;

/// How long to wait for the trigger to appear in the DOM.
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait for the panel to open after clicking the trigger.
pub const REVEAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause after locating the table, to let late rendering settle.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Selectors and timeouts for the progressive-disclosure panel.
#[derive(Debug, Clone)]
pub struct DisclosureConfig {
    pub trigger_role: String,
    pub trigger_name: String,
    pub landmark_text: String,
    pub attach_timeout: Duration,
    pub reveal_timeout: Duration,
}

impl Default for DisclosureConfig {
    fn default() -> Self {
        Self {
            trigger_role: TRIGGER_ROLE.to_string(),
            trigger_name: TRIGGER_NAME.to_string(),
            landmark_text: LANDMARK_TEXT.to_string(),
            attach_timeout: ATTACH_TIMEOUT,
            reveal_timeout: REVEAL_TIMEOUT,
        }
    }
}

/// Everything the pipeline needs to perform one run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Page to load.
    pub url: Url,
    /// Budget for the initial navigation, in milliseconds.
    pub navigation_timeout_ms: u64,
    pub disclosure: DisclosureConfig,
    /// Stabilization pause after the table is classified.
    pub settle_delay: Duration,
    /// Where the artifact is written.
    pub artifact_path: PathBuf,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: Url::parse(TARGET_URL).expect("TARGET_URL is a valid URL"),
            navigation_timeout_ms: NAVIGATION_TIMEOUT_MS,
            disclosure: DisclosureConfig::default(),
            settle_delay: SETTLE_DELAY,
            artifact_path: PathBuf::from(ARTIFACT_FILE),
        }
    }
}

impl ScrapeConfig {
    /// Write the artifact somewhere other than the working directory.
    pub fn with_artifact_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifact_path = path.into();
        self
    }

    /// Skip the stabilization pause (used against in-memory documents).
    pub fn without_settle_delay(mut self) -> Self {
        self.settle_delay = Duration::ZERO;
        self
    }
}

/// How the browser process is launched.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Explicit Chromium executable; discovered when `None`.
    pub chromium_path: Option<PathBuf>,
    /// Show the browser window instead of running headless.
    pub headed: bool,
    pub user_agent: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            chromium_path: None,
            headed: false,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

impl BrowserSettings {
    /// Defaults overridden by `ISOHASH_CHROMIUM_PATH` and `ISOHASH_HEADED`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(p) = std::env::var("ISOHASH_CHROMIUM_PATH") {
            if !p.trim().is_empty() {
                settings.chromium_path = Some(PathBuf::from(p));
            }
        }
        if let Ok(v) = std::env::var("ISOHASH_HEADED") {
            settings.headed = matches!(v.as_str(), "1" | "true" | "yes");
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_download_page() {
        let config = ScrapeConfig::default();
        assert_eq!(config.url.as_str(), TARGET_URL);
        assert_eq!(config.artifact_path, PathBuf::from("hashes.json"));
        assert_eq!(config.disclosure.attach_timeout, Duration::from_secs(10));
        assert_eq!(config.disclosure.reveal_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let config = ScrapeConfig::default()
            .with_artifact_path("/tmp/out.json")
            .without_settle_delay();
        assert_eq!(config.artifact_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(config.settle_delay, Duration::ZERO);
    }
}
