//! `isohash [LANG]`: harvest the hash table and optionally look up an edition.

use crate::cli::output::{self, Styled};
use crate::config::{BrowserSettings, ScrapeConfig};
use crate::error::ScrapeError;
use crate::extraction::disclosure::DisclosureState;
use crate::lookup::Lookup;
use crate::pipeline::{self, ExtractionStatus, RunReport};
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::snapshot::SnapshotRenderer;
use std::path::Path;
use tracing::warn;

/// Extracted, and the query (if any) matched.
pub const EXIT_OK: u8 = 0;
/// Page load failure or another fatal fault.
pub const EXIT_FAILURE: u8 = 1;
/// No table on the page looked like the hash table.
pub const EXIT_NO_TABLE: u8 = 2;
/// The hash table had no usable rows.
pub const EXIT_EMPTY: u8 = 3;
/// Extraction succeeded but the query matched no edition.
pub const EXIT_NOT_FOUND: u8 = 4;

/// Run the harvest and report it. Returns the process exit status.
///
/// `snapshot` replays a saved page instead of launching Chromium.
pub async fn run(query: Option<&str>, snapshot: Option<&Path>) -> u8 {
    let s = Styled::new();
    let config = ScrapeConfig::default();
    let chatty = !output::is_quiet() && !output::is_json();

    if chatty {
        output::print_header(&s);
        output::print_step(s.info_sym(), &format!("Loading {}", config.url));
    }

    let result = execute(&config, query, snapshot).await;

    if output::is_json() {
        output::print_json(&json_report(&result, query));
    } else if !output::is_quiet() {
        print_human(&s, &result);
    } else if let Ok(report) = &result {
        // Quiet mode still answers the question that was asked.
        print_matches(&Styled::plain(), &report.lookup);
        if let Some(note) = quiet_miss_note(&report.lookup) {
            eprintln!("{note}");
        }
    }

    match &result {
        Ok(report) => exit_code(report),
        Err(_) => EXIT_FAILURE,
    }
}

/// Build the renderer and run the pipeline. A renderer that cannot be built
/// is reported as [`ScrapeError::Context`].
async fn execute(
    config: &ScrapeConfig,
    query: Option<&str>,
    snapshot: Option<&Path>,
) -> Result<RunReport, ScrapeError> {
    match snapshot {
        Some(path) => {
            let renderer = SnapshotRenderer::from_file(path).map_err(ScrapeError::Context)?;
            pipeline::run(&renderer, config, query).await
        }
        None => {
            let renderer = ChromiumRenderer::launch(&BrowserSettings::from_env())
                .await
                .map_err(ScrapeError::Context)?;
            let result = pipeline::run(&renderer, config, query).await;
            if let Err(e) = renderer.shutdown().await {
                warn!("browser shutdown failed: {e:#}");
            }
            result
        }
    }
}

/// Exit status for a completed run.
pub fn exit_code(report: &RunReport) -> u8 {
    match (&report.status, &report.lookup) {
        (ExtractionStatus::NoQualifyingTable, _) => EXIT_NO_TABLE,
        (ExtractionStatus::EmptyExtraction, _) => EXIT_EMPTY,
        (ExtractionStatus::Extracted { .. }, Lookup::NotFound { .. }) => EXIT_NOT_FOUND,
        (ExtractionStatus::Extracted { .. }, _) => EXIT_OK,
    }
}

fn print_human(s: &Styled, result: &Result<RunReport, ScrapeError>) {
    let report = match result {
        Ok(report) => report,
        Err(ScrapeError::Navigation { source, .. }) => {
            output::print_step(s.fail_sym(), &format!("Failed to load page: {source:#}"));
            output::print_status(s, &s.red("failed"), "page load failure");
            return;
        }
        Err(e) => {
            output::print_step(s.fail_sym(), &format!("{e:#}"));
            output::print_status(s, &s.red("failed"), "extraction aborted");
            return;
        }
    };

    match report.disclosure {
        DisclosureState::Expanded => {
            output::print_step(s.ok_sym(), "Verification section expanded")
        }
        _ => output::print_step(
            s.warn_sym(),
            "Verification section unavailable; reading tables as-is",
        ),
    }

    match &report.status {
        ExtractionStatus::NoQualifyingTable => {
            output::print_step(s.fail_sym(), "No hash table found on page");
            output::print_status(s, &s.red("extraction failed"), "no qualifying table");
            return;
        }
        ExtractionStatus::EmptyExtraction => {
            output::print_step(s.fail_sym(), "Hash table found but no rows could be extracted");
            output::print_status(s, &s.red("extraction failed"), "zero rows");
            return;
        }
        ExtractionStatus::Extracted { count, artifact } => {
            output::print_step(
                s.ok_sym(),
                &format!("Extracted {count} hashes to {}", artifact.display()),
            );
            if output::is_verbose() {
                output::print_detail(&s.dim(&format!("from {}", report.final_url)));
            }
        }
    }

    match &report.lookup {
        Lookup::Skipped => {}
        Lookup::Found { query, .. } => {
            output::print_step(s.info_sym(), &format!("Searching for: {}", s.cyan(query)));
            eprintln!();
            print_matches(s, &report.lookup);
        }
        Lookup::NotFound { query } => {
            output::print_step(
                s.fail_sym(),
                &format!("No hash found for language: {}", s.yellow(query)),
            );
        }
    }

    output::print_status(s, &s.green("complete"), "extraction complete");
}

/// The one line quiet mode prints for a query that matched nothing.
fn quiet_miss_note(lookup: &Lookup) -> Option<String> {
    match lookup {
        Lookup::NotFound { query } => Some(format!("No hash found for language: {query}")),
        _ => None,
    }
}

/// Print lookup matches to stdout.
fn print_matches(s: &Styled, lookup: &Lookup) {
    let Lookup::Found { matches, .. } = lookup else {
        return;
    };
    println!("{}", output::rule(s));
    for record in matches {
        println!("    language: {}", s.bold(&record.edition));
        println!("    hash:     {}", record.hash);
        println!("{}", output::rule(s));
    }
}

fn json_report(result: &Result<RunReport, ScrapeError>, query: Option<&str>) -> serde_json::Value {
    let extracted_at = chrono::Utc::now().to_rfc3339();
    match result {
        Ok(report) => {
            let (count, artifact) = match &report.status {
                ExtractionStatus::Extracted { count, artifact } => {
                    (*count, Some(artifact.display().to_string()))
                }
                _ => (0, None),
            };
            serde_json::json!({
                "status": report.status.label(),
                "disclosure": report.disclosure,
                "url": report.final_url,
                "count": count,
                "artifact": artifact,
                "query": query,
                "lookup": report.lookup,
                "hashes": report.table,
                "extracted_at": extracted_at,
            })
        }
        Err(e) => {
            let status = match e {
                ScrapeError::Navigation { .. } => "navigation_failure",
                _ => "error",
            };
            serde_json::json!({
                "status": status,
                "error": format!("{e:#}"),
                "query": query,
                "extracted_at": extracted_at,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::rows::{HashRecord, HashTable};
    use std::path::PathBuf;

    fn report(status: ExtractionStatus, lookup: Lookup) -> RunReport {
        RunReport {
            final_url: "https://example.com".to_string(),
            disclosure: DisclosureState::Expanded,
            status,
            table: HashTable::new(),
            lookup,
        }
    }

    fn extracted() -> ExtractionStatus {
        ExtractionStatus::Extracted {
            count: 1,
            artifact: PathBuf::from("hashes.json"),
        }
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(exit_code(&report(extracted(), Lookup::Skipped)), EXIT_OK);
        assert_eq!(
            exit_code(&report(
                extracted(),
                Lookup::Found {
                    query: "en".into(),
                    matches: vec![HashRecord::from_cells("English", "AA").unwrap()],
                }
            )),
            EXIT_OK
        );
        assert_eq!(
            exit_code(&report(extracted(), Lookup::NotFound { query: "de".into() })),
            EXIT_NOT_FOUND
        );
        assert_eq!(
            exit_code(&report(ExtractionStatus::NoQualifyingTable, Lookup::Skipped)),
            EXIT_NO_TABLE
        );
        assert_eq!(
            exit_code(&report(ExtractionStatus::EmptyExtraction, Lookup::Skipped)),
            EXIT_EMPTY
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_file_is_reported_as_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        let config = ScrapeConfig::default().with_artifact_path(dir.path().join("hashes.json"));

        let result = execute(&config, Some("english"), Some(missing.as_path())).await;
        assert!(matches!(result, Err(ScrapeError::Context(_))));

        let json = json_report(&result, Some("english"));
        assert_eq!(json["status"], "error");
        assert!(json["error"].as_str().unwrap().contains("nope.html"));
        assert_eq!(json["query"], "english");
    }

    #[tokio::test]
    async fn test_missing_snapshot_file_exits_with_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.html");
        assert_eq!(run(None, Some(missing.as_path())).await, EXIT_FAILURE);
    }

    #[test]
    fn test_quiet_mode_still_reports_a_miss() {
        assert_eq!(
            quiet_miss_note(&Lookup::NotFound { query: "klingon".into() }).as_deref(),
            Some("No hash found for language: klingon")
        );
        assert_eq!(quiet_miss_note(&Lookup::Skipped), None);
    }

    #[test]
    fn test_navigation_failure_json_status() {
        let result: Result<RunReport, ScrapeError> = Err(ScrapeError::Navigation {
            url: "https://example.com".into(),
            source: anyhow::anyhow!("timed out"),
        });
        let json = json_report(&result, None);
        assert_eq!(json["status"], "navigation_failure");
        assert!(json["query"].is_null());
    }
}
