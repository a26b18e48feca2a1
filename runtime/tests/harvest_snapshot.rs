use isohash::artifact::read_artifact;
use isohash::config::ScrapeConfig;
use isohash::pipeline;
use isohash::renderer::snapshot::SnapshotRenderer;
use isohash::{DisclosureState, ExtractionStatus, Lookup};

const PAGE: &str = include_str!("fixtures/download_page.html");

#[tokio::test]
async fn test_snapshot_harvest_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScrapeConfig::default()
        .with_artifact_path(dir.path().join("hashes.json"))
        .without_settle_delay();
    let renderer = SnapshotRenderer::new(PAGE);

    let report = pipeline::run(&renderer, &config, Some("french")).await.unwrap();

    assert_eq!(report.disclosure, DisclosureState::Expanded);
    assert!(matches!(report.status, ExtractionStatus::Extracted { count: 6, .. }));

    // "French 64-bit" has a blank hash cell, so only the Canadian edition matches.
    let Lookup::Found { matches, .. } = &report.lookup else {
        panic!("expected a match, got {:?}", report.lookup);
    };
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].edition, "French Canadian 64-bit");

    let on_disk = read_artifact(&config.artifact_path).unwrap();
    assert_eq!(on_disk, report.table);
    assert!(on_disk.get("Arabic 64-bit").unwrap().starts_with("A3D1BA4A"));
}

#[tokio::test]
async fn test_rerun_overwrites_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScrapeConfig::default()
        .with_artifact_path(dir.path().join("hashes.json"))
        .without_settle_delay();
    std::fs::write(&config.artifact_path, "{\n    \"Stale\": \"00\"\n}\n").unwrap();

    pipeline::run(&SnapshotRenderer::new(PAGE), &config, None)
        .await
        .unwrap();

    let on_disk = read_artifact(&config.artifact_path).unwrap();
    assert!(on_disk.get("Stale").is_none());
    assert_eq!(on_disk.len(), 6);
}
