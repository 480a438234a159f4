use declass_cli::commands;
use declass_cli::DeclassConfig;
use declass_export::FeatureCollection;
use declass_scene::Dataset;
use declass_sync::{AdapterError, SyncRequest};
use declass_test_utils::{scene, test_config, FakeCatalog};
use pretty_assertions::assert_eq;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn config_in(dir: &TempDir) -> DeclassConfig {
    DeclassConfig {
        store_dir: dir.path().join("store"),
        artifact_path: dir.path().join("out").join("declass.geojson"),
        events_path: dir.path().join("events.jsonl"),
        sync: test_config(2),
        ..DeclassConfig::default()
    }
}

fn catalog() -> Arc<FakeCatalog> {
    Arc::new(
        FakeCatalog::new()
            .with_scenes(
                Dataset::DeclassII,
                vec![scene("D2-1", true), scene("D2-2", false), scene("D2-3", true)],
            )
            .with_scenes(Dataset::DeclassIII, vec![scene("D3-1", true)]),
    )
}

fn artifact(config: &DeclassConfig) -> FeatureCollection {
    serde_json::from_slice(&fs::read(&config.artifact_path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_sync_writes_events_and_artifact() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let outcome = commands::sync(&config, catalog(), &SyncRequest::all(), true)
        .await
        .unwrap();

    assert!(!outcome.failed());
    assert_eq!(outcome.exported, Some(3));
    assert_eq!(artifact(&config).len(), 3);

    let events = fs::read_to_string(&config.events_path).unwrap();
    assert_eq!(events.lines().count(), 4);

    let stats = commands::stats(&config).unwrap();
    assert_eq!(stats.total(), 4);
    assert_eq!(stats.datasets[&Dataset::DeclassII].available, 2);
    assert!(stats.seeded.contains(&Dataset::DeclassIII));
}

#[tokio::test]
async fn test_second_sync_publishes_nothing_new() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let catalog = catalog();

    commands::sync(&config, catalog.clone(), &SyncRequest::all(), true)
        .await
        .unwrap();
    let first = fs::read(&config.artifact_path).unwrap();

    let outcome = commands::sync(&config, catalog, &SyncRequest::all(), true)
        .await
        .unwrap();
    assert!(outcome.report.events.is_empty());
    assert_eq!(fs::read(&config.artifact_path).unwrap(), first);
    assert_eq!(
        fs::read_to_string(&config.events_path).unwrap().lines().count(),
        4
    );
}

#[tokio::test]
async fn test_failed_dataset_still_regenerates_artifact() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    let catalog = catalog();
    catalog.fail_dataset(Dataset::DeclassIII, AdapterError::fatal("dataset withdrawn"));

    let outcome = commands::sync(&config, catalog, &SyncRequest::all(), true)
        .await
        .unwrap();

    assert!(outcome.failed());
    let summary = commands::render_sync_summary(&outcome.report);
    assert!(summary.contains("FAILED"));
    assert_eq!(artifact(&config).len(), 2);
}

#[tokio::test]
async fn test_no_export_leaves_artifact_alone() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let outcome = commands::sync(&config, catalog(), &SyncRequest::all(), false)
        .await
        .unwrap();

    assert_eq!(outcome.exported, None);
    assert!(!config.artifact_path.exists());
}

#[tokio::test]
async fn test_standalone_export_filters_datasets() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    commands::sync(&config, catalog(), &SyncRequest::all(), false)
        .await
        .unwrap();

    let output = dir.path().join("declassiii.geojson");
    let (path, count) =
        commands::export_from_config(&config, &[Dataset::DeclassIII], Some(output.clone()))
            .unwrap();

    assert_eq!(path, output);
    assert_eq!(count, 1);
    let written: FeatureCollection = serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
    let ids: Vec<String> = written.scene_ids().map(ToString::to_string).collect();
    assert_eq!(ids, vec!["D3-1".to_string()]);
}

#[tokio::test]
async fn test_stats_and_export_leave_store_files_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    commands::sync(&config, catalog(), &SyncRequest::all(), false)
        .await
        .unwrap();

    let journal = config.store_dir.join("journal.jsonl");
    let before = fs::read(&journal).unwrap();
    fs::OpenOptions::new()
        .append(true)
        .open(&journal)
        .unwrap()
        .write_all(b"deadbeef {\"seq\":")
        .unwrap();
    let torn = fs::read(&journal).unwrap();
    assert!(torn.len() > before.len());

    assert_eq!(commands::stats(&config).unwrap().total(), 4);
    let (_, count) = commands::export_from_config(&config, &[], None).unwrap();
    assert_eq!(count, 3);

    assert_eq!(fs::read(&journal).unwrap(), torn);
    assert!(!config.store_dir.join("snapshot.json").exists());
}

#[tokio::test]
async fn test_stats_refused_while_store_is_open_for_sync() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    commands::sync(&config, catalog(), &SyncRequest::all(), false)
        .await
        .unwrap();

    let writer = commands::open_store(&config).unwrap();
    let err = commands::stats(&config).unwrap_err();
    assert!(format!("{err:#}").contains("locked by another handle"));
    assert!(commands::export_from_config(&config, &[], None).is_err());
    assert!(commands::sync(&config, catalog(), &SyncRequest::all(), false)
        .await
        .is_err());

    drop(writer);
    assert_eq!(commands::stats(&config).unwrap().total(), 4);
}
