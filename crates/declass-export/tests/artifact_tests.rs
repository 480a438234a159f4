use declass_export::{to_json_bytes, write_artifact, AvailabilityExport, FeatureCollection};
use declass_scene::Dataset;
use declass_store::{JournalStore, SceneStore};
use declass_test_utils::record;
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn populate(store: &dyn SceneStore) {
    store
        .upsert_batch(vec![
            record(Dataset::DeclassII, "E2", true),
            record(Dataset::DeclassI, "E9", true),
            record(Dataset::DeclassI, "E1", false),
            record(Dataset::DeclassIII, "E5", true),
        ])
        .unwrap();
}

#[test]
fn test_unchanged_store_exports_identical_bytes() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JournalStore::open(dir.path().join("store")).unwrap());
    populate(store.as_ref());
    let export = AvailabilityExport::new(store);

    let first = to_json_bytes(&export.export(&BTreeSet::new()).unwrap()).unwrap();
    let second = to_json_bytes(&export.export(&BTreeSet::new()).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_export_survives_store_reopen() {
    let dir = TempDir::new().unwrap();
    let before = {
        let store = Arc::new(JournalStore::open(dir.path()).unwrap());
        populate(store.as_ref());
        to_json_bytes(&AvailabilityExport::new(store).export(&BTreeSet::new()).unwrap()).unwrap()
    };

    let store = Arc::new(JournalStore::open(dir.path()).unwrap());
    let after =
        to_json_bytes(&AvailabilityExport::new(store).export(&BTreeSet::new()).unwrap()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_write_artifact_replaces_previous_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("declass.geojson");

    write_artifact(&path, &FeatureCollection::default()).unwrap();
    let empty: FeatureCollection = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    assert!(empty.is_empty());

    let store = Arc::new(JournalStore::open(dir.path().join("store")).unwrap());
    populate(store.as_ref());
    let collection = AvailabilityExport::new(store).export(&BTreeSet::new()).unwrap();
    write_artifact(&path, &collection).unwrap();

    let written = fs::read(&path).unwrap();
    assert_eq!(written, to_json_bytes(&collection).unwrap());
    let decoded: FeatureCollection = serde_json::from_slice(&written).unwrap();
    assert_eq!(decoded.len(), 3);

    // No temporary files are left beside the artifact
    let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(leftovers.len(), 1);
}
