mod helpers;

use helpers::{spike_embedding, test_image, StubEngine};
use rollcall_core::roster::{Roster, RosterError, RosterStore};
use rollcall_core::{enroll, EnrollError, EMBEDDING_DIM};
use tempfile::TempDir;

fn seeded_store(dir: &TempDir) -> RosterStore {
    let store = RosterStore::new(dir.path().join("roster.bin"));
    store.save(&Roster::new()).unwrap();
    store
}

#[test]
fn enroll_then_lookup_returns_record_with_full_embedding() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mut engine = StubEngine::new().with_face(200, spike_embedding(1));

    let slot = enroll(&store, &mut engine, "S1", "Ann Lee", &test_image(200), None).unwrap();
    assert_eq!(slot, 0);

    let (found_slot, record) = store.lookup_by_external_id("S1").unwrap().unwrap();
    assert_eq!(found_slot, 0);
    assert_eq!(record.display_name, "Ann Lee");
    assert_eq!(record.embedding.dim(), EMBEDDING_DIM);
}

#[test]
fn duplicate_id_rejected_and_count_unchanged() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mut engine = StubEngine::new()
        .with_face(200, spike_embedding(1))
        .with_face(64, spike_embedding(2));

    enroll(&store, &mut engine, "S1", "Ann", &test_image(200), None).unwrap();
    let err = enroll(&store, &mut engine, "S1", "Impostor", &test_image(64), None).unwrap_err();
    assert!(matches!(err, EnrollError::DuplicateIdentifier(id) if id == "S1"));
    assert_eq!(store.load().unwrap().len(), 1);
}

#[test]
fn zero_face_image_rejected_before_store_mutation() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mut engine = StubEngine::new(); // detects nothing

    let err = enroll(&store, &mut engine, "S1", "Ann", &test_image(200), None).unwrap_err();
    assert!(matches!(err, EnrollError::NoFaceDetected));
    assert!(store.load().unwrap().is_empty());
}

#[test]
fn only_first_face_is_stored_for_multi_face_image() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let first = spike_embedding(3);
    let mut engine = StubEngine::new()
        .with_face(200, first.clone())
        .with_face(200, spike_embedding(4));

    enroll(&store, &mut engine, "S1", "Ann", &test_image(200), None).unwrap();
    let (_, record) = store.lookup_by_external_id("S1").unwrap().unwrap();
    assert!(record.embedding.distance(&first).abs() < 1e-6);
}

#[test]
fn enroll_against_missing_store_propagates_store_not_found() {
    let dir = TempDir::new().unwrap();
    let store = RosterStore::new(dir.path().join("never-built.bin"));
    let mut engine = StubEngine::new().with_face(200, spike_embedding(1));

    let err = enroll(&store, &mut engine, "S1", "Ann", &test_image(200), None).unwrap_err();
    assert!(matches!(
        err,
        EnrollError::Roster(RosterError::StoreNotFound(_))
    ));
}

#[test]
fn update_in_place_reuses_slot() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir);
    let mut engine = StubEngine::new()
        .with_face(200, spike_embedding(1))
        .with_face(64, spike_embedding(2));

    let slot = enroll(&store, &mut engine, "S1", "Ann", &test_image(200), None).unwrap();
    enroll(&store, &mut engine, "S1", "Ann Updated", &test_image(64), Some(slot)).unwrap();

    let roster = store.load().unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[&slot].display_name, "Ann Updated");
}
