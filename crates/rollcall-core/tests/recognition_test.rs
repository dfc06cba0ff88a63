mod helpers;

use helpers::{spike_embedding, test_image, StubEngine};
use rollcall_core::recognizer::{label_faces, UNKNOWN};
use rollcall_core::roster::Roster;
use rollcall_core::types::{PersonRecord, StoredImage};

fn record(id: &str, name: &str, seed: usize) -> PersonRecord {
    PersonRecord {
        external_id: id.to_string(),
        display_name: name.to_string(),
        reference_image: StoredImage { width: 1, height: 1, pixels: vec![0; 3] },
        embedding: spike_embedding(seed),
    }
}

#[test]
fn empty_roster_is_unknown_at_any_tolerance() {
    let mut engine = StubEngine::new().with_face(200, spike_embedding(1));
    let roster = Roster::new();

    for tolerance in [0.0, 0.5, 10.0, 1000.0] {
        let labels = label_faces(&mut engine, &roster, &test_image(200), tolerance).unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].external_id, UNKNOWN);
        assert_eq!(labels[0].display_name, UNKNOWN);
    }
}

#[test]
fn exact_reference_embedding_matches_at_default_tolerance() {
    let mut engine = StubEngine::new().with_face(200, spike_embedding(5));
    let mut roster = Roster::new();
    roster.insert(0, record("S1", "Ann", 5));

    let labels = label_faces(&mut engine, &roster, &test_image(200), 0.5).unwrap();
    assert_eq!(labels[0].external_id, "S1");
    assert!(labels[0].distance.unwrap().abs() < 1e-6);
}

#[test]
fn stranger_yields_unknown_unknown() {
    // Roster has {id: "S1", name: "Ann"}; the probe embedding is orthogonal
    // to the stored one (distance sqrt(2) > 0.5).
    let mut engine = StubEngine::new().with_face(200, spike_embedding(9));
    let mut roster = Roster::new();
    roster.insert(0, record("S1", "Ann", 5));

    let labels = label_faces(&mut engine, &roster, &test_image(200), 0.5).unwrap();
    assert_eq!(labels[0].display_name, UNKNOWN);
    assert_eq!(labels[0].external_id, UNKNOWN);
    assert!(labels[0].distance.is_none());
}

#[test]
fn zero_detected_faces_yields_no_labels() {
    let mut engine = StubEngine::new();
    let mut roster = Roster::new();
    roster.insert(0, record("S1", "Ann", 5));

    let labels = label_faces(&mut engine, &roster, &test_image(200), 0.5).unwrap();
    assert!(labels.is_empty());
}

#[test]
fn first_matching_slot_wins_in_roster_order() {
    // Both entries share the stored embedding's neighborhood; slot 0 must
    // win even though slot 1 is the identical (distance-zero) entry.
    let probe = spike_embedding(2);
    let mut near_miss = spike_embedding(2);
    near_miss.values[3] = 0.1;

    let mut engine = StubEngine::new().with_face(200, probe);
    let mut roster = Roster::new();
    roster.insert(
        0,
        PersonRecord {
            external_id: "COARSE".into(),
            display_name: "Coarse".into(),
            reference_image: StoredImage { width: 1, height: 1, pixels: vec![0; 3] },
            embedding: near_miss,
        },
    );
    roster.insert(1, record("EXACT", "Exact", 2));

    let labels = label_faces(&mut engine, &roster, &test_image(200), 0.5).unwrap();
    assert_eq!(labels[0].external_id, "COARSE");
}
